//! Probe configuration: CLI flags (grounded on the `clap::Parser` derive
//! style used for `514-labs-moosestack`'s `framework-cli` binary) layered
//! over environment defaults, the way `qoe-server::config` layers env vars
//! over defaults.

use std::time::Duration;

use clap::Parser;

#[derive(Debug, Parser)]
#[command(name = "qoe-probe", about = "Active QoE measurement probe")]
pub struct Cli {
    /// Target URL to measure. May be repeated.
    #[arg(long = "target", required = true)]
    pub targets: Vec<String>,

    /// Ingest gateway base URL, e.g. <https://ingest.example.com>.
    #[arg(long, env = "QOE_INGEST_URL")]
    pub ingest_url: String,

    /// Bearer token presented to the ingest gateway.
    #[arg(long, env = "QOE_AUTH_TOKEN")]
    pub auth_token: String,

    /// Seconds between measurement passes over all targets.
    #[arg(long, default_value_t = 60)]
    pub interval_secs: u64,

    /// Seconds between throughput sub-measurements (0 disables them).
    #[arg(long, default_value_t = 300)]
    pub throughput_interval_secs: u64,

    /// Run a single pass over all targets and exit, instead of looping.
    #[arg(long, default_value_t = false)]
    pub once: bool,
}

impl Cli {
    #[must_use]
    pub fn measurement_interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    #[must_use]
    pub fn throughput_interval(&self) -> Option<Duration> {
        if self.throughput_interval_secs == 0 {
            None
        } else {
            Some(Duration::from_secs(self.throughput_interval_secs))
        }
    }
}
