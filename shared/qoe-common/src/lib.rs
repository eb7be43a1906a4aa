//! QoE Telemetry Common Library
//!
//! Wire types and pure math shared by the probe and the server, so the two
//! sides cannot disagree on the event schema or the percentile arithmetic.

pub mod event;
pub mod percentile;
pub mod window;

pub use event::{FailedEvent, SubmitRequest, SubmitResponse, TelemetryEvent};
pub use percentile::percentile;
pub use window::window_start_ts;
