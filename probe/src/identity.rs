//! Client identity: a stable opaque `client_id` persisted across probe
//! restarts.
//!
//! Precedence matches §6: the `TELEMETRY_CLIENT_ID` environment variable
//! wins outright; otherwise the id is read from (or generated and written
//! to) `${HOME}/.telemetry_client_id`. The write path follows the teacher's
//! `write_state_atomic` shape (write to a sibling temp file, then
//! `tokio::fs::rename`) so a crash mid-write never leaves a truncated file
//! behind for the next read.

use std::path::{Path, PathBuf};

use rand::RngCore;
use thiserror::Error;

const ENV_VAR: &str = "TELEMETRY_CLIENT_ID";
const FILE_NAME: &str = ".telemetry_client_id";
const ID_RANDOM_BYTES: usize = 16;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("could not determine home directory")]
    NoHomeDir,
    #[error("failed to read client id file: {0}")]
    Read(#[source] std::io::Error),
    #[error("failed to write client id file: {0}")]
    Write(#[source] std::io::Error),
    #[error("failed to set permissions on client id file: {0}")]
    Permissions(#[source] std::io::Error),
}

fn default_state_path() -> Result<PathBuf, IdentityError> {
    dirs::home_dir()
        .map(|home| home.join(FILE_NAME))
        .ok_or(IdentityError::NoHomeDir)
}

fn generate_client_id() -> String {
    let mut bytes = [0u8; ID_RANDOM_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("probe-{}", hex::encode(bytes))
}

/// Resolve this probe's stable client id, generating and persisting one on
/// first run.
pub async fn resolve_client_id() -> Result<String, IdentityError> {
    if let Ok(id) = std::env::var(ENV_VAR) {
        if !id.trim().is_empty() {
            return Ok(id);
        }
    }
    let path = default_state_path()?;
    resolve_client_id_at(&path).await
}

async fn resolve_client_id_at(path: &Path) -> Result<String, IdentityError> {
    if path.exists() {
        let content = tokio::fs::read_to_string(path)
            .await
            .map_err(IdentityError::Read)?;
        let id = content.trim().to_string();
        if !id.is_empty() {
            return Ok(id);
        }
    }

    let id = generate_client_id();
    write_client_id_atomic(path, &id).await?;
    Ok(id)
}

async fn write_client_id_atomic(path: &Path, id: &str) -> Result<(), IdentityError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(IdentityError::Write)?;
    }

    let temp_path = path.with_extension("tmp");
    tokio::fs::write(&temp_path, id)
        .await
        .map_err(IdentityError::Write)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        tokio::fs::set_permissions(&temp_path, std::fs::Permissions::from_mode(0o600))
            .await
            .map_err(IdentityError::Permissions)?;
    }

    tokio::fs::rename(&temp_path, path)
        .await
        .map_err(IdentityError::Write)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[tokio::test]
    async fn generates_and_persists_id_on_first_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(FILE_NAME);

        let first = resolve_client_id_at(&path).await.unwrap();
        assert!(first.starts_with("probe-"));
        assert_eq!(first.len(), "probe-".len() + ID_RANDOM_BYTES * 2);

        let second = resolve_client_id_at(&path).await.unwrap();
        assert_eq!(first, second, "id must survive across resolves once written");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn persisted_file_is_mode_0600() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(FILE_NAME);
        resolve_client_id_at(&path).await.unwrap();

        let mode = tokio::fs::metadata(&path).await.unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[tokio::test]
    #[serial]
    async fn env_var_overrides_file() {
        std::env::set_var(ENV_VAR, "probe-from-env");
        let id = resolve_client_id().await.unwrap();
        assert_eq!(id, "probe-from-env");
        std::env::remove_var(ENV_VAR);
    }
}
