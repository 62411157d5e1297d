//! Environment/runtime helpers
//!
//! Sanity checks run once at startup before any message is accepted.

use std::path::Path;

use tracing::warn;

/// Warn when the config file is missing and make sure the store data
/// directory exists when one is used.
pub async fn ensure_env(config_path: &str, data_dir: Option<&str>) -> anyhow::Result<()> {
    if tokio::fs::metadata(config_path).await.is_err() {
        warn!(%config_path, "config file not found; built-in defaults apply");
    }
    if let Some(dir) = data_dir {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| anyhow::anyhow!("cannot create {dir}: {e}"))?;
    }
    Ok(())
}

/// True when `path` exists and is a directory.
pub fn is_dir(path: &str) -> bool {
    Path::new(path).is_dir()
}
