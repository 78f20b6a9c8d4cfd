//! Environment/runtime helpers
//!
//! Sanity checks to ensure the directories the service writes into exist at startup.

use std::path::Path;

use tracing::{info, warn};

/// Ensure the parent directory of a store document exists.
///
/// Returns an error only when the directory is missing and cannot be created.
pub async fn ensure_parent_dir(file: &Path) -> anyhow::Result<()> {
    let Some(parent) = file.parent().filter(|p| !p.as_os_str().is_empty()) else {
        return Ok(());
    };
    if tokio::fs::metadata(parent).await.is_ok() {
        return Ok(());
    }
    warn!(dir = %parent.display(), "store directory missing; creating it");
    tokio::fs::create_dir_all(parent)
        .await
        .map_err(|e| anyhow::anyhow!("cannot create {}: {e}", parent.display()))?;
    info!(dir = %parent.display(), "store directory created");
    Ok(())
}
