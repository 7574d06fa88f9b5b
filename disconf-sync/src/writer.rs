//! Destination and download file writers.
//!
//! ## `write_properties` protocol
//!
//! 1. Serialize the snapshot as `key=value` lines.
//! 2. Create missing parent directories.
//! 3. Write to `<path>.disconf.tmp`.
//! 4. Rename over the final path; on failure remove the tmp file.

use std::path::{Path, PathBuf};

use disconf_core::Properties;

use crate::error::{io_err, SyncError};

/// Atomically replace `path` with the serialized `props`.
pub async fn write_properties(path: &Path, props: &Properties) -> Result<(), SyncError> {
    let tmp = PathBuf::from(format!("{}.disconf.tmp", path.display()));
    write_with_tmp(path, &props.to_string(), &tmp).await?;
    tracing::info!(keys = props.len(), "wrote: {}", path.display());
    Ok(())
}

async fn write_with_tmp(path: &Path, content: &str, tmp: &Path) -> Result<(), SyncError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| io_err(parent, e))?;
    }
    tokio::fs::write(tmp, content)
        .await
        .map_err(|e| io_err(tmp, e))?;

    if let Err(e) = tokio::fs::rename(tmp, path).await {
        let _ = tokio::fs::remove_file(tmp).await;
        return Err(io_err(path, e));
    }
    Ok(())
}

/// Save a raw payload as `<dir>/<name>`. Best-effort: failures are logged.
///
/// Names that could escape `dir` are skipped.
pub async fn save_download(dir: &Path, name: &str, raw: &str) {
    if name.is_empty() || name.contains(['/', '\\']) || name == "." || name.contains("..") {
        tracing::warn!(name, "refusing to save download with unsafe file name");
        return;
    }
    let path = dir.join(name);
    if let Err(err) = save(dir, &path, raw).await {
        tracing::warn!(error = %err, "download not saved: {}", path.display());
    } else {
        tracing::debug!("saved download: {}", path.display());
    }
}

async fn save(dir: &Path, path: &Path, raw: &str) -> Result<(), SyncError> {
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| io_err(dir, e))?;
    tokio::fs::write(path, raw)
        .await
        .map_err(|e| io_err(path, e))
}
