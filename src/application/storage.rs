use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use url::Url;

use crate::domain::{DownloadError, ResolvedFile};
use crate::utils::unique_path;

/// The application's folder under the public downloads area.
#[derive(Debug, Clone)]
pub struct DownloadStore {
    dir: PathBuf,
}

impl DownloadStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Creates the folder and picks a collision-free path for `display_name`.
    pub async fn reserve(
        &self,
        display_name: &str,
        mime_type: &str,
    ) -> Result<ResolvedFile, DownloadError> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            DownloadError::WriteFailure(format!(
                "Failed to create {}: {}",
                self.dir.display(),
                e
            ))
        })?;

        let final_path = unique_path(&self.dir.join(display_name));
        let display_name = final_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| display_name.to_string());

        Ok(ResolvedFile {
            final_path,
            display_name,
            mime_type: mime_type.to_string(),
        })
    }

    /// Writes every byte and flushes before reporting success. A failed
    /// attempt may leave a partial file behind.
    pub async fn write(&self, file: &ResolvedFile, data: &[u8]) -> Result<(), DownloadError> {
        let write_error = |e: std::io::Error| {
            DownloadError::WriteFailure(format!("{}: {}", file.display_name, e))
        };

        let mut out = tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&file.final_path)
            .await
            .map_err(write_error)?;
        out.write_all(data).await.map_err(write_error)?;
        out.flush().await.map_err(write_error)?;
        out.sync_all().await.map_err(write_error)?;

        info!(path = %file.final_path.display(), bytes = data.len(), "Saved download");
        Ok(())
    }

    /// Deletes everything inside the folder. Returns how many entries went,
    /// directories included.
    pub async fn clear(&self) -> Result<usize, DownloadError> {
        let dir = self.dir.clone();
        let deleted = tokio::task::spawn_blocking(move || {
            if dir.exists() {
                clear_dir(&dir)
            } else {
                0
            }
        })
        .await
        .map_err(|e| DownloadError::WriteFailure(e.to_string()))?;

        debug!(deleted, dir = %self.dir.display(), "Cleared saved files");
        Ok(deleted)
    }
}

fn clear_dir(dir: &Path) -> usize {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return 0;
    };

    let mut count = 0;
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            count += clear_dir(&path);
            if std::fs::remove_dir(&path).is_ok() {
                count += 1;
            }
        } else if std::fs::remove_file(&path).is_ok() {
            count += 1;
        }
    }
    count
}

/// `file://` URI for a saved path.
pub fn file_uri(path: &Path) -> Result<String, DownloadError> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|e| DownloadError::WriteFailure(e.to_string()))?
            .join(path)
    };
    Url::from_file_path(&absolute)
        .map(String::from)
        .map_err(|_| DownloadError::WriteFailure(format!("No URI for {}", absolute.display())))
}
