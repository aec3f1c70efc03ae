//! Local filesystem watermark store.
//!
//! Writes go to a sibling temp file which is synced, renamed over the
//! state file, and followed by a sync of the parent directory. A crash at
//! any point leaves either the old or the new watermark on disk.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::Watermark;
use crate::storage::WatermarkStore;

/// File-backed watermark store.
#[derive(Debug, Clone)]
pub struct FileWatermarkStore {
    path: PathBuf,
}

impl FileWatermarkStore {
    /// Create a store persisting to `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory holding the state file (`.` for bare file names).
    fn parent_dir(&self) -> PathBuf {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Write bytes atomically and durably (temp file, fsync, rename, fsync dir).
    async fn write_bytes(&self, bytes: &[u8]) -> Result<()> {
        let dir = self.parent_dir();
        tokio::fs::create_dir_all(&dir).await?;

        let tmp = self.tmp_path();
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&tmp, &self.path).await?;
        sync_dir(&dir).await?;
        Ok(())
    }
}

#[cfg(unix)]
async fn sync_dir(dir: &Path) -> Result<()> {
    let handle = tokio::fs::File::open(dir).await?;
    handle.sync_all().await?;
    Ok(())
}

#[cfg(not(unix))]
async fn sync_dir(_dir: &Path) -> Result<()> {
    Ok(())
}

#[async_trait]
impl WatermarkStore for FileWatermarkStore {
    async fn load(&self) -> Result<Watermark> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::info!(
                    "No watermark at {}; starting from the epoch",
                    self.path.display()
                );
                return Ok(Watermark::epoch());
            }
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                log::warn!(
                    "Watermark file {} is not valid UTF-8; treating as epoch",
                    self.path.display()
                );
                return Ok(Watermark::epoch());
            }
            Err(e) => {
                return Err(AppError::watermark(format!(
                    "reading {}: {}",
                    self.path.display(),
                    e
                )));
            }
        };

        let line = content.lines().find(|l| !l.trim().is_empty()).unwrap_or("");
        match Watermark::parse_line(line) {
            Some(watermark) => Ok(watermark),
            None => {
                log::warn!(
                    "Watermark file {} is corrupt ({:?}); treating as epoch",
                    self.path.display(),
                    line
                );
                Ok(Watermark::epoch())
            }
        }
    }

    async fn save(&self, watermark: Watermark) -> Result<()> {
        let line = watermark.to_line();
        self.write_bytes(line.as_bytes()).await.map_err(|e| {
            AppError::watermark(format!("writing {}: {}", self.path.display(), e))
        })?;
        log::debug!("Watermark saved: {} ({})", watermark, line);
        Ok(())
    }

    fn location(&self) -> String {
        self.path.display().to_string()
    }
}
