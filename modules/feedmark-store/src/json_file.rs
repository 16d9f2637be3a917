use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{Duration, Utc};
use tracing::{debug, info, warn};

use feedmark_common::{Anchor, FeedmarkError, Result};

use crate::traits::AnchorStore;

/// Stores a single anchor as pretty-printed JSON on disk.
pub struct JsonFileAnchorStore {
    path: PathBuf,
    retention: Duration,
}

impl JsonFileAnchorStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self::with_retention(path, Anchor::retention())
    }

    pub fn with_retention(path: impl Into<PathBuf>, retention: Duration) -> Self {
        Self {
            path: path.into(),
            retention,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "anchor".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl AnchorStore for JsonFileAnchorStore {
    async fn load_anchor(&self) -> Result<Option<Anchor>> {
        let json = match tokio::fs::read_to_string(&self.path).await {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(FeedmarkError::Io(e)),
        };

        let anchor: Anchor = match serde_json::from_str(&json) {
            Ok(anchor) => anchor,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Unreadable anchor file, ignoring");
                return Ok(None);
            }
        };

        if anchor.is_expired(Utc::now(), self.retention) {
            info!(
                path = %self.path.display(),
                captured_at = %anchor.captured_at,
                "Saved anchor expired, discarding"
            );
            self.clear_anchor().await?;
            return Ok(None);
        }

        Ok(Some(anchor))
    }

    async fn save_anchor(&self, anchor: &Anchor) -> Result<()> {
        let json = serde_json::to_string_pretty(anchor)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Write-then-rename: readers never see a partial file.
        let tmp = self.temp_path();
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(|e| {
            FeedmarkError::Storage(format!(
                "failed to move {} into place: {e}",
                tmp.display()
            ))
        })?;

        debug!(path = %self.path.display(), item_id = ?anchor.item_id, "Anchor saved");
        Ok(())
    }

    async fn clear_anchor(&self) -> Result<()> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(FeedmarkError::Io(e)),
        }
    }
}
