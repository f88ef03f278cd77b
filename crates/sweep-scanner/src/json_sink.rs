//! Checkpointing to a JSON file.

use crate::error::{Result, ScanError};
use std::path::{Path, PathBuf};
use sweep_core::{CheckpointSink, ResultTag, SinkError};

/// Writes the full result list to a JSON file on every flush.
///
/// Each flush writes a sibling `.tmp` file and renames it over the target,
/// so a crash mid-write leaves the previous checkpoint intact.
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    path: PathBuf,
}

impl JsonFileSink {
    /// Sink writing to `path`; nothing touches the disk until the first flush.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Checkpoint file location.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().unwrap_or_default().to_os_string();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait::async_trait]
impl CheckpointSink for JsonFileSink {
    async fn flush(&self, results: &[ResultTag]) -> std::result::Result<(), SinkError> {
        let json = serde_json::to_vec_pretty(results)?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }

        let tmp = self.tmp_path();
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

/// Read a checkpoint written by [`JsonFileSink`]. A missing file is an
/// empty checkpoint.
pub async fn load_checkpoint(path: &Path) -> Result<Vec<ResultTag>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => serde_json::from_slice(&bytes)
            .map_err(|e| ScanError::Checkpoint(SinkError::Serialization(e))),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No checkpoint at {}, starting fresh", path.display());
            Ok(Vec::new())
        }
        Err(e) => Err(ScanError::Checkpoint(SinkError::Io(e))),
    }
}
