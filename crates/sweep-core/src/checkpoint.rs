//! Checkpoint sink contract.
//!
//! A checkpoint is an event, not an entity: the orchestrator decides when
//! to flush, the sink decides how and whether it worked.

use crate::types::ResultTag;
use thiserror::Error;

/// Failure reported by a [`CheckpointSink`].
///
/// Never fatal to a run: the orchestrator logs it and later flushes get
/// another chance to persist the same and newer state.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Filesystem failure.
    #[error("checkpoint I/O failed: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot could not be serialized.
    #[error("checkpoint serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Remote or database store rejected the write.
    #[error("checkpoint store write failed: {0}")]
    Store(String),
}

/// Durable persistence for the full result sequence.
///
/// `flush` is awaited from the orchestrator loop and never runs concurrently
/// with another flush of the same run. The slice is only borrowed for the
/// duration of the call.
#[async_trait::async_trait]
pub trait CheckpointSink: Send + Sync {
    /// Persist a snapshot of every result, index-aligned with the items.
    async fn flush(&self, results: &[ResultTag]) -> Result<(), SinkError>;
}
