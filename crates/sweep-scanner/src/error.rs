//! Orchestrator errors.

use sweep_browser::BrowserError;
use sweep_core::ResultTag;
use thiserror::Error;

/// Failures that end a run.
#[derive(Debug, Error)]
pub enum ScanError {
    /// Options rejected before any session opened.
    #[error("invalid run options: {0}")]
    InvalidOptions(String),

    /// No browser could be launched, even after the install fallback.
    /// `partial` holds every result decided before the failure; it has
    /// already been handed to the sink.
    #[error("run aborted: {source}")]
    Launch {
        /// Launch failure that ended the run
        #[source]
        source: BrowserError,
        /// Results as of the failure
        partial: Vec<ResultTag>,
    },

    /// A checkpoint file could not be read.
    #[error("checkpoint file error: {0}")]
    Checkpoint(#[from] sweep_core::SinkError),
}

impl ScanError {
    /// Results computed before a fatal failure, if any.
    #[must_use]
    pub fn partial_results(&self) -> Option<&[ResultTag]> {
        match self {
            Self::Launch { partial, .. } => Some(partial),
            _ => None,
        }
    }
}

/// Result type alias for orchestrator operations.
pub type Result<T> = std::result::Result<T, ScanError>;
