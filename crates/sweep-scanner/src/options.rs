//! Per-run options.

use crate::error::{Result, ScanError};
use std::time::Duration;
use sweep_core::{ResultTag, RunConfig};

/// How items are scheduled onto the browser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// One item at a time on the session's page.
    #[default]
    Sequential,
    /// Fixed-size chunks run concurrently, one page per chunk member.
    Chunked {
        /// Items per chunk
        size: usize,
    },
}

/// Which seeded results a resumed run hands back to the extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResumePolicy {
    /// Reprocess `Unprocessed`, `TransientError` and `UnknownOutcome`.
    #[default]
    RetryFailed,
    /// Reprocess only `Unprocessed`; every other kind is kept.
    KeepAll,
}

impl ResumePolicy {
    /// Whether an entry seeded with `tag` goes to the extractor.
    #[must_use]
    pub fn should_process(self, tag: &ResultTag) -> bool {
        match self {
            Self::RetryFailed => tag.needs_processing(),
            Self::KeepAll => !tag.is_terminal(),
        }
    }
}

/// Options for one orchestrator run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Results of an earlier run, padded or truncated to the item count
    pub initial_results: Option<Vec<ResultTag>>,
    /// Flush to the sink after every this many items
    pub batch_size: usize,
    /// Replace the browser before every this-many-th item
    pub recycle_every: usize,
    /// Upper bound on the extractor's own retry count
    pub retries_per_item: u32,
    /// Page every fresh session lands on before its first item
    pub init_url: Option<String>,
    /// Bound on the navigation to `init_url`
    pub init_timeout: Duration,
    /// Which seeded results are handed back to the extractor
    pub resume: ResumePolicy,
    /// Sequential or chunked scheduling
    pub mode: ExecutionMode,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            initial_results: None,
            batch_size: 10,
            recycle_every: 50,
            retries_per_item: 2,
            init_url: None,
            init_timeout: Duration::from_secs(60),
            resume: ResumePolicy::default(),
            mode: ExecutionMode::default(),
        }
    }
}

impl RunOptions {
    /// Options taken from the `[run]` section of the config file.
    #[must_use]
    pub fn from_config(config: &RunConfig) -> Self {
        Self {
            batch_size: config.batch_size,
            recycle_every: config.recycle_every,
            retries_per_item: config.retries_per_item,
            resume: if config.retry_failed {
                ResumePolicy::RetryFailed
            } else {
                ResumePolicy::KeepAll
            },
            mode: config
                .chunk_size
                .map_or(ExecutionMode::Sequential, |size| ExecutionMode::Chunked { size }),
            ..Self::default()
        }
    }

    /// Resume from these results.
    #[must_use]
    pub fn with_initial_results(mut self, results: Vec<ResultTag>) -> Self {
        self.initial_results = Some(results);
        self
    }

    /// Set the checkpoint cadence.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the browser recycle cadence.
    #[must_use]
    pub fn with_recycle_every(mut self, recycle_every: usize) -> Self {
        self.recycle_every = recycle_every;
        self
    }

    /// Cap the extractor's retries per item.
    #[must_use]
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries_per_item = retries;
        self
    }

    /// Open this page after every browser launch.
    #[must_use]
    pub fn with_init_url(mut self, url: impl Into<String>) -> Self {
        self.init_url = Some(url.into());
        self
    }

    /// Choose which seeded results are reprocessed.
    #[must_use]
    pub fn with_resume(mut self, resume: ResumePolicy) -> Self {
        self.resume = resume;
        self
    }

    /// Choose sequential or chunked scheduling.
    #[must_use]
    pub fn with_mode(mut self, mode: ExecutionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Reject cadences that would divide by zero or never progress.
    pub fn validate(&self) -> Result<()> {
        if self.batch_size == 0 {
            return Err(ScanError::InvalidOptions(
                "batch_size must be at least 1".to_string(),
            ));
        }
        if self.recycle_every == 0 {
            return Err(ScanError::InvalidOptions(
                "recycle_every must be at least 1".to_string(),
            ));
        }
        if self.mode == (ExecutionMode::Chunked { size: 0 }) {
            return Err(ScanError::InvalidOptions(
                "chunk size must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
