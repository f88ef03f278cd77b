//! Progress and status reporting.
//!
//! Write-only: the orchestrator pushes a fraction in `[0, 1]` and a free-text
//! status line to an observer and never reads anything back.

/// Observer for run progress.
pub trait ProgressReporter: Send + Sync {
    /// Completed fraction of the run, monotonically non-decreasing.
    fn progress(&self, fraction: f64);

    /// Free-text status for the item currently being worked on.
    fn status(&self, text: &str);
}

/// Discards every update.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn progress(&self, _fraction: f64) {}

    fn status(&self, _text: &str) {}
}

/// Forwards updates to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingProgress;

impl ProgressReporter for TracingProgress {
    fn progress(&self, fraction: f64) {
        tracing::trace!(fraction, "progress");
    }

    fn status(&self, text: &str) {
        tracing::info!("{}", text);
    }
}
