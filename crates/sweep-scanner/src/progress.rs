//! Progress observers backed by a channel.

use sweep_core::ProgressReporter;
use tokio::sync::mpsc;

/// One update pushed by the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    /// Completed fraction in `[0, 1]`
    Progress(f64),
    /// Status line for the current item
    Status(String),
}

/// Forwards updates to an unbounded channel, for a UI or CLI task that
/// renders them. Updates sent after the receiver is gone are dropped.
#[derive(Debug, Clone)]
pub struct ChannelProgress {
    tx: mpsc::UnboundedSender<ProgressEvent>,
}

impl ChannelProgress {
    /// Reporter plus the receiving end of its channel.
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ProgressEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl ProgressReporter for ChannelProgress {
    fn progress(&self, fraction: f64) {
        let _ = self.tx.send(ProgressEvent::Progress(fraction));
    }

    fn status(&self, text: &str) {
        let _ = self.tx.send(ProgressEvent::Status(text.to_string()));
    }
}
