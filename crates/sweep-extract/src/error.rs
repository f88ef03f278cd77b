//! Extractor errors.

use thiserror::Error;

/// The only fault an extractor lets escape.
///
/// Everything else (timeouts, navigation failures, missing text) is
/// converted to a `ResultTag` inside the extractor's attempt loop.
#[derive(Debug, Error)]
pub enum ExtractError {
    /// The browser process or its connection died mid-extraction.
    #[error("browser session crashed: {0}")]
    SessionCrashed(String),
}
