//! The extractor contract.

use crate::error::ExtractError;
use std::time::Duration;
use sweep_browser::PageActions;
use sweep_core::ResultTag;

/// Site-specific logic that turns one item into one result.
///
/// Implementations loop internally for up to `retries + 1` attempts and
/// must not touch anything outside the page they are given: no closing or
/// replacing it, no shared state between items.
#[async_trait::async_trait]
pub trait Extractor: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &str;

    /// Retries this site usually needs; the orchestrator caps it.
    fn default_retries(&self) -> u32;

    /// Classify one normalized, non-blank item.
    async fn extract(
        &self,
        page: &dyn PageActions,
        item: &str,
        retries: u32,
    ) -> Result<ResultTag, ExtractError>;
}

/// Waits used by an extractor attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtractTiming {
    /// Bound on a single navigation
    pub navigation_timeout: Duration,
    /// Pause after an interaction so client-side rendering can finish
    pub settle: Duration,
    /// Pause before the next attempt
    pub retry_delay: Duration,
    /// Pause between typed characters
    pub key_delay: Duration,
}

impl Default for ExtractTiming {
    fn default() -> Self {
        Self {
            navigation_timeout: Duration::from_secs(45),
            settle: Duration::from_secs(4),
            retry_delay: Duration::from_secs(2),
            key_delay: Duration::from_millis(60),
        }
    }
}

impl ExtractTiming {
    /// No waiting at all; for tests against scripted pages.
    #[must_use]
    pub fn immediate() -> Self {
        Self {
            navigation_timeout: Duration::from_secs(1),
            settle: Duration::ZERO,
            retry_delay: Duration::ZERO,
            key_delay: Duration::ZERO,
        }
    }
}

/// Sleep unless the duration is zero.
pub(crate) async fn pause(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}
