use crate::error::Result;
use std::time::Duration;

/// Page operations available to extractors.
///
/// Extractors receive a page by reference and drive it; they never close
/// or replace it. Implemented by [`crate::ChromiumPage`] and by test fakes.
#[async_trait::async_trait]
pub trait PageActions: Send + Sync {
    /// Navigate to a URL, failing with `Timeout` after `timeout`
    async fn navigate(&self, url: &str, timeout: Duration) -> Result<()>;

    /// URL the page is currently showing
    async fn current_url(&self) -> Result<Option<String>>;

    /// Full HTML of the current document
    async fn content(&self) -> Result<String>;

    /// Rendered text of the document body
    async fn inner_text(&self) -> Result<String>;

    /// Evaluate a script and return its JSON value (`Null` when it returns nothing)
    async fn evaluate(&self, script: &str) -> Result<serde_json::Value>;

    /// Type text into an element one key at a time
    async fn type_text(&self, selector: &str, text: &str, per_key_delay: Duration)
        -> Result<()>;

    /// Press a named key ("Enter") on an element
    async fn press_key(&self, selector: &str, key: &str) -> Result<()>;

    /// Click an element by selector
    async fn click(&self, selector: &str) -> Result<()>;

    /// Set a form field's value by selector
    async fn fill_field(&self, selector: &str, value: &str) -> Result<()>;
}

/// Whether `current` already shows `target` (same host, path under the
/// target's path). Lets an extractor skip a navigation it does not need.
pub fn is_on_page(current: &str, target: &str) -> bool {
    let (Ok(current), Ok(target)) = (url::Url::parse(current), url::Url::parse(target)) else {
        return false;
    };

    current.host_str() == target.host_str()
        && current
            .path()
            .trim_end_matches('/')
            .starts_with(target.path().trim_end_matches('/'))
}
