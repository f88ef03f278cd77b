//! Pet microchip registry lookup.
//!
//! The registry exposes a single search box on its landing page. The
//! extractor types the transponder number, submits, and reads the banner
//! the site renders underneath.

use crate::attempt::{attempt_loop, undecided, Probe};
use crate::error::ExtractError;
use crate::extractor::{pause, ExtractTiming, Extractor};
use sweep_browser::actions::is_on_page;
use sweep_browser::{BrowserError, PageActions};
use std::time::Duration;
use sweep_core::ResultTag;

/// Landing page of the national pet registry.
pub const REGISTRY_URL: &str = "https://www.siac.pt/pt";

const MISSING_TEXT: &str = "Animal com registo no SIAC e que se encontra desaparecido";
const REGISTERED_TEXT: &str = "Animal com registo no SIAC";
const NOT_REGISTERED_TEXT: &str = "Animal sem registo";

/// Result text for a registered animal.
pub const REGISTERED: &str = "registered";
/// Result text for a registered animal that was reported missing.
pub const REGISTERED_MISSING: &str = "registered, reported missing";

/// Attribute put on the search input so later actions can address it.
const TARGET_SELECTOR: &str = "[data-sweep-target]";

/// Finds the transponder input, clears it and tags it.
const MARK_INPUT_SCRIPT: &str = r"(() => {
  document.querySelectorAll('[data-sweep-target]').forEach(el => el.removeAttribute('data-sweep-target'));
  const inputs = Array.from(document.querySelectorAll('input[type=text], input[type=search], input:not([type])'));
  const el = inputs.find(i => /transponder|microchip|chip/i.test((i.placeholder || '') + ' ' + (i.name || '') + ' ' + (i.id || ''))) || inputs[0];
  if (!el) return false;
  el.value = '';
  el.setAttribute('data-sweep-target', '1');
  return true;
})()";

/// Classify the registry's answer. The "missing" banner contains the
/// "registered" banner, so it is checked first.
#[must_use]
pub fn classify_registry_page(html: &str) -> Probe {
    if html.contains(MISSING_TEXT) {
        Probe::Decided(ResultTag::success(REGISTERED_MISSING))
    } else if html.contains(REGISTERED_TEXT) {
        Probe::Decided(ResultTag::success(REGISTERED))
    } else if html.contains(NOT_REGISTERED_TEXT) {
        Probe::Decided(ResultTag::NotFound)
    } else {
        undecided(html)
    }
}

/// Looks up microchip numbers on the national pet registry.
#[derive(Debug, Clone)]
pub struct MicrochipExtractor {
    url: String,
    timing: ExtractTiming,
}

impl Default for MicrochipExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl MicrochipExtractor {
    /// Extractor for the public registry with default timing.
    #[must_use]
    pub fn new() -> Self {
        Self {
            url: REGISTRY_URL.to_string(),
            timing: ExtractTiming::default(),
        }
    }

    /// Drive another registry deployment.
    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = url.into();
        self
    }

    /// Replace every wait.
    #[must_use]
    pub fn with_timing(mut self, timing: ExtractTiming) -> Self {
        self.timing = timing;
        self
    }

    /// Bound each navigation by `timeout`, keeping the other waits.
    #[must_use]
    pub fn with_navigation_timeout(mut self, timeout: Duration) -> Self {
        self.timing.navigation_timeout = timeout;
        self
    }

    /// The registry URL this extractor drives.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    async fn attempt(&self, page: &dyn PageActions, chip: &str) -> sweep_browser::Result<Probe> {
        let current = page.current_url().await?.unwrap_or_default();
        // A banner left over from the previous item would be read as this one's
        let stale = is_on_page(&current, &self.url)
            && matches!(classify_registry_page(&page.content().await?), Probe::Decided(_));
        if stale || !is_on_page(&current, &self.url) {
            page.navigate(&self.url, self.timing.navigation_timeout).await?;
            pause(self.timing.settle).await;
        }

        let marked = page.evaluate(MARK_INPUT_SCRIPT).await?;
        if marked.as_bool() != Some(true) {
            return Err(BrowserError::SelectorNotFound("transponder input".to_string()));
        }

        page.type_text(TARGET_SELECTOR, chip, self.timing.key_delay)
            .await?;
        page.press_key(TARGET_SELECTOR, "Enter").await?;
        pause(self.timing.settle).await;

        let html = page.content().await?;
        Ok(classify_registry_page(&html))
    }
}

#[async_trait::async_trait]
impl Extractor for MicrochipExtractor {
    fn name(&self) -> &str {
        "microchip"
    }

    fn default_retries(&self) -> u32 {
        1
    }

    async fn extract(
        &self,
        page: &dyn PageActions,
        item: &str,
        retries: u32,
    ) -> Result<ResultTag, ExtractError> {
        attempt_loop(self.name(), item, retries, self.timing.retry_delay, |_| {
            self.attempt(page, item)
        })
        .await
    }
}
