//! Odometer reading from a classified car listing.

use crate::attempt::{attempt_loop, undecided, Probe};
use crate::error::ExtractError;
use crate::extractor::{pause, ExtractTiming, Extractor};
use regex::Regex;
use std::sync::OnceLock;
use std::time::Duration;
use sweep_browser::PageActions;
use sweep_core::{Payload, ResultTag};

/// Site that listing ids and slugs are resolved against.
pub const LISTING_BASE_URL: &str = "https://www.olx.pt/";

const MILEAGE_LABELS: &[&str] = &["Quilómetros", "Quilometros", "Quilometragem"];

/// Lines after a label that may still hold its value.
const LABEL_LOOKAHEAD: usize = 3;

const REMOVED_MARKERS: &[&str] = &[
    "não se encontra disponível",
    "anúncio removido",
    "este anúncio já não está disponível",
];

fn km_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // Plain digits or thousands groups separated by space, dot or nbsp
        Regex::new(r"(?i)\b(\d{1,3}(?:[ .\x{00A0}\x{202F}]\d{3})+|\d+)[ \x{00A0}\x{202F}]*km\b")
            .expect("mileage regex is hardcoded and valid")
    })
}

fn parse_km(text: &str) -> Option<u64> {
    let caps = km_pattern().captures(text)?;
    let digits: String = caps[1].chars().filter(char::is_ascii_digit).collect();
    digits.parse().ok()
}

/// Find the odometer value in a listing's visible text.
///
/// Prefers a number within a few lines of a mileage label, then falls back
/// to the first `<n> km` anywhere on the page.
#[must_use]
pub fn find_mileage(text: &str) -> Option<u64> {
    let lines: Vec<&str> = text.lines().map(str::trim).collect();

    for (i, line) in lines.iter().enumerate() {
        if !MILEAGE_LABELS.iter().any(|label| line.contains(label)) {
            continue;
        }
        let end = (i + LABEL_LOOKAHEAD).min(lines.len().saturating_sub(1));
        if let Some(km) = lines[i..=end].iter().find_map(|l| parse_km(l)) {
            return Some(km);
        }
    }

    lines.iter().find_map(|l| parse_km(l))
}

/// Classify a listing page from its visible text.
#[must_use]
pub fn classify_listing(text: &str) -> Probe {
    if let Some(km) = find_mileage(text) {
        return Probe::Decided(ResultTag::Success(Payload::Measurement {
            value: km,
            unit: "km".to_string(),
        }));
    }

    let lower = text.to_lowercase();
    if REMOVED_MARKERS.iter().any(|m| lower.contains(m)) {
        return Probe::Decided(ResultTag::NotFound);
    }

    undecided(text)
}

/// Reads the mileage from car listings.
#[derive(Debug, Clone)]
pub struct MileageExtractor {
    base_url: String,
    timing: ExtractTiming,
}

impl Default for MileageExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl MileageExtractor {
    /// Extractor for the public listing site; pages get a longer settle.
    #[must_use]
    pub fn new() -> Self {
        Self {
            base_url: LISTING_BASE_URL.to_string(),
            timing: ExtractTiming {
                settle: Duration::from_secs(5),
                ..ExtractTiming::default()
            },
        }
    }

    /// Resolve listing ids against another site.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        self.base_url = base_url;
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

    /// Build the listing URL for an item.
    ///
    /// A full URL is used as-is, a numeric id is appended to the base, and
    /// anything else is treated as a listing slug.
    #[must_use]
    pub fn listing_url(&self, item: &str) -> String {
        if item.starts_with("http://") || item.starts_with("https://") {
            item.to_string()
        } else if item.chars().all(|c| c.is_ascii_digit()) {
            format!("{}{item}", self.base_url)
        } else {
            format!("{}d/anuncio/{item}.html", self.base_url)
        }
    }

    async fn attempt(&self, page: &dyn PageActions, url: &str) -> sweep_browser::Result<Probe> {
        page.navigate(url, self.timing.navigation_timeout).await?;
        pause(self.timing.settle).await;
        let text = page.inner_text().await?;
        Ok(classify_listing(&text))
    }
}

#[async_trait::async_trait]
impl Extractor for MileageExtractor {
    fn name(&self) -> &str {
        "mileage"
    }

    fn default_retries(&self) -> u32 {
        2
    }

    async fn extract(
        &self,
        page: &dyn PageActions,
        item: &str,
        retries: u32,
    ) -> Result<ResultTag, ExtractError> {
        let url = self.listing_url(item);
        tracing::debug!("mileage: {} -> {}", item, url);
        attempt_loop(self.name(), item, retries, self.timing.retry_delay, |_| {
            self.attempt(page, &url)
        })
        .await
    }
}
