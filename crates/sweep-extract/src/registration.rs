//! Lodging registration lookup against both tourism registries.
//!
//! The local-lodging registry has a direct detail page per number; the
//! tourist-establishment registry only offers a search form. A number is
//! looked up in both and the answers are merged into one result of three
//! fields: address, municipality, location.

use crate::attempt::{attempt_loop, undecided, Probe};
use crate::error::ExtractError;
use crate::extractor::{pause, ExtractTiming, Extractor};
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use sweep_browser::PageActions;
use sweep_core::{Payload, ResultTag};

/// Local-lodging detail page; the number is appended.
pub const DETAIL_URL: &str = "https://rnt.turismodeportugal.pt/RNT/RNAL.aspx?nr=";
/// Tourist-establishment search form.
pub const SEARCH_URL: &str = "https://rnt.turismodeportugal.pt/RNT/Pesquisa_ET.aspx";

const NOT_FOUND_TEXT: &str = "não foram encontrados";

const ADDRESS_LABELS: &[&str] = &["Morada:", "Localização:", "Morada"];
const MUNICIPALITY_LABELS: &[&str] = &["Concelho:", "Concelho"];
const PARISH_LABELS: &[&str] = &["Freguesia:", "Freguesia"];

const LABEL_CANDIDATES: &str = "span, label, td, b";
const RESULT_ROWS: &str = "tr.GridRow, tr.GridAlternatingRow, .GridView tr:nth-child(2)";

const SEARCH_INPUT: &str =
    "input[id*='NumRegisto'], input[name*='NumRegisto'], input[id*='txtNRegisto']";
const SEARCH_BUTTON: &str =
    "input[id*='btnPesquisar'], button[id*='btnPesquisar'], input[type=submit][value*='Pesquisar']";

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn element_text(element: ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<String>())
}

/// The innermost element under `start` whose text still starts with `label`.
fn innermost_with_label<'a>(start: ElementRef<'a>, label: &str) -> ElementRef<'a> {
    let mut current = start;
    while let Some(child) = current
        .children()
        .filter_map(ElementRef::wrap)
        .find(|c| element_text(*c).starts_with(label))
    {
        current = child;
    }
    current
}

/// Value shown next to a label: the parent's text without the label, or
/// the following sibling element when the parent holds nothing else.
fn labelled_value(document: &Html, label: &str) -> Option<String> {
    let candidates = Selector::parse(LABEL_CANDIDATES).ok()?;
    let first = document
        .select(&candidates)
        .find(|el| element_text(*el).starts_with(label))?;
    let target = innermost_with_label(first, label);

    if let Some(parent) = target.parent().and_then(ElementRef::wrap) {
        let text = element_text(parent).replacen(label, "", 1).trim().to_string();
        if text.chars().count() > 1 {
            return Some(text);
        }
    }

    target
        .next_siblings()
        .find_map(ElementRef::wrap)
        .map(element_text)
        .filter(|text| !text.is_empty())
}

fn first_labelled(document: &Html, labels: &[&str]) -> Option<String> {
    labels.iter().find_map(|label| labelled_value(document, label))
}

/// Address (with parish appended) and municipality from a detail page.
#[must_use]
pub fn parse_detail_page(html: &str) -> Option<(String, Option<String>)> {
    let document = Html::parse_document(html);
    let address = first_labelled(&document, ADDRESS_LABELS)?;
    let municipality = first_labelled(&document, MUNICIPALITY_LABELS);
    let address = match first_labelled(&document, PARISH_LABELS) {
        Some(parish) => format!("{address} - {parish}"),
        None => address,
    };
    Some((address, municipality))
}

/// Last cell of the first result row of a search page.
#[must_use]
pub fn parse_search_results(html: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let rows = Selector::parse(RESULT_ROWS).ok()?;
    let cells = Selector::parse("td").ok()?;

    let row = document.select(&rows).next()?;
    row.select(&cells)
        .last()
        .map(element_text)
        .filter(|text| !text.is_empty())
}

fn says_not_found(html: &str) -> bool {
    html.to_lowercase().contains(NOT_FOUND_TEXT)
}

/// Classify the detail page: `Success(Fields[address, municipality])` or `NotFound`.
#[must_use]
pub fn classify_detail_page(html: &str) -> Probe {
    if let Some((address, municipality)) = parse_detail_page(html) {
        Probe::Decided(ResultTag::Success(Payload::Fields(vec![
            Some(address),
            municipality,
        ])))
    } else if says_not_found(html) {
        Probe::Decided(ResultTag::NotFound)
    } else {
        undecided(html)
    }
}

/// Classify the search page: `Success(Text(location))` or `NotFound`.
#[must_use]
pub fn classify_search_page(html: &str) -> Probe {
    if let Some(location) = parse_search_results(html) {
        Probe::Decided(ResultTag::success(location))
    } else if says_not_found(html) {
        Probe::Decided(ResultTag::NotFound)
    } else {
        undecided(html)
    }
}

/// Merge the two registry answers into one result.
///
/// Both sides must be decided for a `Success`; a side that was not found
/// contributes empty fields. A transient failure on either side wins over
/// everything else so the number is retried on the next run.
#[must_use]
pub fn combine(detail: ResultTag, search: ResultTag) -> ResultTag {
    let detail_fields = match &detail {
        ResultTag::Success(Payload::Fields(fields)) => Some((
            fields.first().cloned().flatten(),
            fields.get(1).cloned().flatten(),
        )),
        ResultTag::NotFound => Some((None, None)),
        _ => None,
    };
    let location = match &search {
        ResultTag::Success(payload) => Some(Some(payload.to_string())),
        ResultTag::NotFound => Some(None),
        _ => None,
    };

    if let (Some((address, municipality)), Some(location)) = (detail_fields, location) {
        if address.is_none() && municipality.is_none() && location.is_none() {
            return ResultTag::NotFound;
        }
        return ResultTag::Success(Payload::Fields(vec![address, municipality, location]));
    }

    match (detail, search) {
        (ResultTag::TransientError, _) | (_, ResultTag::TransientError) => {
            ResultTag::TransientError
        }
        (ResultTag::SiteUnavailable(reason), _) | (_, ResultTag::SiteUnavailable(reason)) => {
            ResultTag::SiteUnavailable(reason)
        }
        _ => ResultTag::UnknownOutcome,
    }
}

/// Looks a registration number up in both tourism registries.
#[derive(Debug, Clone)]
pub struct RegistrationExtractor {
    detail_url: String,
    search_url: String,
    timing: ExtractTiming,
    search_settle: Duration,
}

impl Default for RegistrationExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl RegistrationExtractor {
    /// Extractor for both public registries with their own settle times.
    #[must_use]
    pub fn new() -> Self {
        Self {
            detail_url: DETAIL_URL.to_string(),
            search_url: SEARCH_URL.to_string(),
            timing: ExtractTiming {
                settle: Duration::from_secs(2),
                ..ExtractTiming::default()
            },
            search_settle: Duration::from_secs(5),
        }
    }

    /// Point at another deployment of the registries.
    #[must_use]
    pub fn with_urls(
        mut self,
        detail_url: impl Into<String>,
        search_url: impl Into<String>,
    ) -> Self {
        self.detail_url = detail_url.into();
        self.search_url = search_url.into();
        self
    }

    /// Replace every wait, using one settle time for both lookups.
    #[must_use]
    pub fn with_timing(mut self, timing: ExtractTiming) -> Self {
        self.timing = timing;
        self.search_settle = timing.settle;
        self
    }

    /// Bound each navigation by `timeout`, keeping the other waits.
    #[must_use]
    pub fn with_navigation_timeout(mut self, timeout: Duration) -> Self {
        self.timing.navigation_timeout = timeout;
        self
    }

    async fn detail_attempt(
        &self,
        page: &dyn PageActions,
        number: &str,
    ) -> sweep_browser::Result<Probe> {
        let url = format!("{}{number}", self.detail_url);
        page.navigate(&url, self.timing.navigation_timeout).await?;
        pause(self.timing.settle).await;
        let html = page.content().await?;
        Ok(classify_detail_page(&html))
    }

    async fn search_attempt(
        &self,
        page: &dyn PageActions,
        number: &str,
    ) -> sweep_browser::Result<Probe> {
        page.navigate(&self.search_url, self.timing.navigation_timeout)
            .await?;

        page.fill_field(SEARCH_INPUT, number).await?;
        page.click(SEARCH_BUTTON).await?;
        pause(self.search_settle).await;

        let html = page.content().await?;
        Ok(classify_search_page(&html))
    }
}

#[async_trait::async_trait]
impl Extractor for RegistrationExtractor {
    fn name(&self) -> &str {
        "registration"
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
        let delay = self.timing.retry_delay;
        let detail = attempt_loop("registration/detail", item, retries, delay, |_| {
            self.detail_attempt(page, item)
        })
        .await?;

        let search = attempt_loop("registration/search", item, retries, delay, |_| {
            self.search_attempt(page, item)
        })
        .await?;

        tracing::debug!(
            "registration {}: detail={} search={}",
            item,
            detail.kind(),
            search.kind()
        );
        Ok(combine(detail, search))
    }
}
