//! Bounded attempt loop shared by every extractor.

use crate::error::ExtractError;
use crate::extractor::pause;
use std::fmt;
use std::future::Future;
use std::time::Duration;
use sweep_browser::BrowserError;
use sweep_core::ResultTag;

/// What one attempt concluded from the page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe {
    /// The page gave a definitive answer.
    Decided(ResultTag),
    /// The site is showing a challenge or maintenance page.
    Blocked(String),
    /// Nothing recognizable yet; worth another attempt.
    Ambiguous,
}

/// Why an attempt did not produce a decision. Used for log lines only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    /// Navigation did not finish in time.
    NavigationTimeout,
    /// Navigation failed outright.
    Navigation,
    /// An expected element or answer was missing.
    ExtractionMiss,
    /// Challenge or maintenance page.
    Blocked,
    /// Any other browser fault.
    Other,
}

impl FaultKind {
    fn of(err: &BrowserError) -> Self {
        match err {
            BrowserError::Timeout(_) => Self::NavigationTimeout,
            BrowserError::NavigationError(_) => Self::Navigation,
            BrowserError::SelectorNotFound(_) => Self::ExtractionMiss,
            _ => Self::Other,
        }
    }
}

impl fmt::Display for FaultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NavigationTimeout => "navigation timeout",
            Self::Navigation => "navigation error",
            Self::ExtractionMiss => "no definitive signal",
            Self::Blocked => "site blocked",
            Self::Other => "unexpected error",
        };
        f.write_str(s)
    }
}

/// Run `attempt` up to `retries + 1` times.
///
/// The first decided probe wins. After the last attempt an ambiguous page
/// becomes `UnknownOutcome`, a blocked page `SiteUnavailable` and an error
/// `TransientError`. A session-fatal error ends the loop immediately as
/// [`ExtractError::SessionCrashed`].
pub async fn attempt_loop<F, Fut>(
    label: &str,
    item: &str,
    retries: u32,
    retry_delay: Duration,
    mut attempt: F,
) -> Result<ResultTag, ExtractError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = sweep_browser::Result<Probe>>,
{
    let total = retries.saturating_add(1);
    let mut outcome = ResultTag::TransientError;

    for n in 1..=total {
        let (fault, detail) = match attempt(n).await {
            Ok(Probe::Decided(tag)) => return Ok(tag),
            Ok(Probe::Blocked(reason)) => {
                outcome = ResultTag::unavailable(reason.clone());
                (FaultKind::Blocked, reason)
            }
            Ok(Probe::Ambiguous) => {
                outcome = ResultTag::UnknownOutcome;
                (FaultKind::ExtractionMiss, String::new())
            }
            Err(e) if e.is_session_fatal() => {
                tracing::warn!("{}: session lost while extracting {}: {}", label, item, e);
                return Err(ExtractError::SessionCrashed(e.to_string()));
            }
            Err(e) => {
                outcome = ResultTag::TransientError;
                (FaultKind::of(&e), e.to_string())
            }
        };

        if n < total {
            tracing::debug!(
                "{}: {} for {} (attempt {}/{}) {}",
                label,
                fault,
                item,
                n,
                total,
                detail
            );
            pause(retry_delay).await;
        } else {
            tracing::warn!(
                "{}: giving up on {} after {} attempts: {} {}",
                label,
                item,
                total,
                fault,
                detail
            );
        }
    }

    Ok(outcome)
}

const CAPTCHA_MARKERS: &[&str] = &[
    "g-recaptcha",
    "h-captcha",
    "cf-challenge",
    "challenge-platform",
    "verify you are human",
];

const MAINTENANCE_MARKERS: &[&str] = &[
    "503 service unavailable",
    "service temporarily unavailable",
    "under maintenance",
    "em manutenção",
];

/// Recognize a bot challenge or maintenance page.
///
/// Only consulted once the extractor found no answer on the page, so a
/// site that embeds an invisible captcha widget still classifies normally.
#[must_use]
pub fn detect_unavailable(page: &str) -> Option<String> {
    let lower = page.to_lowercase();
    if CAPTCHA_MARKERS.iter().any(|m| lower.contains(m)) {
        return Some("captcha challenge".to_string());
    }
    if MAINTENANCE_MARKERS.iter().any(|m| lower.contains(m)) {
        return Some("maintenance".to_string());
    }
    None
}

/// Fall back from "no answer" to a blocked or ambiguous probe.
pub(crate) fn undecided(page: &str) -> Probe {
    detect_unavailable(page).map_or(Probe::Ambiguous, Probe::Blocked)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    async fn run(
        script: Vec<sweep_browser::Result<Probe>>,
        retries: u32,
    ) -> (Result<ResultTag, ExtractError>, u32) {
        let calls = AtomicU32::new(0);
        let script = std::sync::Mutex::new(script.into_iter());
        let result = attempt_loop("test", "item", retries, Duration::ZERO, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            let next = script.lock().unwrap().next().unwrap_or(Ok(Probe::Ambiguous));
            async move { next }
        })
        .await;
        (result, calls.load(Ordering::SeqCst))
    }

    #[tokio::test]
    async fn test_first_decision_wins() {
        let (result, calls) = run(
            vec![
                Ok(Probe::Ambiguous),
                Ok(Probe::Decided(ResultTag::success("ok"))),
            ],
            3,
        )
        .await;
        assert_eq!(result.unwrap(), ResultTag::success("ok"));
        assert_eq!(calls, 2);
    }

    #[tokio::test]
    async fn test_ambiguous_until_exhausted_is_unknown() {
        let (result, calls) = run(vec![], 2).await;
        assert_eq!(result.unwrap(), ResultTag::UnknownOutcome);
        assert_eq!(calls, 3);
    }

    #[tokio::test]
    async fn test_zero_retries_runs_once() {
        let (result, calls) = run(vec![Err(BrowserError::Timeout("goto".into()))], 0).await;
        assert_eq!(result.unwrap(), ResultTag::TransientError);
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn test_last_attempt_decides_fallback() {
        let (result, _) = run(
            vec![
                Err(BrowserError::Timeout("goto".into())),
                Ok(Probe::Ambiguous),
            ],
            1,
        )
        .await;
        assert_eq!(result.unwrap(), ResultTag::UnknownOutcome);

        let (result, _) = run(
            vec![
                Ok(Probe::Ambiguous),
                Ok(Probe::Blocked("captcha challenge".into())),
            ],
            1,
        )
        .await;
        assert_eq!(result.unwrap(), ResultTag::unavailable("captcha challenge"));
    }

    #[tokio::test]
    async fn test_session_loss_escapes() {
        let (result, calls) = run(
            vec![
                Err(BrowserError::NavigationError("dns".into())),
                Err(BrowserError::SessionClosed("handler exited".into())),
            ],
            5,
        )
        .await;
        assert!(matches!(result, Err(ExtractError::SessionCrashed(_))));
        assert_eq!(calls, 2);
    }

    #[test]
    fn test_detect_unavailable() {
        assert_eq!(
            detect_unavailable(r#"<div class="g-recaptcha"></div>"#).as_deref(),
            Some("captcha challenge")
        );
        assert_eq!(
            detect_unavailable("<h1>Site em manutenção</h1>").as_deref(),
            Some("maintenance")
        );
        assert!(detect_unavailable(r#"<div class="search-results"></div>"#).is_none());
    }

    #[test]
    fn test_fault_kind_display() {
        assert_eq!(
            FaultKind::of(&BrowserError::Timeout("x".into())).to_string(),
            "navigation timeout"
        );
        assert_eq!(FaultKind::of(&BrowserError::Evaluation("x".into())), FaultKind::Other);
    }
}
