//! Shared types used across the sweep workspace.
//!
//! `Item` is one unit of work, `ResultTag` is its classified outcome. The
//! orchestrator's resume rule, the sinks and the extractors all speak in
//! these types; display text is produced separately by [`crate::format`].

use crate::error::SweepError;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::OnceLock;

/// One identifier from the ordered input sequence (microchip number,
/// listing id, registration number).
///
/// Items are opaque to the orchestrator; their position in the input
/// slice is their identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Item(String);

impl Item {
    /// Wrap a raw identifier exactly as read from the input.
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Get the raw (un-normalized) value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Item {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

impl From<String> for Item {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl fmt::Display for Item {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Extractor-specific data carried by a successful result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Payload {
    /// A status string ("registered", "registered, reported missing").
    Text(String),
    /// A numeric reading with its unit (mileage in km).
    Measurement {
        /// Parsed value
        value: u64,
        /// Unit label
        unit: String,
    },
    /// Several fields from one lookup; `None` marks a field that was not found.
    Fields(Vec<Option<String>>),
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => write!(f, "{text}"),
            Self::Measurement { value, unit } => write!(f, "{value} {unit}"),
            Self::Fields(fields) => {
                let rendered: Vec<&str> = fields
                    .iter()
                    .map(|field| field.as_deref().unwrap_or("-"))
                    .collect();
                write!(f, "{}", rendered.join(" | "))
            }
        }
    }
}

/// Classified outcome of processing one item.
///
/// Every kind except `Unprocessed` is terminal: a resumed run leaves it
/// untouched. `TransientError` and `UnknownOutcome` are terminal for the
/// current invocation but are re-queued by [`ResultTag::needs_processing`]
/// on the next one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ResultTag {
    /// Not yet decided.
    #[default]
    Unprocessed,
    /// Input was blank or a placeholder.
    NotApplicable,
    /// Definitive answer from the target site.
    Success(Payload),
    /// The site answered that the identifier is unknown.
    NotFound,
    /// The site refused to answer (challenge page, maintenance).
    SiteUnavailable(String),
    /// Every attempt faulted (timeouts, disconnections).
    TransientError,
    /// Every attempt finished without a definitive signal.
    UnknownOutcome,
}

impl ResultTag {
    /// Shorthand for `Success(Payload::Text(..))`.
    pub fn success(text: impl Into<String>) -> Self {
        Self::Success(Payload::Text(text.into()))
    }

    /// Shorthand for `SiteUnavailable(reason)`.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::SiteUnavailable(reason.into())
    }

    /// Whether this entry has been decided.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Unprocessed)
    }

    /// Whether the orchestrator should hand this entry to an extractor.
    ///
    /// `Unprocessed` always qualifies. Failed outcomes from an earlier
    /// run (`TransientError`, `UnknownOutcome`) qualify too, so a resumed
    /// run retries them.
    #[must_use]
    pub fn needs_processing(&self) -> bool {
        matches!(
            self,
            Self::Unprocessed | Self::TransientError | Self::UnknownOutcome
        )
    }

    /// Fieldless kind, for logging and storage columns.
    #[must_use]
    pub fn kind(&self) -> ResultKind {
        match self {
            Self::Unprocessed => ResultKind::Unprocessed,
            Self::NotApplicable => ResultKind::NotApplicable,
            Self::Success(_) => ResultKind::Success,
            Self::NotFound => ResultKind::NotFound,
            Self::SiteUnavailable(_) => ResultKind::SiteUnavailable,
            Self::TransientError => ResultKind::TransientError,
            Self::UnknownOutcome => ResultKind::UnknownOutcome,
        }
    }
}

/// The kind of a [`ResultTag`] without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[allow(missing_docs)]
pub enum ResultKind {
    Unprocessed,
    NotApplicable,
    Success,
    NotFound,
    SiteUnavailable,
    TransientError,
    UnknownOutcome,
}

impl ResultKind {
    /// Stable snake_case name used in storage.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unprocessed => "unprocessed",
            Self::NotApplicable => "not_applicable",
            Self::Success => "success",
            Self::NotFound => "not_found",
            Self::SiteUnavailable => "site_unavailable",
            Self::TransientError => "transient_error",
            Self::UnknownOutcome => "unknown_outcome",
        }
    }
}

impl fmt::Display for ResultKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Newtype for run identifiers with validation.
///
/// Run IDs key persisted results for resume: alphanumeric plus `-` and
/// `_`, 1-64 characters, starting with an alphanumeric.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(String);

impl RunId {
    /// Create a new `RunId` from a string.
    ///
    /// # Errors
    /// Returns error if the ID doesn't match the required format.
    pub fn new(id: impl Into<String>) -> Result<Self, SweepError> {
        let id = id.into();
        Self::validate(&id)?;
        Ok(Self(id))
    }

    /// Create a new random `RunId` using UUID v4.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    fn validate(id: &str) -> Result<(), SweepError> {
        static RUN_ID_REGEX: OnceLock<Regex> = OnceLock::new();
        let regex = RUN_ID_REGEX
            .get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]{0,63}$").expect("valid regex"));

        if regex.is_match(id) {
            Ok(())
        } else {
            Err(SweepError::Validation(format!(
                "invalid run ID: must be 1-64 alphanumeric, '-' or '_' characters, got '{id}'"
            )))
        }
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
