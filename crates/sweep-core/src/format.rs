//! Rendering result tags as display text.
//!
//! Classification lives in [`ResultTag`]; what a human sees is a separate,
//! swappable concern so resume and skip rules never depend on strings.

use crate::types::{Payload, ResultTag};

/// Renders a [`ResultTag`] to display text.
pub trait StatusFormatter: Send + Sync {
    /// Text for one result.
    fn render(&self, tag: &ResultTag) -> String;

    /// Text for one field of a multi-field payload, or for the whole tag
    /// when it carries no fields. Sinks that spread a tag across several
    /// output columns call this once per column.
    fn render_field(&self, tag: &ResultTag, index: usize) -> String {
        match tag {
            ResultTag::Success(Payload::Fields(fields)) => match fields.get(index) {
                Some(Some(value)) => value.clone(),
                Some(None) => self.render(&ResultTag::NotFound),
                None => String::new(),
            },
            other => self.render(other),
        }
    }
}

/// English, emoji-free rendering.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainFormatter;

impl StatusFormatter for PlainFormatter {
    fn render(&self, tag: &ResultTag) -> String {
        match tag {
            ResultTag::Unprocessed => "...".to_string(),
            ResultTag::NotApplicable => "N/A".to_string(),
            ResultTag::Success(payload) => payload.to_string(),
            ResultTag::NotFound => "not found".to_string(),
            ResultTag::SiteUnavailable(reason) => format!("site unavailable: {reason}"),
            ResultTag::TransientError => "error".to_string(),
            ResultTag::UnknownOutcome => "unknown".to_string(),
        }
    }
}
