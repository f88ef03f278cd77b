//! Raw item cleanup.

/// Sentinel spreadsheets and dataframes use for an empty cell.
const BLANK_SENTINEL: &str = "nan";

/// Clean a raw item for the extractor.
///
/// Trims whitespace and drops a trailing `.0`, `.00`, ... left behind when
/// a numeric identifier went through a float column. Returns `None` for an
/// item that is blank or the `nan` sentinel.
#[must_use]
pub fn normalize_item(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let cleaned = strip_float_suffix(trimmed);

    if cleaned.is_empty() || cleaned.eq_ignore_ascii_case(BLANK_SENTINEL) {
        None
    } else {
        Some(cleaned.to_string())
    }
}

fn strip_float_suffix(value: &str) -> &str {
    match value.split_once('.') {
        Some((integral, fraction))
            if !integral.is_empty()
                && !fraction.is_empty()
                && integral.bytes().all(|b| b.is_ascii_digit())
                && fraction.bytes().all(|b| b == b'0') =>
        {
            integral
        }
        _ => value,
    }
}
