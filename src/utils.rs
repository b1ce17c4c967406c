use crate::error::{ReconciliationError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use std::sync::LazyLock;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

static LEADING_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*([0-9]+)").unwrap());

static NUMBER_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*[0-9]+\s*-\s*").unwrap());

static SUCURSAL_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*sucursal\s+[[:alnum:]]+\s*-\s*").unwrap());

static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// Trims and collapses every run of whitespace to a single space.
pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE_RE.replace_all(text.trim(), " ").into_owned()
}

/// Strips diacritics by decomposing to NFD and dropping combining marks, so precomposed
/// and decomposed spellings fold to the same text.
pub fn fold_accents(text: &str) -> String {
    text.nfd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Comparison key for free-text names: whitespace collapsed, lowercased, accents folded.
///
/// `"  Sucursal  GC - García "` and `"sucursal gc - garcia"` share the same key.
pub fn match_key(text: &str) -> String {
    fold_accents(&collapse_whitespace(text).to_lowercase())
}

/// Extracts the leading integer of a location label (`"4 - Santa Catarina"` → `4`).
///
/// Returns `None` when the label does not start with digits or the number does not fit a
/// branch number.
pub fn extract_leading_number(label: &str) -> Option<u32> {
    LEADING_NUMBER_RE
        .captures(label)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse::<u32>().ok())
}

/// Removes a `"<number> - "` or `"Sucursal <code> - "` prefix, returning the name part.
pub fn strip_label_prefix(label: &str) -> &str {
    if let Some(m) = NUMBER_PREFIX_RE.find(label) {
        return label[m.end()..].trim();
    }
    if let Some(m) = SUCURSAL_PREFIX_RE.find(label) {
        return label[m.end()..].trim();
    }
    label.trim()
}

/// Parses a supervision date as delivered by the source system.
///
/// Accepts `YYYY-MM-DD`, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS` and RFC 3339
/// timestamps. Timestamps keep the calendar date of their own offset.
pub fn parse_evaluation_date(raw: &str) -> Result<NaiveDate> {
    let trimmed = raw.trim();

    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Ok(date);
    }

    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Ok(dt.date());
        }
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Ok(dt.date_naive());
    }

    Err(ReconciliationError::DateError(format!(
        "Invalid evaluation date '{}'. Expected YYYY-MM-DD or an ISO timestamp",
        raw
    )))
}

/// Euclidean distance in degrees between two coordinates.
pub fn degree_distance(a: (f64, f64), b: (f64, f64)) -> f64 {
    let d_lat = a.0 - b.0;
    let d_lng = a.1 - b.1;
    (d_lat * d_lat + d_lng * d_lng).sqrt()
}
