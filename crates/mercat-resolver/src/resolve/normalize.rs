use std::sync::LazyLock;

use regex::Regex;

static PROCESSOR_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(PURCHASE\s+|POS\s+|DEBIT\s+|CREDIT\s+|ATM\s+)").expect("valid pattern"));
static LEGAL_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+(INC|LLC|CORP|CO|LTD|LIMITED)$").expect("valid pattern"));
static LONG_DIGIT_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{4,}\b").expect("valid pattern"));
static DATE_LIKE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{1,2}/\d{1,2}(?:/\d{2,4})?\b").expect("valid pattern"));
static REFERENCE_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"#\d+").expect("valid pattern"));
static TRAILING_STATE_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-Z]{2}\b$").expect("valid pattern"));
static ZIP_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\d{5}(?:-\d{4})?\b").expect("valid pattern"));
static AGGREGATOR_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(SQ\s*\*|SP\s*\*|PP\s*\*|PAYPAL\s*\*)").expect("valid pattern"));
static WHITESPACE_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid pattern"));

/// Strip transaction-statement noise from a raw merchant string.
///
/// Pure and deterministic. Upper-cases the trimmed input, then removes, in
/// order: processor prefixes, legal-entity suffixes, long digit runs
/// (reference numbers), date-like substrings, `#id` markers, trailing state
/// codes, ZIP codes, and payment-aggregator prefixes, finally collapsing
/// whitespace. If stripping leaves fewer than 2 characters, the original
/// trimmed input is returned instead so the caller still has signal to
/// match on. Empty or whitespace-only input yields an empty string.
pub fn normalize(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    let upper = trimmed.to_uppercase();
    let mut text = PROCESSOR_PREFIX.replace(&upper, "").into_owned();
    text = LEGAL_SUFFIX.replace(&text, "").into_owned();
    text = LONG_DIGIT_RUN.replace_all(&text, "").into_owned();
    text = DATE_LIKE.replace_all(&text, "").into_owned();
    text = REFERENCE_MARKER.replace_all(&text, "").into_owned();
    text = TRAILING_STATE_CODE.replace(&text, "").into_owned();
    text = ZIP_CODE.replace_all(&text, "").into_owned();
    text = AGGREGATOR_PREFIX.replace(&text, "").into_owned();
    let collapsed = WHITESPACE_RUN.replace_all(&text, " ").trim().to_string();

    if collapsed.len() < 2 {
        return trimmed.to_string();
    }

    collapsed
}
