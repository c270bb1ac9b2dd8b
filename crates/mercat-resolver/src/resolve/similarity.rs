/// Known statement abbreviations and their canonical merchant names.
///
/// Order matters: substring resolution takes the first entry that hits, so
/// the table is a fixed list rather than a map.
const COMMON_MAPPINGS: &[(&str, &str)] = &[
    // Financial
    ("AMZN", "AMAZON"),
    ("PYPL", "PAYPAL"),
    ("SQ", "SQUARE"),
    ("VENMO", "PAYPAL"),
    // Food & dining
    ("MCD", "MCDONALDS"),
    ("SBUX", "STARBUCKS"),
    ("DQ", "DAIRY QUEEN"),
    ("KFC", "KENTUCKY FRIED CHICKEN"),
    ("BK", "BURGER KING"),
    // Retail
    ("TGT", "TARGET"),
    ("WMT", "WALMART"),
    ("HD", "HOME DEPOT"),
    ("LOWES", "LOWE'S"),
    // Gas stations
    ("BP", "BRITISH PETROLEUM"),
    ("EXXON", "EXXONMOBIL"),
    ("CHEVRON", "CHEVRON"),
    // Technology
    ("GOOG", "GOOGLE"),
    ("MSFT", "MICROSOFT"),
    ("AAPL", "APPLE"),
    ("NFLX", "NETFLIX"),
    // Transportation
    ("UBER", "UBER"),
    ("LYFT", "LYFT"),
    // Utilities
    ("ATT", "AT&T"),
    ("VZ", "VERIZON"),
    ("CMCSA", "COMCAST"),
];

/// Classic Levenshtein edit distance, full DP table, unit costs.
pub fn distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut matrix = vec![vec![0usize; b.len() + 1]; a.len() + 1];
    for (i, row) in matrix.iter_mut().enumerate() {
        row[0] = i;
    }
    for j in 0..=b.len() {
        matrix[0][j] = j;
    }

    for i in 1..=a.len() {
        for j in 1..=b.len() {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            matrix[i][j] = (matrix[i - 1][j] + 1)
                .min(matrix[i][j - 1] + 1)
                .min(matrix[i - 1][j - 1] + cost);
        }
    }

    matrix[a.len()][b.len()]
}

/// Edit-distance similarity in [0, 1]; 1.0 means equal.
///
/// Two empty strings are fully similar; one empty string against a
/// non-empty one scores zero.
pub fn similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let max_len = a.chars().count().max(b.chars().count());
    1.0 - distance(a, b) as f64 / max_len as f64
}

/// Loose similarity check combining several cheap heuristics: exact
/// case-insensitive equality, separator-stripped equality, the edit-distance
/// ratio against `threshold`, and a containment rule for abbreviations
/// (one string inside the other, shorter at least 60% of the longer).
pub fn are_similar(a: &str, b: &str, threshold: f64) -> bool {
    if a.is_empty() || b.is_empty() {
        return false;
    }

    if a.eq_ignore_ascii_case(b) {
        return true;
    }

    let a_clean = strip_separators(a);
    let b_clean = strip_separators(b);
    if a_clean.eq_ignore_ascii_case(&b_clean) {
        return true;
    }

    if similarity(&a.to_uppercase(), &b.to_uppercase()) >= threshold {
        return true;
    }

    if a.len() >= 3 && b.len() >= 3 {
        let a_upper = a.to_uppercase();
        let b_upper = b.to_uppercase();
        let (longer, shorter) = if a_upper.len() > b_upper.len() {
            (&a_upper, &b_upper)
        } else {
            (&b_upper, &a_upper)
        };
        if longer.contains(shorter.as_str()) && shorter.len() as f64 >= longer.len() as f64 * 0.6 {
            return true;
        }
    }

    false
}

/// Resolve a known abbreviation to its canonical merchant name.
///
/// Exact key match first; otherwise the first mapping whose key (3+ chars)
/// appears as a substring of the input wins.
pub fn resolve_common_mapping(text: &str) -> Option<&'static str> {
    let clean = text.trim().to_uppercase();

    for (key, canonical) in COMMON_MAPPINGS {
        if clean == *key {
            return Some(canonical);
        }
    }

    for (key, canonical) in COMMON_MAPPINGS {
        if key.len() >= 3 && clean.contains(key) {
            return Some(canonical);
        }
    }

    None
}

fn strip_separators(value: &str) -> String {
    value
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '_'))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{are_similar, distance, resolve_common_mapping, similarity};

    #[test]
    fn distance_counts_single_edits() {
        assert_eq!(distance("KITTEN", "SITTING"), 3);
        assert_eq!(distance("STARBUCKS", "STARBUCKS"), 0);
        assert_eq!(distance("", "ABC"), 3);
        assert_eq!(distance("ABC", ""), 3);
    }

    #[test]
    fn similarity_handles_empty_inputs_per_contract() {
        assert_eq!(similarity("", ""), 1.0);
        assert_eq!(similarity("WALMART", ""), 0.0);
        assert_eq!(similarity("", "WALMART"), 0.0);
    }

    #[test]
    fn similarity_is_one_for_equal_and_falls_with_distance() {
        assert!((similarity("TARGET", "TARGET") - 1.0).abs() < f64::EPSILON);
        let near = similarity("WALGREENS", "WALGREEN");
        assert!(near > 0.85 && near < 1.0);
    }

    #[test]
    fn are_similar_accepts_separator_variants() {
        assert!(are_similar("WAL-MART", "WALMART", 0.8));
        assert!(are_similar("home depot", "HOME_DEPOT", 0.8));
    }

    #[test]
    fn are_similar_accepts_contained_abbreviations() {
        // Shorter string is 60%+ of the longer and contained in it.
        assert!(are_similar("STARBUCKS", "STARBUCKS CO", 0.99));
        // Too short relative to the longer string.
        assert!(!are_similar("ABC", "ABCDEFGHIJKLMNOP", 0.99));
    }

    #[test]
    fn are_similar_rejects_empty_inputs() {
        assert!(!are_similar("", "TARGET", 0.5));
        assert!(!are_similar("TARGET", "", 0.5));
    }

    #[test]
    fn mapping_resolves_exact_keys_case_insensitively() {
        assert_eq!(resolve_common_mapping("AMZN"), Some("AMAZON"));
        assert_eq!(resolve_common_mapping("sbux"), Some("STARBUCKS"));
        assert_eq!(resolve_common_mapping(" wmt "), Some("WALMART"));
    }

    #[test]
    fn mapping_resolves_contained_keys_of_three_or_more_chars() {
        assert_eq!(resolve_common_mapping("AMZN MKTP"), Some("AMAZON"));
        assert_eq!(resolve_common_mapping("NFLX.COM"), Some("NETFLIX"));
        // Two-letter keys never match by containment.
        assert_eq!(resolve_common_mapping("XXBKXX BAKERY"), None);
    }

    #[test]
    fn mapping_returns_none_for_unknown_names() {
        assert_eq!(resolve_common_mapping("LOCAL COFFEE ROASTERS"), None);
    }

    #[test]
    fn mapping_prefers_table_order_on_multiple_hits() {
        // Contains both AMZN and UBER; AMZN is listed first.
        assert_eq!(resolve_common_mapping("AMZN UBER"), Some("AMAZON"));
    }
}
