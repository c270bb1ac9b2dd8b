/// Deterministic match-policy identifier.
///
/// Persisted in `internal_meta` and useful when comparing resolution
/// behavior across ledger snapshots after a threshold change.
pub const MATCH_POLICY_VERSION: &str = "match/v1";

/// v1 tiered-matching policy.
///
/// Notes:
/// - `string_similarity_threshold` gates the Tier 1 fuzzy scan and is fixed,
///   independent of the caller-supplied embedding threshold.
/// - `default_embedding_threshold` is the default for callers that do not
///   pass their own; the embedding tiers never return a match below the
///   effective threshold.
#[derive(Debug, Clone, Copy)]
pub struct MatchPolicy {
    pub string_similarity_threshold: f64,
    pub default_embedding_threshold: f64,
    pub mapping_match_score: f64,
    pub alias_match_score: f64,
    pub memory_cache_ttl_secs: u64,
    pub backfill_batch_size: usize,
    pub embedding_dimensions: usize,
}

pub const MATCH_POLICY_V1: MatchPolicy = MatchPolicy {
    string_similarity_threshold: 0.8,
    default_embedding_threshold: 0.7,
    mapping_match_score: 0.95,
    alias_match_score: 0.95,
    memory_cache_ttl_secs: 3600,
    backfill_batch_size: 50,
    embedding_dimensions: 1536,
};

#[cfg(test)]
mod tests {
    use super::MATCH_POLICY_V1;

    #[test]
    fn thresholds_stay_inside_the_unit_interval() {
        let policy = MATCH_POLICY_V1;
        for value in [
            policy.string_similarity_threshold,
            policy.default_embedding_threshold,
            policy.mapping_match_score,
            policy.alias_match_score,
        ] {
            assert!(value > 0.0 && value <= 1.0);
        }
    }

    #[test]
    fn string_tier_scores_clear_the_default_embedding_threshold() {
        let policy = MATCH_POLICY_V1;
        assert!(policy.mapping_match_score >= policy.default_embedding_threshold);
        assert!(policy.alias_match_score >= policy.default_embedding_threshold);
    }
}
