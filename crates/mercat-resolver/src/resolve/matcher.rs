use std::path::Path;

use rusqlite::Connection;
use serde::Serialize;
use tracing::{debug, warn};

use crate::ResolverResult;
use crate::resolve::cache::{self, MemoryTier};
use crate::resolve::normalize::normalize;
use crate::resolve::policy::MatchPolicy;
use crate::resolve::provider::{EmbeddingProvider, ProviderError};
use crate::resolve::similarity::{resolve_common_mapping, similarity};
use crate::resolve::store::{self, Merchant};
use crate::resolve::vector::cosine_similarity;

/// Which tier and technique produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MatchMethod {
    Exact,
    Mapping,
    Alias,
    Fuzzy,
    EmbeddingCached,
    EmbeddingGenerated,
}

impl MatchMethod {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Exact => "exact",
            Self::Mapping => "mapping",
            Self::Alias => "alias",
            Self::Fuzzy => "fuzzy",
            Self::EmbeddingCached => "embedding-cached",
            Self::EmbeddingGenerated => "embedding-generated",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MerchantMatch {
    pub merchant: Merchant,
    pub similarity_score: f64,
    pub match_method: MatchMethod,
}

#[derive(Debug, Clone, Serialize)]
pub struct MerchantSimilarity {
    pub merchant: Merchant,
    pub similarity_score: f64,
}

/// The tiered match pipeline, short-circuiting at the first hit.
///
/// Tier 1 (string matching) resolves the overwhelming majority of traffic
/// at near-zero cost. Tier 2 reuses a previously paid-for embedding from
/// the cache. Tier 3 is the only path that pays for a provider call, and
/// its result is cached so the cost is incurred at most once per distinct
/// normalized string. A provider failure in Tier 3 degrades to "no match";
/// only store failures propagate.
pub(crate) fn find_best_match(
    connection: &Connection,
    db_path: &Path,
    memory: &MemoryTier,
    provider: &dyn EmbeddingProvider,
    policy: MatchPolicy,
    raw_merchant_name: &str,
    similarity_threshold: f64,
) -> ResolverResult<Option<MerchantMatch>> {
    let normalized = normalize(raw_merchant_name);
    if normalized.is_empty() {
        return Ok(None);
    }

    debug!(raw = raw_merchant_name, normalized = normalized.as_str(), "finding match");

    if let Some(string_match) = try_string_match(connection, db_path, policy, &normalized)? {
        debug!(
            merchant = string_match.merchant.display_name.as_str(),
            method = string_match.match_method.as_str(),
            score = string_match.similarity_score,
            "tier 1 match"
        );
        return Ok(Some(string_match));
    }

    if let Some(embedding) = cache::get(connection, db_path, memory, &normalized)? {
        if let Some(cached_match) = best_embedding_match(
            connection,
            db_path,
            &embedding,
            similarity_threshold,
            MatchMethod::EmbeddingCached,
        )? {
            debug!(
                merchant = cached_match.merchant.display_name.as_str(),
                score = cached_match.similarity_score,
                "tier 2 match"
            );
            return Ok(Some(cached_match));
        }
        // The cached vector matched nothing above the threshold; a fresh
        // provider call would return the same vector, so stop here.
        return Ok(None);
    }

    let embedding = match generate_embedding(provider, policy, &normalized) {
        Ok(embedding) => embedding,
        Err(error) => {
            warn!(merchant = normalized.as_str(), %error, "embedding generation failed");
            return Ok(None);
        }
    };
    cache::put(connection, db_path, memory, &normalized, &embedding)?;

    let generated_match = best_embedding_match(
        connection,
        db_path,
        &embedding,
        similarity_threshold,
        MatchMethod::EmbeddingGenerated,
    )?;
    if let Some(generated_match) = &generated_match {
        debug!(
            merchant = generated_match.merchant.display_name.as_str(),
            score = generated_match.similarity_score,
            "tier 3 match"
        );
    } else {
        debug!(merchant = normalized.as_str(), "no match found");
    }

    Ok(generated_match)
}

fn try_string_match(
    connection: &Connection,
    db_path: &Path,
    policy: MatchPolicy,
    normalized: &str,
) -> ResolverResult<Option<MerchantMatch>> {
    if let Some(exact) = store::find_by_exact_name(connection, db_path, normalized)? {
        return Ok(Some(MerchantMatch {
            merchant: exact,
            similarity_score: 1.0,
            match_method: MatchMethod::Exact,
        }));
    }

    if let Some(mapped_name) = resolve_common_mapping(normalized)
        && let Some(mapped) = store::find_by_exact_name(connection, db_path, mapped_name)?
    {
        return Ok(Some(MerchantMatch {
            merchant: mapped,
            similarity_score: policy.mapping_match_score,
            match_method: MatchMethod::Mapping,
        }));
    }

    if let Some(aliased) = store::find_by_alias(connection, db_path, normalized)? {
        return Ok(Some(MerchantMatch {
            merchant: aliased,
            similarity_score: policy.alias_match_score,
            match_method: MatchMethod::Alias,
        }));
    }

    // Fuzzy scan over every display name; fixed internal threshold,
    // independent of the caller's embedding threshold. First merchant to
    // reach the maximum wins (stable store order).
    let merchants = store::list_all(connection, db_path)?;
    let mut best: Option<(Merchant, f64)> = None;
    for merchant in merchants {
        let score = similarity(normalized, &merchant.display_name.to_uppercase());
        match &best {
            Some((_, best_score)) if score <= *best_score => {}
            _ => best = Some((merchant, score)),
        }
    }

    if let Some((merchant, score)) = best
        && score >= policy.string_similarity_threshold
    {
        return Ok(Some(MerchantMatch {
            merchant,
            similarity_score: score,
            match_method: MatchMethod::Fuzzy,
        }));
    }

    Ok(None)
}

/// Nearest stored merchant embedding by cosine similarity. Merchants
/// without an embedding are skipped; ties keep the first merchant in store
/// order (strictly-greater comparison).
fn best_embedding_match(
    connection: &Connection,
    db_path: &Path,
    query: &[f32],
    threshold: f64,
    method: MatchMethod,
) -> ResolverResult<Option<MerchantMatch>> {
    let merchants = store::list_all(connection, db_path)?;

    let mut best: Option<(Merchant, f64)> = None;
    let mut any_embedded = false;
    for merchant in merchants {
        let Some(embedding) = merchant.embedding.as_deref() else {
            continue;
        };
        any_embedded = true;
        let score = cosine_similarity(query, embedding);
        match &best {
            Some((_, best_score)) if score <= *best_score => {}
            _ => best = Some((merchant, score)),
        }
    }

    if !any_embedded {
        warn!("no merchants have embeddings generated yet");
        return Ok(None);
    }

    match best {
        Some((merchant, score)) if score >= threshold => Ok(Some(MerchantMatch {
            merchant,
            similarity_score: score,
            match_method: method,
        })),
        _ => Ok(None),
    }
}

/// Rank other embedded merchants by cosine similarity to the given
/// merchant's embedding. Unknown ids and merchants without an embedding
/// yield an empty list, not an error.
pub(crate) fn find_similar_merchants(
    connection: &Connection,
    db_path: &Path,
    merchant_id: &str,
    limit: usize,
    min_similarity: f64,
) -> ResolverResult<Vec<MerchantSimilarity>> {
    let Some(source) = store::find_by_id(connection, db_path, merchant_id)? else {
        warn!(merchant_id, "similarity lookup for unknown merchant");
        return Ok(Vec::new());
    };
    let Some(source_embedding) = source.embedding.as_deref() else {
        warn!(merchant_id, "similarity lookup for merchant without embedding");
        return Ok(Vec::new());
    };

    let mut results: Vec<MerchantSimilarity> = Vec::new();
    for merchant in store::list_all(connection, db_path)? {
        if merchant.merchant_id == merchant_id {
            continue;
        }
        let Some(embedding) = merchant.embedding.as_deref() else {
            continue;
        };
        let score = cosine_similarity(source_embedding, embedding);
        if score >= min_similarity {
            results.push(MerchantSimilarity {
                merchant,
                similarity_score: score,
            });
        }
    }

    // Stable sort keeps store order between equal scores.
    results.sort_by(|left, right| right.similarity_score.total_cmp(&left.similarity_score));
    results.truncate(limit);
    Ok(results)
}

pub(crate) fn generate_embedding(
    provider: &dyn EmbeddingProvider,
    policy: MatchPolicy,
    normalized_text: &str,
) -> Result<Vec<f32>, ProviderError> {
    let embedding = provider.embed(normalized_text)?;
    if embedding.len() != policy.embedding_dimensions {
        return Err(ProviderError::Malformed(format!(
            "Expected {} dimensions, provider returned {}.",
            policy.embedding_dimensions,
            embedding.len()
        )));
    }
    Ok(embedding)
}

#[cfg(test)]
mod tests {
    use super::MatchMethod;

    #[test]
    fn match_method_labels_are_stable() {
        assert_eq!(MatchMethod::Exact.as_str(), "exact");
        assert_eq!(MatchMethod::Mapping.as_str(), "mapping");
        assert_eq!(MatchMethod::Alias.as_str(), "alias");
        assert_eq!(MatchMethod::Fuzzy.as_str(), "fuzzy");
        assert_eq!(MatchMethod::EmbeddingCached.as_str(), "embedding-cached");
        assert_eq!(MatchMethod::EmbeddingGenerated.as_str(), "embedding-generated");
    }
}
