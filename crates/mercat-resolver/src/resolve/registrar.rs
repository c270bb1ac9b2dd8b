use std::path::Path;

use rusqlite::Connection;
use tracing::{debug, info, warn};

use crate::resolve::cache::{self, MemoryTier};
use crate::resolve::matcher::{self, generate_embedding};
use crate::resolve::normalize::normalize;
use crate::resolve::policy::MatchPolicy;
use crate::resolve::provider::EmbeddingProvider;
use crate::resolve::store::{self, InsertOutcome, Merchant};
use crate::{ResolverError, ResolverResult};

/// Find-or-create a canonical merchant for a raw statement string.
///
/// Runs the full tiered pipeline first, so the operation is idempotent
/// across surface-form variation. On a match the raw input is recorded as
/// a new alias when unseen. On a miss a merchant is created with the
/// normalized name; the embedding is best-effort (a provider failure never
/// blocks creation, a later backfill fills the gap). A display-name
/// conflict on insert means a concurrent creation won; the row it wrote is
/// looked up and returned instead of erroring.
pub(crate) fn create_or_get(
    connection: &Connection,
    db_path: &Path,
    memory: &MemoryTier,
    provider: &dyn EmbeddingProvider,
    policy: MatchPolicy,
    merchant_name: &str,
    category: Option<&str>,
) -> ResolverResult<Merchant> {
    let raw = merchant_name.trim();
    if raw.is_empty() {
        return Err(ResolverError::invalid_argument(
            "Merchant name must not be empty.",
        ));
    }

    let normalized = normalize(raw);

    if let Some(existing) = matcher::find_best_match(
        connection,
        db_path,
        memory,
        provider,
        policy,
        raw,
        policy.default_embedding_threshold,
    )? {
        if existing.merchant.has_alias(raw) {
            return Ok(existing.merchant);
        }
        return store::add_alias(connection, db_path, &existing.merchant, raw);
    }

    let mut merchant = Merchant::new(&normalized, category, raw);
    // The pipeline above usually cached this text's vector already; only a
    // cache miss (string-tier path or provider failure) costs a new call.
    if let Some(embedding) = cache::get(connection, db_path, memory, &normalized)? {
        merchant.embedding = Some(embedding);
    } else {
        match generate_embedding(provider, policy, &normalized) {
            Ok(embedding) => {
                cache::put(connection, db_path, memory, &normalized, &embedding)?;
                merchant.embedding = Some(embedding);
                debug!(merchant = normalized.as_str(), "generated embedding for new merchant");
            }
            Err(error) => {
                warn!(merchant = normalized.as_str(), %error, "creating merchant without embedding");
            }
        }
    }

    match store::insert(connection, db_path, &merchant)? {
        InsertOutcome::Inserted => {
            info!(merchant = normalized.as_str(), category, "created new merchant");
            Ok(merchant)
        }
        InsertOutcome::DisplayNameConflict => {
            store::find_by_exact_name(connection, db_path, &normalized)?.ok_or_else(|| {
                ResolverError::Store {
                    path: db_path.to_path_buf(),
                    detail: format!(
                        "Display-name conflict for `{normalized}` but no row found on re-lookup."
                    ),
                }
            })
        }
    }
}

/// Backfill embeddings for merchants created without one.
///
/// One batched provider call for up to `backfill_batch_size` merchants,
/// write-back in response order, and a cache seed for each so future
/// lookups of the same text stay in Tier 2. Returns the number processed;
/// 0 when nothing is missing. Provider failure propagates: this operation
/// exists only to call the provider.
pub(crate) fn generate_missing_embeddings(
    connection: &Connection,
    db_path: &Path,
    memory: &MemoryTier,
    provider: &dyn EmbeddingProvider,
    policy: MatchPolicy,
) -> ResolverResult<usize> {
    let missing = store::list_missing_embeddings(connection, db_path, policy.backfill_batch_size)?;
    if missing.is_empty() {
        info!("all merchants already have embeddings");
        return Ok(0);
    }

    info!(count = missing.len(), "generating embeddings for merchants");

    let names: Vec<String> = missing
        .iter()
        .map(|merchant| merchant.display_name.clone())
        .collect();
    let embeddings = provider.embed_batch(&names)?;
    if embeddings.len() != missing.len() {
        return Err(ResolverError::Provider(
            crate::resolve::provider::ProviderError::Malformed(format!(
                "Expected {} vectors, provider returned {}.",
                missing.len(),
                embeddings.len()
            )),
        ));
    }

    for (merchant, embedding) in missing.iter().zip(embeddings.iter()) {
        if embedding.len() != policy.embedding_dimensions {
            return Err(ResolverError::Provider(
                crate::resolve::provider::ProviderError::Malformed(format!(
                    "Expected {} dimensions, provider returned {}.",
                    policy.embedding_dimensions,
                    embedding.len()
                )),
            ));
        }
        store::update_embedding(connection, db_path, &merchant.merchant_id, embedding)?;
        cache::put(connection, db_path, memory, &merchant.display_name, embedding)?;
    }

    info!(count = missing.len(), "generated embeddings for merchants");
    Ok(missing.len())
}

/// Regenerate one merchant's embedding and refresh the cache entry for its
/// display name. Unknown ids and provider failures are errors here: the
/// caller explicitly asked for a regeneration.
pub(crate) fn refresh_embedding(
    connection: &Connection,
    db_path: &Path,
    memory: &MemoryTier,
    provider: &dyn EmbeddingProvider,
    policy: MatchPolicy,
    merchant_id: &str,
) -> ResolverResult<Merchant> {
    let Some(merchant) = store::find_by_id(connection, db_path, merchant_id)? else {
        return Err(ResolverError::MerchantNotFound(merchant_id.to_string()));
    };

    let embedding = generate_embedding(provider, policy, &merchant.display_name)?;
    store::update_embedding(connection, db_path, &merchant.merchant_id, &embedding)?;
    cache::put(connection, db_path, memory, &merchant.display_name, &embedding)?;
    debug!(merchant = merchant.display_name.as_str(), "refreshed embedding");

    store::find_by_id(connection, db_path, merchant_id)?.ok_or_else(|| {
        ResolverError::MerchantNotFound(merchant_id.to_string())
    })
}
