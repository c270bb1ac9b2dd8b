pub mod cache;
pub mod matcher;
pub mod normalize;
pub mod policy;
pub mod provider;
pub mod registrar;
pub mod similarity;
pub mod store;
pub mod vector;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use rusqlite::Connection;

use crate::migrations::{map_migration_error, run_pending, verify_core_objects};
use crate::state::{
    ensure_ledger_directory, ledger_db_path, open_connection, resolve_ledger_home,
};
use crate::{ResolverResult, error::ResolverError};
use cache::MemoryTier;
use matcher::{MerchantMatch, MerchantSimilarity};
use policy::{MATCH_POLICY_V1, MatchPolicy};
use provider::EmbeddingProvider;
use store::Merchant;

/// The merchant-resolution engine.
///
/// Stateless between calls except for the process-local memory cache tier;
/// every operation opens its own connection, so a resolver can be shared
/// across threads during a bulk import. Construction initializes the
/// ledger (directory, migrations, schema verification).
pub struct MerchantResolver {
    db_path: PathBuf,
    provider: Arc<dyn EmbeddingProvider>,
    memory_cache: MemoryTier,
    policy: MatchPolicy,
}

impl MerchantResolver {
    /// Open the resolver at the default home (`MERCAT_HOME` env override,
    /// else `~/.mercat`).
    pub fn open(provider: Arc<dyn EmbeddingProvider>) -> ResolverResult<Self> {
        Self::open_with_options(None, provider, MATCH_POLICY_V1)
    }

    /// Open the resolver at an explicit home directory.
    pub fn open_at(home: &Path, provider: Arc<dyn EmbeddingProvider>) -> ResolverResult<Self> {
        Self::open_with_options(Some(home), provider, MATCH_POLICY_V1)
    }

    pub fn open_with_options(
        home_override: Option<&Path>,
        provider: Arc<dyn EmbeddingProvider>,
        policy: MatchPolicy,
    ) -> ResolverResult<Self> {
        let ledger_home = resolve_ledger_home(home_override)?;
        ensure_ledger_directory(&ledger_home)?;

        let db_path = ledger_db_path(&ledger_home);
        let mut connection = open_connection(&db_path)?;
        run_pending(&mut connection).map_err(|error| map_migration_error(&db_path, &error))?;
        verify_core_objects(&connection, &db_path)?;

        Ok(Self {
            db_path,
            provider,
            memory_cache: MemoryTier::new(Duration::from_secs(policy.memory_cache_ttl_secs)),
            policy,
        })
    }

    /// Resolve a raw merchant string through the tiered pipeline using the
    /// policy's default embedding threshold.
    pub fn find_best_match(&self, raw_merchant_name: &str) -> ResolverResult<Option<MerchantMatch>> {
        self.find_best_match_with_threshold(
            raw_merchant_name,
            self.policy.default_embedding_threshold,
        )
    }

    pub fn find_best_match_with_threshold(
        &self,
        raw_merchant_name: &str,
        similarity_threshold: f64,
    ) -> ResolverResult<Option<MerchantMatch>> {
        let connection = self.connect()?;
        matcher::find_best_match(
            &connection,
            &self.db_path,
            &self.memory_cache,
            self.provider.as_ref(),
            self.policy,
            raw_merchant_name,
            similarity_threshold,
        )
    }

    /// Find-or-create the canonical merchant for a raw statement string.
    pub fn create_or_get_merchant(
        &self,
        merchant_name: &str,
        category: Option<&str>,
    ) -> ResolverResult<Merchant> {
        let connection = self.connect()?;
        registrar::create_or_get(
            &connection,
            &self.db_path,
            &self.memory_cache,
            self.provider.as_ref(),
            self.policy,
            merchant_name,
            category,
        )
    }

    /// Rank merchants similar to the given one by embedding similarity.
    pub fn find_similar_merchants(
        &self,
        merchant_id: &str,
        limit: usize,
        min_similarity: f64,
    ) -> ResolverResult<Vec<MerchantSimilarity>> {
        let connection = self.connect()?;
        matcher::find_similar_merchants(
            &connection,
            &self.db_path,
            merchant_id,
            limit,
            min_similarity,
        )
    }

    /// Backfill embeddings for one batch of merchants lacking them.
    pub fn generate_missing_embeddings(&self) -> ResolverResult<usize> {
        let connection = self.connect()?;
        registrar::generate_missing_embeddings(
            &connection,
            &self.db_path,
            &self.memory_cache,
            self.provider.as_ref(),
            self.policy,
        )
    }

    /// Regenerate one merchant's embedding.
    pub fn refresh_embedding(&self, merchant_id: &str) -> ResolverResult<Merchant> {
        let connection = self.connect()?;
        registrar::refresh_embedding(
            &connection,
            &self.db_path,
            &self.memory_cache,
            self.provider.as_ref(),
            self.policy,
            merchant_id,
        )
    }

    /// Fetch a merchant by id.
    pub fn find_merchant(&self, merchant_id: &str) -> ResolverResult<Option<Merchant>> {
        let connection = self.connect()?;
        store::find_by_id(&connection, &self.db_path, merchant_id)
    }

    /// Record an additional raw surface form for a known merchant.
    pub fn add_alias(&self, merchant_id: &str, alias: &str) -> ResolverResult<Merchant> {
        let connection = self.connect()?;
        let Some(merchant) = store::find_by_id(&connection, &self.db_path, merchant_id)? else {
            return Err(ResolverError::MerchantNotFound(merchant_id.to_string()));
        };
        store::add_alias(&connection, &self.db_path, &merchant, alias)
    }

    /// Retention sweep over the persistent cache tier: drop entries older
    /// than `max_age_days` with fewer than `min_usage` hits.
    pub fn prune_embedding_cache(
        &self,
        max_age_days: i64,
        min_usage: i64,
    ) -> ResolverResult<usize> {
        let connection = self.connect()?;
        cache::prune(&connection, &self.db_path, max_age_days, min_usage)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn connect(&self) -> ResolverResult<Connection> {
        open_connection(&self.db_path)
    }
}
