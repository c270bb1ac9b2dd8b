use std::path::PathBuf;

use thiserror::Error;

use crate::resolve::provider::ProviderError;

/// Failure classes surfaced by the resolver.
///
/// Store-level failures (init, lock, corruption, migration) are fatal to the
/// caller: no tier of the match pipeline can run without the ledger.
/// Provider failures are fatal only for the operations that exist to talk to
/// the provider (`refresh_embedding`, `generate_missing_embeddings`); inside
/// the match pipeline they degrade to a tier miss.
#[derive(Debug, Error)]
pub enum ResolverError {
    #[error("Cannot initialize merchant ledger at `{path}`: {detail}")]
    StorePermissionDenied { path: PathBuf, detail: String },

    #[error("Merchant ledger database is locked at `{path}`.")]
    StoreLocked { path: PathBuf },

    #[error("Merchant ledger database appears corrupt at `{path}`.")]
    StoreCorrupt { path: PathBuf },

    #[error("Merchant ledger migration failed at `{path}`: {detail}")]
    Migration { path: PathBuf, detail: String },

    #[error("Merchant ledger operation failed at `{path}`: {detail}")]
    Store { path: PathBuf, detail: String },

    #[error("Merchant not found: {0}")]
    MerchantNotFound(String),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("{0}")]
    InvalidArgument(String),
}

impl ResolverError {
    pub fn invalid_argument(message: &str) -> Self {
        Self::InvalidArgument(message.to_string())
    }
}

pub type ResolverResult<T> = Result<T, ResolverError>;
