pub mod error;
pub mod migrations;
pub mod resolve;
pub mod state;

pub use error::{ResolverError, ResolverResult};
pub use resolve::matcher::{MatchMethod, MerchantMatch, MerchantSimilarity};
pub use resolve::policy::{MATCH_POLICY_V1, MatchPolicy};
pub use resolve::provider::{EmbeddingProvider, ProviderError};
pub use resolve::store::Merchant;
pub use resolve::MerchantResolver;

pub const API_VERSION: &str = env!("CARGO_PKG_VERSION");
