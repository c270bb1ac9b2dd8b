use std::time::Duration;

use thiserror::Error;

/// Error type for embedding-generation calls.
///
/// Every variant is recoverable from the pipeline's point of view: inside
/// `find_best_match` a provider failure is a tier miss, and the registrar's
/// creation path continues without an embedding.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Embedding request timed out after {0:?}")]
    Timeout(Duration),

    #[error("Embedding provider rejected the request: {0}")]
    Rejected(String),

    #[error("Embedding response malformed: {0}")]
    Malformed(String),
}

/// External embedding-generation capability.
///
/// Cost-bearing and rate-limited; the engine invokes it only after both
/// cache tiers miss. Implementations own their network timeout and must
/// return one vector per input text, in input order.
pub trait EmbeddingProvider: Send + Sync {
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ProviderError>;

    fn embed(&self, text: &str) -> Result<Vec<f32>, ProviderError> {
        let batch = [text.to_string()];
        let mut vectors = self.embed_batch(&batch)?;
        if vectors.len() != 1 {
            return Err(ProviderError::Malformed(format!(
                "Expected 1 vector, provider returned {}.",
                vectors.len()
            )));
        }
        Ok(vectors.remove(0))
    }
}
