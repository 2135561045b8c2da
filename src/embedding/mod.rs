mod fastembed_manager;
mod hashing;

pub use fastembed_manager::FastEmbedManager;
pub use hashing::HashingEmbedder;

use crate::config::EmbeddingConfig;
use crate::error::{ConfigError, EmbeddingError};
use anyhow::Result;
use std::sync::Arc;

/// Trait for embedding generation
pub trait EmbeddingProvider: Send + Sync {
    /// Generate embeddings for a batch of text, preserving order
    fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text, e.g. an ad-hoc search query
    fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(vec![text.to_string()])?
            .into_iter()
            .next()
            .ok_or_else(|| {
                EmbeddingError::CountMismatch {
                    expected: 1,
                    actual: 0,
                }
                .into()
            })
    }

    /// Get the dimension of the embeddings
    fn dimension(&self) -> usize;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// Build the provider named in the configuration
pub fn create_embedding_provider(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    match config.provider.as_str() {
        "fastembed" => Ok(Arc::new(FastEmbedManager::from_model_name(
            &config.model_name,
        )?)),
        "hashing" => Ok(Arc::new(HashingEmbedder::new(config.dimension))),
        other => Err(ConfigError::InvalidValue {
            key: "embedding.provider".to_string(),
            reason: format!("unknown provider '{}'", other),
        }
        .into()),
    }
}
