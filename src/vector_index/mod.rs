//! Named embedding indexes backing semantic search
//!
//! Two indexes exist: one for type descriptions and one for method
//! descriptions. Vectors are keyed by entity id and tagged with their
//! repository so a whole repository can be dropped at once.

// LanceDB is the default embedded vector database
pub mod lance_index;
pub use lance_index::LanceVectorIndex;

// In-memory backend for tests and ephemeral runs
pub mod memory;
pub use memory::InMemoryVectorIndex;

use crate::config::VectorIndexConfig;
use anyhow::{Context, Result};
use std::sync::Arc;

/// Index holding type-level description embeddings
pub const TYPE_INDEX: &str = "type_embeddings";

/// Index holding method-level description embeddings
pub const METHOD_INDEX: &str = "method_embeddings";

/// Every named index, in search order
pub const INDEX_NAMES: [&str; 2] = [TYPE_INDEX, METHOD_INDEX];

/// One vector to store
#[derive(Debug, Clone, PartialEq)]
pub struct VectorRecord {
    pub id: String,
    pub repository_id: String,
    pub vector: Vec<f32>,
}

/// One nearest-neighbour hit
#[derive(Debug, Clone, PartialEq)]
pub struct VectorHit {
    pub id: String,
    pub repository_id: String,
    /// Cosine similarity in [0, 1]
    pub score: f32,
}

/// Trait for vector index operations
#[async_trait::async_trait]
pub trait VectorIndex: Send + Sync {
    /// Create the named indexes if needed
    async fn initialize(&self, dimension: usize) -> Result<()>;

    /// Store vectors in a named index, replacing any with the same id
    async fn upsert(&self, index_name: &str, records: Vec<VectorRecord>) -> Result<usize>;

    /// Nearest neighbours by cosine similarity, best first
    async fn search(
        &self,
        index_name: &str,
        vector: &[f32],
        limit: usize,
        repository_ids: &[String],
    ) -> Result<Vec<VectorHit>>;

    /// Remove every vector of a repository from all indexes
    async fn delete_repository(&self, repository_id: &str) -> Result<usize>;

    /// Number of vectors in a named index
    async fn count(&self, index_name: &str) -> Result<usize>;

    /// Short backend name for logs
    fn backend_name(&self) -> &'static str;
}

/// Check that an index name is one of [`INDEX_NAMES`]
pub fn ensure_known_index(index_name: &str) -> Result<()> {
    if INDEX_NAMES.contains(&index_name) {
        Ok(())
    } else {
        Err(crate::error::GraphStoreError::UnknownIndex(index_name.to_string()).into())
    }
}

/// Cosine similarity of two vectors, 0.0 when either is empty or zero
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}

/// Build the configured backend
pub async fn create_vector_index(config: &VectorIndexConfig) -> Result<Arc<dyn VectorIndex>> {
    match config.backend.as_str() {
        "memory" => {
            tracing::info!("Using in-memory vector index");
            Ok(Arc::new(InMemoryVectorIndex::new()))
        }
        "lancedb" => {
            let path = config.lancedb_path.to_string_lossy().to_string();
            let index = LanceVectorIndex::with_path(&path)
                .await
                .context("Failed to initialize LanceDB vector index")?;
            Ok(Arc::new(index))
        }
        other => anyhow::bail!("Unknown vector index backend '{}'", other),
    }
}
