//! In-memory [`VectorIndex`] implementation for tests and ephemeral runs.
//!
//! Vectors live in a `HashMap` per index behind `std::sync::RwLock`.
//! Search is brute-force cosine similarity over all stored vectors.

use super::{VectorHit, VectorIndex, VectorRecord, cosine_similarity, ensure_known_index};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

struct StoredVector {
    repository_id: String,
    vector: Vec<f32>,
}

/// Brute-force vector index kept entirely in memory
pub struct InMemoryVectorIndex {
    indexes: RwLock<HashMap<String, HashMap<String, StoredVector>>>,
}

impl InMemoryVectorIndex {
    pub fn new() -> Self {
        Self {
            indexes: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for InMemoryVectorIndex {
    fn default() -> Self {
        Self::new()
    }
}

fn poisoned<T>(e: std::sync::PoisonError<T>) -> anyhow::Error {
    anyhow!("Vector index lock poisoned: {}", e)
}

#[async_trait]
impl VectorIndex for InMemoryVectorIndex {
    async fn initialize(&self, _dimension: usize) -> Result<()> {
        let mut indexes = self.indexes.write().map_err(poisoned)?;
        for name in super::INDEX_NAMES {
            indexes.entry(name.to_string()).or_default();
        }
        Ok(())
    }

    async fn upsert(&self, index_name: &str, records: Vec<VectorRecord>) -> Result<usize> {
        ensure_known_index(index_name)?;
        let count = records.len();
        let mut indexes = self.indexes.write().map_err(poisoned)?;
        let index = indexes.entry(index_name.to_string()).or_default();
        for record in records {
            index.insert(
                record.id,
                StoredVector {
                    repository_id: record.repository_id,
                    vector: record.vector,
                },
            );
        }
        Ok(count)
    }

    async fn search(
        &self,
        index_name: &str,
        vector: &[f32],
        limit: usize,
        repository_ids: &[String],
    ) -> Result<Vec<VectorHit>> {
        ensure_known_index(index_name)?;
        let indexes = self.indexes.read().map_err(poisoned)?;
        let Some(index) = indexes.get(index_name) else {
            return Ok(Vec::new());
        };

        let mut hits: Vec<VectorHit> = index
            .iter()
            .filter(|(_, sv)| repository_ids.is_empty() || repository_ids.contains(&sv.repository_id))
            .map(|(id, sv)| VectorHit {
                id: id.clone(),
                repository_id: sv.repository_id.clone(),
                score: cosine_similarity(vector, &sv.vector).clamp(0.0, 1.0),
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        hits.truncate(limit);
        Ok(hits)
    }

    async fn delete_repository(&self, repository_id: &str) -> Result<usize> {
        let mut indexes = self.indexes.write().map_err(poisoned)?;
        let mut removed = 0;
        for index in indexes.values_mut() {
            let before = index.len();
            index.retain(|_, sv| sv.repository_id != repository_id);
            removed += before - index.len();
        }
        Ok(removed)
    }

    async fn count(&self, index_name: &str) -> Result<usize> {
        ensure_known_index(index_name)?;
        let indexes = self.indexes.read().map_err(poisoned)?;
        Ok(indexes.get(index_name).map(|i| i.len()).unwrap_or(0))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
