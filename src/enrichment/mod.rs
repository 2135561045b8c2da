//! Description and embedding pipeline
//!
//! Two stages behind narrow traits: a [`DescriptionGenerator`] turns entities
//! into text, an [`EmbeddingProvider`] turns text into vectors. Any failure is
//! fatal to the run that asked for it.

pub mod describer;

pub use describer::{DescriptionGenerator, TemplateDescriber};

use crate::embedding::EmbeddingProvider;
use crate::error::{EmbeddingError, IndexingError};
use crate::graph::model::TypeEntity;
use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Which entity a description belongs to: (type index, method index)
type Slot = (usize, Option<usize>);

/// Counts reported by one enrichment pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EnrichmentStats {
    pub descriptions: usize,
    pub embeddings: usize,
}

pub struct EnrichmentPipeline {
    describer: Arc<dyn DescriptionGenerator>,
    embedder: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
    batch_timeout: Duration,
}

impl EnrichmentPipeline {
    pub fn new(
        describer: Arc<dyn DescriptionGenerator>,
        embedder: Arc<dyn EmbeddingProvider>,
        batch_size: usize,
        batch_timeout: Duration,
    ) -> Self {
        Self {
            describer,
            embedder,
            batch_size: batch_size.max(1),
            batch_timeout,
        }
    }

    pub fn embedder(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedder
    }

    pub fn describe_type(&self, entity: &TypeEntity) -> Result<String> {
        self.describer.describe_type(entity)
    }

    pub fn describe_method(&self, entity: &TypeEntity, method_index: usize) -> Result<String> {
        let method = entity
            .methods
            .get(method_index)
            .with_context(|| format!("{} has no method #{}", entity.fqn, method_index))?;
        self.describer.describe_method(method, entity)
    }

    /// Embed a single text off the async runtime, bounded by the batch timeout
    pub async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(vec![text.to_string()]).await?;
        vectors.pop().ok_or_else(|| {
            EmbeddingError::CountMismatch {
                expected: 1,
                actual: 0,
            }
            .into()
        })
    }

    /// Embed texts in order, checking the provider's output shape
    pub async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>> {
        let expected = texts.len();
        let dimension = self.embedder.dimension();
        let provider = self.embedder.clone();
        let task = tokio::task::spawn_blocking(move || provider.embed_batch(texts));

        let vectors = match tokio::time::timeout(self.batch_timeout, task).await {
            Ok(Ok(result)) => result?,
            Ok(Err(e)) => {
                return Err(EmbeddingError::GenerationFailed(format!(
                    "embedding task panicked: {}",
                    e
                ))
                .into());
            }
            Err(_) => return Err(EmbeddingError::Timeout(self.batch_timeout.as_secs()).into()),
        };

        if vectors.len() != expected {
            return Err(EmbeddingError::CountMismatch {
                expected,
                actual: vectors.len(),
            }
            .into());
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != dimension) {
            return Err(EmbeddingError::DimensionMismatch {
                expected: dimension,
                actual: bad.len(),
            }
            .into());
        }
        Ok(vectors)
    }

    /// Describe and embed every type and method in place.
    ///
    /// Fields are described only through their owner. On error the entities
    /// may be partially enriched and must be discarded.
    pub async fn enrich(
        &self,
        entities: &mut [TypeEntity],
        cancel: &CancellationToken,
    ) -> Result<EnrichmentStats> {
        let mut slots: Vec<Slot> = Vec::new();
        let mut texts: Vec<String> = Vec::new();

        for (type_index, entity) in entities.iter_mut().enumerate() {
            entity.description = self
                .describer
                .describe_type(entity)
                .with_context(|| format!("Failed to describe {}", entity.fqn))?;
            slots.push((type_index, None));
            texts.push(entity.description.clone());

            for method_index in 0..entity.methods.len() {
                let description = self
                    .describer
                    .describe_method(&entity.methods[method_index], entity)
                    .with_context(|| {
                        format!(
                            "Failed to describe {}#{}",
                            entity.fqn, entity.methods[method_index].name
                        )
                    })?;
                entity.methods[method_index].description = description.clone();
                slots.push((type_index, Some(method_index)));
                texts.push(description);
            }
        }

        let descriptions = texts.len();
        let total_batches = descriptions.div_ceil(self.batch_size);
        tracing::debug!(
            "Embedding {} descriptions in {} batches",
            descriptions,
            total_batches
        );

        let mut embeddings = 0;
        for (batch_index, (slot_batch, text_batch)) in slots
            .chunks(self.batch_size)
            .zip(texts.chunks(self.batch_size))
            .enumerate()
        {
            if cancel.is_cancelled() {
                tracing::info!("Enrichment cancelled after {} embeddings", embeddings);
                return Err(IndexingError::Cancelled.into());
            }

            let vectors = tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Enrichment cancelled during batch {}", batch_index);
                    return Err(IndexingError::Cancelled.into());
                }
                result = self.embed_batch(text_batch.to_vec()) => result.with_context(|| {
                    format!("Embedding batch {}/{} failed", batch_index + 1, total_batches)
                })?,
            };

            for (&(type_index, method_index), vector) in slot_batch.iter().zip(vectors) {
                let entity = &mut entities[type_index];
                match method_index {
                    Some(m) => entity.methods[m].embedding = Some(vector),
                    None => entity.embedding = Some(vector),
                }
                embeddings += 1;
            }
        }

        tracing::info!(
            "Enriched {} types: {} descriptions, {} embeddings",
            entities.len(),
            descriptions,
            embeddings
        );
        Ok(EnrichmentStats {
            descriptions,
            embeddings,
        })
    }
}

#[cfg(test)]
mod tests;
