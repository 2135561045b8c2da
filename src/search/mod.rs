//! Multi-strategy code search over the graph store
//!
//! Structural search matches identifier-like tokens against entity names,
//! semantic search ranks description embeddings against the query, and
//! hybrid search tries an exact name match before merging both. Keyword
//! search backs semantic search when the vector index is unavailable.
//! Every mode caps its own result count.

pub mod keyword;
pub mod mode;
mod relations;

pub use keyword::tokenize_keywords;
pub use mode::detect_mode;

use crate::config::SearchConfig;
use crate::enrichment::EnrichmentPipeline;
use crate::error::ValidationError;
use crate::graph::sqlite_store::ENTITY_COLUMNS;
use crate::graph::{EntityRecord, EntityType, GraphStore};
use crate::types::{SearchMode, SearchOptions, SearchResult};
use crate::vector_index::{METHOD_INDEX, TYPE_INDEX};
use anyhow::Result;
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

/// Candidate rows fetched per returned result before ranking
const CANDIDATE_FACTOR: usize = 4;

/// Score of a literal file path match, relative to a name match
const PATH_MATCH_SCORE: f32 = keyword::QUALIFIED_WEIGHT / keyword::NAME_WEIGHT;

/// Read-only search over one graph store
pub struct SearchEngine {
    store: Arc<dyn GraphStore>,
    pipeline: Arc<EnrichmentPipeline>,
    config: SearchConfig,
}

/// Accumulates conditions over the `entities` view with numbered parameters
#[derive(Default)]
struct EntityQuery {
    conditions: Vec<String>,
    params: Vec<Value>,
}

impl EntityQuery {
    /// Bind a parameter and return its placeholder
    fn bind(&mut self, value: impl Into<Value>) -> String {
        self.params.push(value.into());
        format!("?{}", self.params.len())
    }

    fn condition(&mut self, condition: String) {
        self.conditions.push(condition);
    }

    fn in_repositories(&mut self, repository_ids: &[String]) {
        if repository_ids.is_empty() {
            return;
        }
        let placeholders: Vec<String> = repository_ids
            .iter()
            .map(|id| self.bind(id.as_str()))
            .collect();
        self.condition(format!("repository_id IN ({})", placeholders.join(", ")));
    }

    fn sql(&self, limit: usize) -> String {
        let filter = if self.conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.conditions.join(" AND "))
        };
        format!(
            "SELECT {} FROM entities{} ORDER BY fqn, id LIMIT {}",
            ENTITY_COLUMNS, filter, limit
        )
    }
}

/// Keep the best score per entity, order by score then name, and cap the list
fn rank(results: Vec<SearchResult>, limit: usize) -> Vec<SearchResult> {
    let mut best: HashMap<String, SearchResult> = HashMap::new();
    for result in results {
        match best.get(&result.entity_id) {
            Some(existing) if existing.score >= result.score => {}
            _ => {
                best.insert(result.entity_id.clone(), result);
            }
        }
    }

    let mut ranked: Vec<SearchResult> = best.into_values().collect();
    ranked.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.fully_qualified_name.cmp(&b.fully_qualified_name))
            .then_with(|| a.entity_id.cmp(&b.entity_id))
    });
    ranked.truncate(limit);
    ranked
}

/// Words starting with an uppercase letter, the way type and member names read
fn identifier_tokens(query: &str) -> Vec<String> {
    let mut tokens: Vec<String> = Vec::new();
    for word in query.split(|c: char| !(c.is_alphanumeric() || c == '_' || c == '$')) {
        let starts_upper = word.chars().next().is_some_and(|c| c.is_uppercase());
        if !starts_upper || keyword::is_stop_word(&word.to_lowercase()) {
            continue;
        }
        if !tokens.iter().any(|t| t == word) {
            tokens.push(word.to_string());
        }
    }
    tokens
}

impl SearchEngine {
    pub fn new(
        store: Arc<dyn GraphStore>,
        pipeline: Arc<EnrichmentPipeline>,
        config: SearchConfig,
    ) -> Self {
        Self {
            store,
            pipeline,
            config,
        }
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Multiplier for an entity's type: types are boosted, fields damped.
    ///
    /// Weights are scaled by the largest one so a weighted score stays in
    /// [0, 1] without clamping away the boost.
    fn type_weight(&self, entity_type: EntityType) -> f32 {
        let weight = match entity_type {
            EntityType::Type => self.config.type_boost,
            EntityType::Method => 1.0,
            EntityType::Field => self.config.field_weight,
        };
        let max = self
            .config
            .type_boost
            .max(1.0)
            .max(self.config.field_weight);
        weight / max
    }

    fn weighted(&self, entity: &EntityRecord, score: f32, mode: SearchMode) -> SearchResult {
        SearchResult::from_entity(entity, score * self.type_weight(entity.entity_type), mode)
    }

    /// Answer a query with the pinned mode, or one detected from its text.
    ///
    /// `max_results` can only lower the selected mode's own ceiling.
    pub async fn search(&self, query: &str, options: &SearchOptions) -> Result<Vec<SearchResult>> {
        let query = query.trim();
        if query.is_empty() {
            return Err(ValidationError::Empty("query".to_string()).into());
        }
        options.validate()?;

        let mode = options.preferred_mode.unwrap_or_else(|| detect_mode(query));
        let repository_ids = &options.repository_ids;
        tracing::debug!("Searching '{}' in {} mode", query, mode);

        let mut results = match mode {
            SearchMode::Structural => self.structural_search(query, repository_ids).await?,
            SearchMode::Semantic => self.semantic_search(query, repository_ids).await?,
            SearchMode::Temporal => self.temporal_search(query, repository_ids).await?,
            SearchMode::Hybrid => self.hybrid_search(query, repository_ids).await?,
        };
        if let Some(max_results) = options.max_results {
            results.truncate(max_results);
        }

        tracing::info!(
            "Search '{}' ({}) returned {} results",
            query,
            mode,
            results.len()
        );
        Ok(results)
    }

    /// Match capitalized tokens of the query against entity names by containment
    pub async fn structural_search(
        &self,
        query: &str,
        repository_ids: &[String],
    ) -> Result<Vec<SearchResult>> {
        let tokens = identifier_tokens(query);
        if tokens.is_empty() {
            tracing::debug!("No identifier tokens in '{}'", query);
            return Ok(Vec::new());
        }

        let mut q = EntityQuery::default();
        let matches: Vec<String> = tokens
            .iter()
            .map(|t| format!("instr(lower(name), lower({})) > 0", q.bind(t.as_str())))
            .collect();
        q.condition(format!("({})", matches.join(" OR ")));
        q.in_repositories(repository_ids);

        let limit = self.config.structural_limit;
        let entities = self
            .store
            .query_entities(&q.sql(limit * CANDIDATE_FACTOR), &q.params)
            .await?;

        let results = entities
            .iter()
            .map(|entity| {
                let name = entity.name.to_lowercase();
                let score = tokens
                    .iter()
                    .map(|t| t.to_lowercase())
                    .filter(|t| name.contains(t.as_str()))
                    .map(|t| {
                        if t == name {
                            1.0
                        } else {
                            0.5 + 0.25 * (t.len() as f32 / name.len().max(1) as f32)
                        }
                    })
                    .fold(0.0_f32, f32::max);
                self.weighted(entity, score, SearchMode::Structural)
            })
            .collect();
        Ok(rank(results, limit))
    }

    /// Rank type and method description embeddings against the query.
    ///
    /// Hits below the similarity floor are dropped. When the query cannot be
    /// embedded or the vector index fails, keyword search answers instead.
    pub async fn semantic_search(
        &self,
        query: &str,
        repository_ids: &[String],
    ) -> Result<Vec<SearchResult>> {
        let vector = match self.pipeline.embed(query).await {
            Ok(vector) => vector,
            Err(e) => {
                tracing::warn!(
                    "Query embedding failed, falling back to keyword search: {:#}",
                    e
                );
                return self.keyword_search(query, repository_ids).await;
            }
        };

        let limit = self.config.semantic_limit;
        let mut hits = Vec::new();
        for index in [TYPE_INDEX, METHOD_INDEX] {
            match self
                .store
                .vector_search(index, &vector, limit, repository_ids)
                .await
            {
                Ok(found) => hits.extend(found),
                Err(e) => {
                    tracing::warn!(
                        "Vector index '{}' unavailable, falling back to keyword search: {:#}",
                        index,
                        e
                    );
                    return self.keyword_search(query, repository_ids).await;
                }
            }
        }

        let floor = self.config.similarity_floor;
        let results = hits
            .iter()
            .filter(|hit| hit.score >= floor)
            .map(|hit| SearchResult::from_entity(&hit.entity, hit.score, SearchMode::Semantic))
            .collect();
        Ok(rank(results, limit))
    }

    /// Field-weighted keyword containment over names, paths, descriptions and source.
    ///
    /// A query with no usable keywords that reads like a path is matched
    /// literally against file paths.
    pub async fn keyword_search(
        &self,
        query: &str,
        repository_ids: &[String],
    ) -> Result<Vec<SearchResult>> {
        let keywords = tokenize_keywords(query);
        let limit = self.config.keyword_limit;

        if keywords.is_empty() {
            if !keyword::looks_like_path(query) {
                return Ok(Vec::new());
            }
            let literal = query.trim().replace('\\', "/").to_lowercase();
            let mut q = EntityQuery::default();
            let placeholder = q.bind(literal);
            q.condition(format!("instr(lower(file_path), {}) > 0", placeholder));
            q.in_repositories(repository_ids);
            let entities = self.store.query_entities(&q.sql(limit), &q.params).await?;
            let results = entities
                .iter()
                .map(|e| self.weighted(e, PATH_MATCH_SCORE, SearchMode::Semantic))
                .collect();
            return Ok(rank(results, limit));
        }

        let mut q = EntityQuery::default();
        let matches: Vec<String> = keywords
            .iter()
            .map(|k| {
                let p = q.bind(k.as_str());
                format!(
                    "(instr(lower(name), {p}) > 0 OR instr(lower(fqn), {p}) > 0 \
                     OR instr(lower(file_path), {p}) > 0 \
                     OR instr(lower(COALESCE(description, '')), {p}) > 0 \
                     OR instr(lower(COALESCE(source, '')), {p}) > 0)"
                )
            })
            .collect();
        q.condition(format!("({})", matches.join(" OR ")));
        q.in_repositories(repository_ids);

        let entities = self
            .store
            .query_entities(&q.sql(limit * CANDIDATE_FACTOR), &q.params)
            .await?;
        let results = entities
            .iter()
            .map(|e| {
                let score = keyword::keyword_score(e, &keywords);
                self.weighted(e, score, SearchMode::Semantic)
            })
            .filter(|r| r.score > 0.0)
            .collect();
        Ok(rank(results, limit))
    }

    /// History-based retrieval is not available; always returns no results
    pub async fn temporal_search(
        &self,
        query: &str,
        _repository_ids: &[String],
    ) -> Result<Vec<SearchResult>> {
        tracing::warn!(
            "Temporal search is not supported, returning no results for '{}'",
            query
        );
        Ok(Vec::new())
    }

    /// Exact case-insensitive name match on types and methods first; only
    /// when that finds nothing, the merged structural and semantic results.
    pub async fn hybrid_search(
        &self,
        query: &str,
        repository_ids: &[String],
    ) -> Result<Vec<SearchResult>> {
        let limit = self.config.hybrid_limit;

        let mut q = EntityQuery::default();
        let placeholder = q.bind(query.trim());
        q.condition(format!("lower(name) = lower({})", placeholder));
        q.condition("entity_type IN ('TYPE', 'METHOD')".to_string());
        q.in_repositories(repository_ids);
        let exact = self.store.query_entities(&q.sql(limit), &q.params).await?;

        if !exact.is_empty() {
            tracing::debug!("Exact name match for '{}': {} entities", query, exact.len());
            let results = exact
                .iter()
                .map(|e| SearchResult::from_entity(e, 1.0, SearchMode::Hybrid))
                .collect();
            return Ok(rank(results, limit));
        }

        let mut merged = self.structural_search(query, repository_ids).await?;
        merged.extend(self.semantic_search(query, repository_ids).await?);
        for result in &mut merged {
            result.mode = SearchMode::Hybrid;
        }
        Ok(rank(merged, limit))
    }
}
