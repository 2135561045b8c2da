use crate::error::ValidationError;
use crate::graph::model::{Direction, EntityCounts, EntityRecord, EntityType, RelationshipType};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Retrieval strategy used for a search
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMode {
    Structural,
    Semantic,
    Temporal,
    Hybrid,
}

impl SearchMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchMode::Structural => "structural",
            SearchMode::Semantic => "semantic",
            SearchMode::Temporal => "temporal",
            SearchMode::Hybrid => "hybrid",
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SearchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "structural" => Ok(SearchMode::Structural),
            "semantic" => Ok(SearchMode::Semantic),
            "temporal" => Ok(SearchMode::Temporal),
            "hybrid" => Ok(SearchMode::Hybrid),
            other => Err(format!(
                "unknown search mode '{}' (expected structural, semantic, temporal or hybrid)",
                other
            )),
        }
    }
}

/// Options accompanying a search query
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchOptions {
    /// Restrict results to these repositories (empty = all)
    #[serde(default)]
    pub repository_ids: Vec<String>,
    /// Pin a mode instead of detecting one from the query text
    #[serde(default)]
    pub preferred_mode: Option<SearchMode>,
    /// Lower the per-mode result ceiling
    #[serde(default)]
    pub max_results: Option<usize>,
}

impl SearchOptions {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(0) = self.max_results {
            return Err(ValidationError::ConstraintViolation {
                field: "max_results".to_string(),
                constraint: "greater than 0".to_string(),
                actual: "0".to_string(),
            });
        }
        if self.repository_ids.iter().any(|id| id.trim().is_empty()) {
            return Err(ValidationError::Empty("repository id".to_string()));
        }
        Ok(())
    }

    pub fn in_repository(mut self, repository_id: impl Into<String>) -> Self {
        self.repository_ids.push(repository_id.into());
        self
    }

    pub fn with_mode(mut self, mode: SearchMode) -> Self {
        self.preferred_mode = Some(mode);
        self
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = Some(max_results);
        self
    }
}

/// A single ranked search hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub entity_id: String,
    pub entity_type: EntityType,
    pub repository_id: String,
    pub fully_qualified_name: String,
    /// File path relative to the repository root
    pub file_path: String,
    /// Description when available, otherwise source text
    pub content: String,
    /// Relevance in [0, 1]
    pub score: f32,
    /// Strategy that produced this hit
    pub mode: SearchMode,
}

impl SearchResult {
    pub fn from_entity(entity: &EntityRecord, score: f32, mode: SearchMode) -> Self {
        Self {
            entity_id: entity.id.clone(),
            entity_type: entity.entity_type,
            repository_id: entity.repository_id.clone(),
            fully_qualified_name: entity.fqn.clone(),
            file_path: entity.file_path.clone(),
            content: entity.display_content(),
            score: score.clamp(0.0, 1.0),
            mode,
        }
    }
}

/// Freshness state of a (URL, branch) key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IndexState {
    NotIndexed,
    Indexing,
    UpToDate,
    Outdated,
    Failed,
}

impl fmt::Display for IndexState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            IndexState::NotIndexed => "NOT_INDEXED",
            IndexState::Indexing => "INDEXING",
            IndexState::UpToDate => "UP_TO_DATE",
            IndexState::Outdated => "OUTDATED",
            IndexState::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

/// Result of a status check
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexStatus {
    pub state: IndexState,
    pub repository_id: Option<String>,
    pub stored_commit: Option<String>,
    pub current_commit: Option<String>,
}

/// Wall-clock time spent in each step of a run, in milliseconds
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunDurations {
    pub clone_ms: u64,
    pub parse_ms: u64,
    pub enrich_ms: u64,
    pub store_ms: u64,
    pub total_ms: u64,
}

/// A file that could not be parsed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseFailure {
    pub file: String,
    pub error: String,
}

/// Report returned by `ensure_indexed`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexOutcome {
    pub repository_id: String,
    /// State the key ended in (UP_TO_DATE on success, FAILED otherwise)
    pub state: IndexState,
    /// True when the stored index was already current and no work ran
    pub reused: bool,
    pub commit: Option<String>,
    pub files_discovered: usize,
    pub files_parsed: usize,
    pub files_skipped: usize,
    #[serde(default)]
    pub parse_failures: Vec<ParseFailure>,
    pub types_stored: usize,
    pub methods_stored: usize,
    pub fields_stored: usize,
    pub embeddings_generated: usize,
    /// Fatal errors; non-empty only for failed runs
    #[serde(default)]
    pub errors: Vec<String>,
    pub durations: RunDurations,
}

impl IndexOutcome {
    /// Outcome for a key whose stored index already matches the current commit
    pub fn up_to_date(repository_id: String, commit: Option<String>) -> Self {
        Self {
            repository_id,
            state: IndexState::UpToDate,
            reused: true,
            commit,
            files_discovered: 0,
            files_parsed: 0,
            files_skipped: 0,
            parse_failures: Vec::new(),
            types_stored: 0,
            methods_stored: 0,
            fields_stored: 0,
            embeddings_generated: 0,
            errors: Vec::new(),
            durations: RunDurations::default(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.state == IndexState::UpToDate && self.errors.is_empty()
    }
}

/// One entity reachable from the root of a dependency query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyNode {
    pub id: String,
    pub name: String,
    pub entity_type: Option<EntityType>,
    pub relationship: RelationshipType,
    pub direction: Direction,
}

/// Shallow dependency tree: the root entity and its direct neighbours
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DependencyTree {
    pub root: EntityRecord,
    /// Depth the caller asked for
    pub requested_depth: usize,
    /// Depth actually traversed; only direct relationships are followed
    pub depth: usize,
    pub direction: Direction,
    pub dependencies: Vec<DependencyNode>,
}

/// One edge on a relationship path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathStep {
    pub from_id: String,
    pub from_name: String,
    pub relationship: RelationshipType,
    pub to_id: String,
    pub to_name: String,
    /// False when the edge was walked against its stored direction
    pub forward: bool,
}

/// Shortest relationship path between two entities
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipPath {
    pub from_id: String,
    pub to_id: String,
    pub found: bool,
    pub steps: Vec<PathStep>,
    pub explanation: String,
}

/// Per-repository summary for operators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryStats {
    pub repository_id: String,
    pub url: String,
    pub branch: String,
    pub last_commit: Option<String>,
    pub counts: EntityCounts,
}

#[cfg(test)]
mod tests;
