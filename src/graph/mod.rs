//! Graph persistence: repositories, typed entities, relationships and the
//! vector indexes that sit beside them.

pub mod model;
pub mod query_guard;
pub mod schema;
pub mod sqlite_store;

pub use model::{
    Direction, EntityCounts, EntityRecord, EntityType, FieldEntity, MethodEntity, Parameter,
    RelatedEntity, Relationship, RelationshipType, RepositoryRecord, ScoredEntity, TypeEntity,
    TypeKind,
};
pub use sqlite_store::SqliteGraphStore;

use anyhow::Result;
use serde_json::{Map, Value};

/// Trait for graph store operations
///
/// The indexing manager is the only writer. Search only reads.
#[async_trait::async_trait]
pub trait GraphStore: Send + Sync {
    /// Insert or update a repository record by id
    async fn upsert_repository(&self, record: &RepositoryRecord) -> Result<()>;

    async fn get_repository(&self, id: &str) -> Result<Option<RepositoryRecord>>;

    /// Look up a record by normalized URL and branch
    async fn find_repository(&self, url: &str, branch: &str) -> Result<Option<RepositoryRecord>>;

    async fn list_repositories(&self) -> Result<Vec<RepositoryRecord>>;

    /// Delete a repository with every entity, relationship and vector it owns.
    /// Returns false when no such repository existed.
    async fn delete_repository(&self, id: &str) -> Result<bool>;

    /// Store one type with its methods, fields and annotations in one transaction
    async fn store_type(&self, entity: &TypeEntity) -> Result<()>;

    /// Swap a repository's whole entity set for a new one and record the new
    /// commit. Readers see either the old set or the new set, never a mix.
    async fn replace_repository_entities(
        &self,
        record: &RepositoryRecord,
        entities: &[TypeEntity],
    ) -> Result<EntityCounts>;

    /// Resolve EXTENDS/IMPLEMENTS edges by simple name within a repository.
    /// Returns the number of edges now present.
    async fn link_inheritance(&self, repository_id: &str) -> Result<usize>;

    async fn get_entity(&self, id: &str) -> Result<Option<EntityRecord>>;

    async fn list_entities(
        &self,
        repository_id: &str,
        entity_type: EntityType,
    ) -> Result<Vec<EntityRecord>>;

    async fn count_entities(&self, repository_id: &str) -> Result<EntityCounts>;

    /// Edges touching an entity, optionally filtered by type (empty = all)
    async fn relationships(
        &self,
        id: &str,
        types: &[RelationshipType],
        direction: Direction,
    ) -> Result<Vec<RelatedEntity>>;

    /// Run a read-only query over the `entities` view and map rows to records
    async fn query_entities(&self, sql: &str, params: &[Value]) -> Result<Vec<EntityRecord>>;

    /// Run a read-only query and return raw rows keyed by column name
    async fn query_rows(&self, sql: &str, params: &[Value]) -> Result<Vec<Map<String, Value>>>;

    /// Run a guarded INSERT/UPDATE; destructive statements are rejected
    async fn execute_write(&self, sql: &str, params: &[Value]) -> Result<usize>;

    /// Nearest entities in a named embedding index
    async fn vector_search(
        &self,
        index_name: &str,
        vector: &[f32],
        limit: usize,
        repository_ids: &[String],
    ) -> Result<Vec<ScoredEntity>>;
}
