//! LanceDB vector index (embedded, no server required)
//!
//! Each named index is a LanceDB table with an `id`, a `repository_id` and a
//! fixed-size `vector` column. Searches use cosine distance, reported back as
//! similarity `1 - distance`.

use super::{INDEX_NAMES, VectorHit, VectorIndex, VectorRecord, ensure_known_index};
use anyhow::{Context, Result};
use arrow_array::{
    Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, StringArray,
    types::Float32Type,
};
use arrow_schema::{DataType, Field, Schema};
use futures::stream::TryStreamExt;
use lancedb::Table;
use lancedb::connection::Connection;
use lancedb::query::{ExecutableQuery, QueryBase};
use std::sync::Arc;

/// LanceDB-backed implementation of [`VectorIndex`]
pub struct LanceVectorIndex {
    connection: Connection,
    db_path: String,
}

impl LanceVectorIndex {
    /// Create a new LanceDB index with the default path
    pub async fn new() -> Result<Self> {
        let db_path = crate::paths::PlatformPaths::default_lancedb_path()
            .to_string_lossy()
            .to_string();
        Self::with_path(&db_path).await
    }

    /// Create a new LanceDB index with a custom path
    pub async fn with_path(db_path: &str) -> Result<Self> {
        tracing::info!("Connecting to LanceDB at: {}", db_path);

        let connection = lancedb::connect(db_path)
            .execute()
            .await
            .context("Failed to connect to LanceDB")?;

        Ok(Self {
            connection,
            db_path: db_path.to_string(),
        })
    }

    fn create_schema(dimension: usize) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, true)),
                    dimension as i32,
                ),
                false,
            ),
            Field::new("id", DataType::Utf8, false),
            Field::new("repository_id", DataType::Utf8, false),
        ]))
    }

    fn create_record_batch(records: Vec<VectorRecord>, schema: Arc<Schema>) -> Result<RecordBatch> {
        let dimension = records.first().map(|r| r.vector.len()).unwrap_or(0);

        let id_array = StringArray::from(records.iter().map(|r| r.id.as_str()).collect::<Vec<_>>());
        let repo_array = StringArray::from(
            records
                .iter()
                .map(|r| r.repository_id.as_str())
                .collect::<Vec<_>>(),
        );
        let vector_array = FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(
            records
                .into_iter()
                .map(|r| Some(r.vector.into_iter().map(Some))),
            dimension as i32,
        );

        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(vector_array),
                Arc::new(id_array),
                Arc::new(repo_array),
            ],
        )
        .context("Failed to create RecordBatch")
    }

    async fn table_exists(&self, name: &str) -> Result<bool> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .context("Failed to list tables")?;
        Ok(table_names.iter().any(|t| t == name))
    }

    async fn create_table(&self, name: &str, dimension: usize) -> Result<()> {
        let schema = Self::create_schema(dimension);
        let empty_batch = RecordBatch::new_empty(schema.clone());
        let batches = RecordBatchIterator::new(vec![empty_batch].into_iter().map(Ok), schema);

        self.connection
            .create_table(name, Box::new(batches))
            .execute()
            .await
            .with_context(|| format!("Failed to create table '{}'", name))?;

        tracing::info!("Created vector table '{}' (dimension {})", name, dimension);
        Ok(())
    }

    async fn open_table(&self, name: &str) -> Result<Option<Table>> {
        if !self.table_exists(name).await? {
            return Ok(None);
        }
        let table = self
            .connection
            .open_table(name)
            .execute()
            .await
            .with_context(|| format!("Failed to open table '{}'", name))?;
        Ok(Some(table))
    }
}

/// Quote a string for use inside a Lance SQL filter
fn sql_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

fn in_list(values: impl Iterator<Item = impl AsRef<str>>) -> String {
    values
        .map(|v| sql_literal(v.as_ref()))
        .collect::<Vec<_>>()
        .join(", ")
}

#[async_trait::async_trait]
impl VectorIndex for LanceVectorIndex {
    async fn initialize(&self, dimension: usize) -> Result<()> {
        tracing::info!(
            "Initializing LanceDB indexes with dimension {} at {}",
            dimension,
            self.db_path
        );

        for name in INDEX_NAMES {
            if self.table_exists(name).await? {
                tracing::debug!("Table '{}' already exists", name);
                continue;
            }
            self.create_table(name, dimension).await?;
        }
        Ok(())
    }

    async fn upsert(&self, index_name: &str, records: Vec<VectorRecord>) -> Result<usize> {
        ensure_known_index(index_name)?;
        if records.is_empty() {
            return Ok(0);
        }

        let dimension = records[0].vector.len();
        if let Some(bad) = records.iter().find(|r| r.vector.len() != dimension) {
            return Err(crate::error::EmbeddingError::DimensionMismatch {
                expected: dimension,
                actual: bad.vector.len(),
            }
            .into());
        }

        let table = match self.open_table(index_name).await? {
            Some(table) => table,
            None => {
                self.create_table(index_name, dimension).await?;
                self.open_table(index_name)
                    .await?
                    .context("Table missing right after creation")?
            }
        };

        let filter = format!("id IN ({})", in_list(records.iter().map(|r| r.id.as_str())));
        table
            .delete(&filter)
            .await
            .context("Failed to delete replaced vectors")?;

        let schema = Self::create_schema(dimension);
        let batch = Self::create_record_batch(records, schema.clone())?;
        let count = batch.num_rows();
        let batches = RecordBatchIterator::new(vec![batch].into_iter().map(Ok), schema);

        table
            .add(Box::new(batches))
            .execute()
            .await
            .context("Failed to add records to table")?;

        tracing::debug!("Stored {} vectors in '{}'", count, index_name);
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
        let Some(table) = self.open_table(index_name).await? else {
            return Ok(Vec::new());
        };

        let query = table
            .vector_search(vector.to_vec())
            .context("Failed to create vector search")?
            .distance_type(lancedb::DistanceType::Cosine)
            .limit(limit);

        let stream = if repository_ids.is_empty() {
            query.execute().await.context("Failed to execute search")?
        } else {
            query
                .only_if(format!(
                    "repository_id IN ({})",
                    in_list(repository_ids.iter())
                ))
                .execute()
                .await
                .context("Failed to execute search")?
        };

        let batches: Vec<RecordBatch> = stream
            .try_collect()
            .await
            .context("Failed to collect search results")?;

        let mut hits = Vec::new();
        for batch in &batches {
            let ids = batch
                .column_by_name("id")
                .context("Missing id column")?
                .as_any()
                .downcast_ref::<StringArray>()
                .context("Invalid id type")?;
            let repos = batch
                .column_by_name("repository_id")
                .context("Missing repository_id column")?
                .as_any()
                .downcast_ref::<StringArray>()
                .context("Invalid repository_id type")?;
            let distances = batch
                .column_by_name("_distance")
                .context("Missing _distance column")?
                .as_any()
                .downcast_ref::<Float32Array>()
                .context("Invalid _distance type")?;

            for i in 0..batch.num_rows() {
                hits.push(VectorHit {
                    id: ids.value(i).to_string(),
                    repository_id: repos.value(i).to_string(),
                    score: (1.0 - distances.value(i)).clamp(0.0, 1.0),
                });
            }
        }

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(hits)
    }

    async fn delete_repository(&self, repository_id: &str) -> Result<usize> {
        let filter = format!("repository_id = {}", sql_literal(repository_id));
        let mut removed = 0;

        for name in INDEX_NAMES {
            let Some(table) = self.open_table(name).await? else {
                continue;
            };
            let before = table
                .count_rows(Some(filter.clone()))
                .await
                .context("Failed to count rows")?;
            table
                .delete(&filter)
                .await
                .with_context(|| format!("Failed to delete vectors from '{}'", name))?;
            removed += before;
        }

        tracing::debug!(
            "Removed {} vectors for repository {}",
            removed,
            repository_id
        );
        Ok(removed)
    }

    async fn count(&self, index_name: &str) -> Result<usize> {
        ensure_known_index(index_name)?;
        match self.open_table(index_name).await? {
            Some(table) => table.count_rows(None).await.context("Failed to count rows"),
            None => Ok(0),
        }
    }

    fn backend_name(&self) -> &'static str {
        "lancedb"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vector_index::{METHOD_INDEX, TYPE_INDEX};
    use tempfile::TempDir;

    async fn open(temp: &TempDir) -> LanceVectorIndex {
        let path = temp.path().join("lancedb");
        LanceVectorIndex::with_path(path.to_str().unwrap())
            .await
            .unwrap()
    }

    fn record(id: &str, repo: &str, vector: Vec<f32>) -> VectorRecord {
        VectorRecord {
            id: id.to_string(),
            repository_id: repo.to_string(),
            vector,
        }
    }

    #[test]
    fn test_sql_literal_escapes_quotes() {
        assert_eq!(sql_literal("o'brien"), "'o''brien'");
        assert_eq!(in_list(["a", "b"].iter()), "'a', 'b'");
    }

    #[test]
    fn test_schema_has_vector_column() {
        let schema = LanceVectorIndex::create_schema(4);
        assert_eq!(schema.fields().len(), 3);
        assert!(schema.field_with_name("vector").is_ok());
        assert!(schema.field_with_name("repository_id").is_ok());
    }

    #[tokio::test]
    async fn test_initialize_creates_tables() {
        let temp = TempDir::new().unwrap();
        let index = open(&temp).await;
        index.initialize(3).await.unwrap();
        index.initialize(3).await.unwrap();

        assert_eq!(index.count(TYPE_INDEX).await.unwrap(), 0);
        assert_eq!(index.count(METHOD_INDEX).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_upsert_search_delete() {
        let temp = TempDir::new().unwrap();
        let index = open(&temp).await;
        index.initialize(3).await.unwrap();

        index
            .upsert(
                TYPE_INDEX,
                vec![
                    record("a", "r1", vec![1.0, 0.0, 0.0]),
                    record("b", "r2", vec![0.0, 1.0, 0.0]),
                ],
            )
            .await
            .unwrap();

        let hits = index
            .search(TYPE_INDEX, &[1.0, 0.0, 0.0], 5, &[])
            .await
            .unwrap();
        assert_eq!(hits[0].id, "a");
        assert!((hits[0].score - 1.0).abs() < 1e-4);

        let filtered = index
            .search(TYPE_INDEX, &[1.0, 0.0, 0.0], 5, &["r2".to_string()])
            .await
            .unwrap();
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].id, "b");

        assert_eq!(index.delete_repository("r1").await.unwrap(), 1);
        assert_eq!(index.count(TYPE_INDEX).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_upsert_replaces_existing_id() {
        let temp = TempDir::new().unwrap();
        let index = open(&temp).await;
        index.initialize(2).await.unwrap();

        index
            .upsert(METHOD_INDEX, vec![record("m", "r1", vec![1.0, 0.0])])
            .await
            .unwrap();
        index
            .upsert(METHOD_INDEX, vec![record("m", "r1", vec![0.0, 1.0])])
            .await
            .unwrap();

        assert_eq!(index.count(METHOD_INDEX).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_upsert_rejects_mixed_dimensions() {
        let temp = TempDir::new().unwrap();
        let index = open(&temp).await;
        let result = index
            .upsert(
                TYPE_INDEX,
                vec![record("a", "r", vec![1.0, 0.0]), record("b", "r", vec![1.0])],
            )
            .await;
        assert!(result.is_err());
    }
}
