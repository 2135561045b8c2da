//! SQLite-backed graph store
//!
//! One connection guarded by a mutex; every call runs on the blocking pool.
//! Vector similarity is delegated to a [`VectorIndex`] and hits are hydrated
//! from the `entities` view.

use super::model::*;
use super::query_guard;
use super::schema;
use super::GraphStore;
use crate::error::GraphStoreError;
use crate::vector_index::{self, METHOD_INDEX, TYPE_INDEX, VectorIndex, VectorRecord};
use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use rusqlite::types::{Type, Value as SqlValue, ValueRef};
use rusqlite::{Connection, OptionalExtension, Row, Transaction, params, params_from_iter};
use serde_json::{Map, Value};
use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Columns of the `entities` view, in [`entity_from_row`] order
pub const ENTITY_COLUMNS: &str = "id, entity_type, repository_id, name, fqn, file_path, detail, description, source, start_line, end_line, owner_id";

const REPOSITORY_COLUMNS: &str = "id, url, branch, language, last_commit, last_indexed_at";

/// SQLite implementation of [`GraphStore`]
pub struct SqliteGraphStore {
    conn: Arc<Mutex<Connection>>,
    vectors: Option<Arc<dyn VectorIndex>>,
    location: String,
}

impl SqliteGraphStore {
    /// Open (creating if needed) a database file
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create graph store directory {}", parent.display())
            })?;
        }

        tracing::info!("Opening graph store at: {}", path.display());
        let conn = Connection::open(path)
            .map_err(|e| GraphStoreError::OpenFailed(format!("{}: {}", path.display(), e)))?;
        Self::from_connection(conn, path.display().to_string())
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| GraphStoreError::OpenFailed(e.to_string()))?;
        Self::from_connection(conn, ":memory:".to_string())
    }

    fn from_connection(conn: Connection, location: String) -> Result<Self> {
        schema::init_schema(&conn)
            .map_err(|e| GraphStoreError::OpenFailed(format!("schema: {}", e)))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            vectors: None,
            location,
        })
    }

    /// Attach the vector index used for embeddings
    pub fn with_vector_index(mut self, index: Arc<dyn VectorIndex>) -> Self {
        self.vectors = Some(index);
        self
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    fn vector_index(&self) -> Result<&Arc<dyn VectorIndex>> {
        self.vectors.as_ref().ok_or_else(|| {
            GraphStoreError::VectorIndexUnavailable("no vector index configured".to_string())
                .into()
        })
    }

    /// Run a closure against the connection on the blocking pool
    async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.conn.clone();
        tokio::task::spawn_blocking(move || {
            let mut guard = conn
                .lock()
                .map_err(|e| anyhow!("Graph store lock poisoned: {}", e))?;
            f(&mut guard)
        })
        .await
        .context("Graph store task panicked")?
    }

    /// Write vectors for a new entity set after dropping the repository's old ones
    async fn replace_vectors(&self, repository_id: &str, entities: &[TypeEntity]) -> Result<usize> {
        let Some(index) = self.vectors.as_ref() else {
            return Ok(0);
        };

        let mut type_records = Vec::new();
        let mut method_records = Vec::new();
        for entity in entities {
            if let Some(vector) = &entity.embedding {
                type_records.push(VectorRecord {
                    id: entity.id.clone(),
                    repository_id: repository_id.to_string(),
                    vector: vector.clone(),
                });
            }
            for method in &entity.methods {
                if let Some(vector) = &method.embedding {
                    method_records.push(VectorRecord {
                        id: method.id.clone(),
                        repository_id: repository_id.to_string(),
                        vector: vector.clone(),
                    });
                }
            }
        }

        index
            .delete_repository(repository_id)
            .await
            .context("Failed to drop previous vectors")?;
        let mut stored = index
            .upsert(TYPE_INDEX, type_records)
            .await
            .context("Failed to store type vectors")?;
        stored += index
            .upsert(METHOD_INDEX, method_records)
            .await
            .context("Failed to store method vectors")?;
        Ok(stored)
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

fn conversion_error(idx: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, message.into())
}

fn entity_from_row(row: &Row<'_>) -> rusqlite::Result<EntityRecord> {
    let entity_type: String = row.get("entity_type")?;
    let entity_type = entity_type
        .parse::<EntityType>()
        .map_err(|e| conversion_error(1, e))?;
    Ok(EntityRecord {
        id: row.get("id")?,
        entity_type,
        repository_id: row.get("repository_id")?,
        name: row.get("name")?,
        fqn: row.get("fqn")?,
        file_path: row.get("file_path")?,
        detail: row.get("detail")?,
        description: row.get("description")?,
        source: row.get("source")?,
        start_line: row.get::<_, i64>("start_line")?.max(0) as usize,
        end_line: row.get::<_, i64>("end_line")?.max(0) as usize,
        owner_id: row.get("owner_id")?,
    })
}

fn repository_from_row(row: &Row<'_>) -> rusqlite::Result<RepositoryRecord> {
    let indexed_at: Option<String> = row.get("last_indexed_at")?;
    let last_indexed_at = match indexed_at {
        Some(ts) => Some(
            DateTime::parse_from_rfc3339(&ts)
                .map_err(|e| conversion_error(5, e.to_string()))?
                .with_timezone(&Utc),
        ),
        None => None,
    };
    Ok(RepositoryRecord {
        id: row.get("id")?,
        url: row.get("url")?,
        branch: row.get("branch")?,
        language: row.get("language")?,
        last_commit: row.get("last_commit")?,
        last_indexed_at,
    })
}

fn json_to_sql(value: &Value) -> SqlValue {
    match value {
        Value::Null => SqlValue::Null,
        Value::Bool(b) => SqlValue::Integer(i64::from(*b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => SqlValue::Integer(i),
            None => SqlValue::Real(n.as_f64().unwrap_or_default()),
        },
        Value::String(s) => SqlValue::Text(s.clone()),
        other => SqlValue::Text(other.to_string()),
    }
}

fn sql_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::String(format!("<{} bytes>", b.len())),
    }
}

fn to_json_list(items: &[String]) -> Result<String> {
    serde_json::to_string(items).context("Failed to encode list column")
}

/// Last segment of a possibly qualified name, without type arguments
pub(crate) fn simple_name(name: &str) -> &str {
    let base = name.split('<').next().unwrap_or(name).trim();
    base.rsplit('.').next().unwrap_or(base)
}

fn annotation_id(repository_id: &str, name: &str) -> String {
    format!("annotation:{}:{}", repository_id, name)
}

// ---------------------------------------------------------------------------
// Transaction helpers
// ---------------------------------------------------------------------------

fn upsert_repository_tx(conn: &Connection, record: &RepositoryRecord) -> Result<()> {
    conn.execute(
        "INSERT INTO repositories (id, url, branch, language, last_commit, last_indexed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(id) DO UPDATE SET
            url = excluded.url,
            branch = excluded.branch,
            language = excluded.language,
            last_commit = excluded.last_commit,
            last_indexed_at = excluded.last_indexed_at",
        params![
            record.id,
            record.url,
            record.branch,
            record.language,
            record.last_commit,
            record.last_indexed_at.map(|ts| ts.to_rfc3339()),
        ],
    )
    .map_err(|e| GraphStoreError::WriteFailed(format!("repository {}: {}", record.id, e)))?;
    Ok(())
}

fn annotate_tx(
    tx: &Transaction<'_>,
    repository_id: &str,
    entity_id: &str,
    annotations: &[String],
) -> Result<()> {
    for name in annotations {
        let id = annotation_id(repository_id, name);
        tx.execute(
            "INSERT OR IGNORE INTO annotations (id, repository_id, name) VALUES (?1, ?2, ?3)",
            params![id, repository_id, name],
        )?;
        relate_tx(tx, entity_id, &id, RelationshipType::AnnotatedBy, repository_id)?;
    }
    Ok(())
}

fn relate_tx(
    tx: &Transaction<'_>,
    source_id: &str,
    target_id: &str,
    rel_type: RelationshipType,
    repository_id: &str,
) -> Result<()> {
    tx.execute(
        "INSERT OR IGNORE INTO relationships (source_id, target_id, rel_type, repository_id)
         VALUES (?1, ?2, ?3, ?4)",
        params![source_id, target_id, rel_type.as_str(), repository_id],
    )?;
    Ok(())
}

fn insert_type_tx(tx: &Transaction<'_>, entity: &TypeEntity) -> Result<()> {
    let repo = entity.repository_id.as_str();
    tx.execute(
        "INSERT INTO types (id, repository_id, name, fqn, file_path, kind, annotations,
                            superclass, interfaces, description, source, start_line, end_line)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            entity.id,
            repo,
            entity.name,
            entity.fqn,
            entity.file_path,
            entity.kind.as_str(),
            to_json_list(&entity.annotations)?,
            entity.superclass,
            to_json_list(&entity.interfaces)?,
            entity.description,
            entity.source,
            entity.start_line as i64,
            entity.end_line as i64,
        ],
    )
    .with_context(|| format!("Failed to insert type {}", entity.fqn))?;
    annotate_tx(tx, repo, &entity.id, &entity.annotations)?;

    if let Some(superclass) = &entity.superclass {
        tx.execute(
            "INSERT OR IGNORE INTO type_supertypes (type_id, super_name, rel_type) VALUES (?1, ?2, ?3)",
            params![entity.id, simple_name(superclass), RelationshipType::Extends.as_str()],
        )?;
    }
    // Interfaces extend their super-interfaces; classes and enums implement them
    let interface_rel = if entity.kind == TypeKind::Interface {
        RelationshipType::Extends
    } else {
        RelationshipType::Implements
    };
    for interface in &entity.interfaces {
        tx.execute(
            "INSERT OR IGNORE INTO type_supertypes (type_id, super_name, rel_type) VALUES (?1, ?2, ?3)",
            params![entity.id, simple_name(interface), interface_rel.as_str()],
        )?;
    }

    for method in &entity.methods {
        let parameters = serde_json::to_string(&method.parameters)
            .context("Failed to encode parameters")?;
        tx.execute(
            "INSERT INTO methods (id, repository_id, type_id, name, fqn, file_path, signature,
                                  annotations, parameters, return_type, is_constructor,
                                  description, source, start_line, end_line)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                method.id,
                repo,
                entity.id,
                method.name,
                format!("{}.{}", entity.fqn, method.name),
                entity.file_path,
                method.signature,
                to_json_list(&method.annotations)?,
                parameters,
                method.return_type,
                method.is_constructor,
                method.description,
                method.source,
                method.start_line as i64,
                method.end_line as i64,
            ],
        )
        .with_context(|| format!("Failed to insert method {}.{}", entity.fqn, method.name))?;
        relate_tx(tx, &entity.id, &method.id, RelationshipType::Declares, repo)?;
        annotate_tx(tx, repo, &method.id, &method.annotations)?;

        for callee in &method.calls {
            tx.execute(
                "INSERT OR IGNORE INTO method_calls (method_id, callee_name) VALUES (?1, ?2)",
                params![method.id, callee],
            )?;
        }
    }

    for field in &entity.fields {
        tx.execute(
            "INSERT INTO fields (id, repository_id, type_id, name, fqn, file_path, field_type,
                                 annotations, start_line, end_line)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                field.id,
                repo,
                entity.id,
                field.name,
                format!("{}.{}", entity.fqn, field.name),
                entity.file_path,
                field.field_type,
                to_json_list(&field.annotations)?,
                field.start_line as i64,
                field.end_line as i64,
            ],
        )
        .with_context(|| format!("Failed to insert field {}.{}", entity.fqn, field.name))?;
        relate_tx(tx, &entity.id, &field.id, RelationshipType::Declares, repo)?;
        annotate_tx(tx, repo, &field.id, &field.annotations)?;
    }

    Ok(())
}

fn delete_entities_tx(tx: &Transaction<'_>, repository_id: &str) -> Result<()> {
    tx.execute(
        "DELETE FROM relationships WHERE repository_id = ?1",
        params![repository_id],
    )?;
    tx.execute(
        "DELETE FROM method_calls WHERE method_id IN (SELECT id FROM methods WHERE repository_id = ?1)",
        params![repository_id],
    )?;
    tx.execute(
        "DELETE FROM type_supertypes WHERE type_id IN (SELECT id FROM types WHERE repository_id = ?1)",
        params![repository_id],
    )?;
    tx.execute("DELETE FROM methods WHERE repository_id = ?1", params![repository_id])?;
    tx.execute("DELETE FROM fields WHERE repository_id = ?1", params![repository_id])?;
    tx.execute("DELETE FROM types WHERE repository_id = ?1", params![repository_id])?;
    tx.execute(
        "DELETE FROM annotations WHERE repository_id = ?1",
        params![repository_id],
    )?;
    Ok(())
}

fn link_inheritance_tx(tx: &Transaction<'_>, repository_id: &str) -> Result<usize> {
    tx.execute(
        "DELETE FROM relationships WHERE repository_id = ?1 AND rel_type IN ('EXTENDS', 'IMPLEMENTS')",
        params![repository_id],
    )?;
    let linked = tx.execute(
        "INSERT OR IGNORE INTO relationships (source_id, target_id, rel_type, repository_id)
         SELECT ts.type_id, target.id, ts.rel_type, ?1
           FROM type_supertypes ts
           JOIN types src ON src.id = ts.type_id
           JOIN types target ON target.repository_id = src.repository_id
                            AND target.name = ts.super_name
          WHERE src.repository_id = ?1 AND target.id <> src.id",
        params![repository_id],
    )?;
    Ok(linked)
}

fn link_calls_tx(tx: &Transaction<'_>, repository_id: &str) -> Result<usize> {
    tx.execute(
        "DELETE FROM relationships WHERE repository_id = ?1 AND rel_type = 'CALLS'",
        params![repository_id],
    )?;
    let linked = tx.execute(
        "INSERT OR IGNORE INTO relationships (source_id, target_id, rel_type, repository_id)
         SELECT mc.method_id, callee.id, 'CALLS', ?1
           FROM method_calls mc
           JOIN methods caller ON caller.id = mc.method_id
           JOIN methods callee ON callee.repository_id = caller.repository_id
                              AND callee.name = mc.callee_name
                              AND callee.is_constructor = 0
          WHERE caller.repository_id = ?1",
        params![repository_id],
    )?;
    Ok(linked)
}

fn count_entities_conn(conn: &Connection, repository_id: &str) -> Result<EntityCounts> {
    let count = |sql: &str| -> Result<usize> {
        let n: i64 = conn.query_row(sql, params![repository_id], |row| row.get(0))?;
        Ok(n.max(0) as usize)
    };
    Ok(EntityCounts {
        types: count("SELECT COUNT(*) FROM types WHERE repository_id = ?1")?,
        methods: count("SELECT COUNT(*) FROM methods WHERE repository_id = ?1")?,
        fields: count("SELECT COUNT(*) FROM fields WHERE repository_id = ?1")?,
        relationships: count("SELECT COUNT(*) FROM relationships WHERE repository_id = ?1")?,
    })
}

fn entities_by_ids(conn: &Connection, ids: &[String]) -> Result<HashMap<String, EntityRecord>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let placeholders = vec!["?"; ids.len()].join(", ");
    let sql = format!(
        "SELECT {} FROM entities WHERE id IN ({})",
        ENTITY_COLUMNS, placeholders
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(ids.iter()), entity_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows.into_iter().map(|e| (e.id.clone(), e)).collect())
}

fn annotation_names(conn: &Connection, ids: &[String]) -> Result<HashMap<String, String>> {
    if ids.is_empty() {
        return Ok(HashMap::new());
    }
    let placeholders = vec!["?"; ids.len()].join(", ");
    let sql = format!(
        "SELECT id, name FROM annotations WHERE id IN ({})",
        placeholders
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(ids.iter()), |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(rows.into_iter().collect())
}

/// Prepare a caller query, enforcing the read-only guard twice
fn prepare_read<'c>(conn: &'c Connection, sql: &str) -> Result<rusqlite::Statement<'c>> {
    query_guard::ensure_read_only(sql)?;
    let stmt = conn
        .prepare(sql)
        .map_err(|e| GraphStoreError::QueryFailed(e.to_string()))?;
    if !stmt.readonly() {
        return Err(GraphStoreError::UnsafeQuery("statement is not read-only".to_string()).into());
    }
    Ok(stmt)
}

#[async_trait::async_trait]
impl GraphStore for SqliteGraphStore {
    async fn upsert_repository(&self, record: &RepositoryRecord) -> Result<()> {
        let record = record.clone();
        self.with_conn(move |conn| upsert_repository_tx(conn, &record))
            .await
    }

    async fn get_repository(&self, id: &str) -> Result<Option<RepositoryRecord>> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let sql = format!("SELECT {} FROM repositories WHERE id = ?1", REPOSITORY_COLUMNS);
            Ok(conn
                .query_row(&sql, params![id], repository_from_row)
                .optional()?)
        })
        .await
    }

    async fn find_repository(&self, url: &str, branch: &str) -> Result<Option<RepositoryRecord>> {
        let (url, branch) = (url.to_string(), branch.to_string());
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {} FROM repositories WHERE url = ?1 AND branch = ?2",
                REPOSITORY_COLUMNS
            );
            Ok(conn
                .query_row(&sql, params![url, branch], repository_from_row)
                .optional()?)
        })
        .await
    }

    async fn list_repositories(&self) -> Result<Vec<RepositoryRecord>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {} FROM repositories ORDER BY url, branch",
                REPOSITORY_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([], repository_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
        .await
    }

    async fn delete_repository(&self, id: &str) -> Result<bool> {
        let repository_id = id.to_string();
        let existed = self
            .with_conn(move |conn| {
                let tx = conn.transaction()?;
                delete_entities_tx(&tx, &repository_id)?;
                let removed = tx.execute(
                    "DELETE FROM repositories WHERE id = ?1",
                    params![repository_id],
                )?;
                tx.commit()
                    .map_err(|e| GraphStoreError::WriteFailed(e.to_string()))?;
                Ok(removed > 0)
            })
            .await?;

        if let Some(index) = &self.vectors {
            index
                .delete_repository(id)
                .await
                .context("Failed to delete repository vectors")?;
        }

        tracing::info!("Deleted repository {} (existed: {})", id, existed);
        Ok(existed)
    }

    async fn store_type(&self, entity: &TypeEntity) -> Result<()> {
        let entity = entity.clone();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            insert_type_tx(&tx, &entity)?;
            link_calls_tx(&tx, &entity.repository_id)?;
            tx.commit()
                .map_err(|e| GraphStoreError::WriteFailed(e.to_string()))?;
            Ok(())
        })
        .await
    }

    async fn replace_repository_entities(
        &self,
        record: &RepositoryRecord,
        entities: &[TypeEntity],
    ) -> Result<EntityCounts> {
        if let Some(stray) = entities.iter().find(|e| e.repository_id != record.id) {
            anyhow::bail!(
                "Type {} belongs to repository {}, not {}",
                stray.fqn,
                stray.repository_id,
                record.id
            );
        }

        let vectors = self.replace_vectors(&record.id, entities).await?;

        let record = record.clone();
        let entities = entities.to_vec();
        let counts = self
            .with_conn(move |conn| {
                let tx = conn.transaction()?;
                upsert_repository_tx(&tx, &record)?;
                delete_entities_tx(&tx, &record.id)?;
                for entity in &entities {
                    insert_type_tx(&tx, entity)?;
                }
                let calls = link_calls_tx(&tx, &record.id)?;
                let inheritance = link_inheritance_tx(&tx, &record.id)?;
                let counts = count_entities_conn(&tx, &record.id)?;
                tx.commit()
                    .map_err(|e| GraphStoreError::WriteFailed(e.to_string()))?;
                tracing::debug!(
                    "Linked {} call edges and {} inheritance edges for {}",
                    calls,
                    inheritance,
                    record.id
                );
                Ok(counts)
            })
            .await?;

        tracing::info!(
            "Replaced entities: {} types, {} methods, {} fields, {} vectors",
            counts.types,
            counts.methods,
            counts.fields,
            vectors
        );
        Ok(counts)
    }

    async fn link_inheritance(&self, repository_id: &str) -> Result<usize> {
        let repository_id = repository_id.to_string();
        self.with_conn(move |conn| {
            let tx = conn.transaction()?;
            let linked = link_inheritance_tx(&tx, &repository_id)?;
            tx.commit()?;
            Ok(linked)
        })
        .await
    }

    async fn get_entity(&self, id: &str) -> Result<Option<EntityRecord>> {
        let id = id.to_string();
        self.with_conn(move |conn| {
            let sql = format!("SELECT {} FROM entities WHERE id = ?1", ENTITY_COLUMNS);
            Ok(conn.query_row(&sql, params![id], entity_from_row).optional()?)
        })
        .await
    }

    async fn list_entities(
        &self,
        repository_id: &str,
        entity_type: EntityType,
    ) -> Result<Vec<EntityRecord>> {
        let repository_id = repository_id.to_string();
        self.with_conn(move |conn| {
            let sql = format!(
                "SELECT {} FROM entities WHERE repository_id = ?1 AND entity_type = ?2 ORDER BY fqn",
                ENTITY_COLUMNS
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params![repository_id, entity_type.as_str()], entity_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
        .await
    }

    async fn count_entities(&self, repository_id: &str) -> Result<EntityCounts> {
        let repository_id = repository_id.to_string();
        self.with_conn(move |conn| count_entities_conn(conn, &repository_id))
            .await
    }

    async fn relationships(
        &self,
        id: &str,
        types: &[RelationshipType],
        direction: Direction,
    ) -> Result<Vec<RelatedEntity>> {
        let id = id.to_string();
        let wanted: HashSet<RelationshipType> = types.iter().copied().collect();

        self.with_conn(move |conn| {
            let mut edges: Vec<(Relationship, Direction)> = Vec::new();
            let mut collect = |sql: &str, dir: Direction| -> Result<()> {
                let mut stmt = conn.prepare(sql)?;
                let rows = stmt
                    .query_map(params![id], |row| {
                        Ok((
                            row.get::<_, String>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, String>(2)?,
                        ))
                    })?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                for (source_id, target_id, rel) in rows {
                    let rel_type = rel.parse::<RelationshipType>().map_err(|e| anyhow!(e))?;
                    if wanted.is_empty() || wanted.contains(&rel_type) {
                        edges.push((
                            Relationship {
                                source_id,
                                target_id,
                                rel_type,
                            },
                            dir,
                        ));
                    }
                }
                Ok(())
            };

            if matches!(direction, Direction::Outgoing | Direction::Both) {
                collect(
                    "SELECT source_id, target_id, rel_type FROM relationships WHERE source_id = ?1 ORDER BY rel_type, target_id",
                    Direction::Outgoing,
                )?;
            }
            if matches!(direction, Direction::Incoming | Direction::Both) {
                collect(
                    "SELECT source_id, target_id, rel_type FROM relationships WHERE target_id = ?1 ORDER BY rel_type, source_id",
                    Direction::Incoming,
                )?;
            }

            let other_ids: Vec<String> = edges
                .iter()
                .map(|(r, dir)| match dir {
                    Direction::Incoming => r.source_id.clone(),
                    _ => r.target_id.clone(),
                })
                .collect();
            let entities = entities_by_ids(conn, &other_ids)?;
            let annotations = annotation_names(conn, &other_ids)?;

            Ok(edges
                .into_iter()
                .zip(other_ids)
                .map(|((relationship, direction), other_id)| {
                    let entity = entities.get(&other_id).cloned();
                    let other_name = entity
                        .as_ref()
                        .map(|e| e.fqn.clone())
                        .or_else(|| annotations.get(&other_id).cloned())
                        .unwrap_or_else(|| other_id.clone());
                    RelatedEntity {
                        relationship,
                        direction,
                        other_id,
                        other_name,
                        entity,
                    }
                })
                .collect())
        })
        .await
    }

    async fn query_entities(&self, sql: &str, params: &[Value]) -> Result<Vec<EntityRecord>> {
        let sql = sql.to_string();
        let values: Vec<SqlValue> = params.iter().map(json_to_sql).collect();
        self.with_conn(move |conn| {
            let mut stmt = prepare_read(conn, &sql)?;
            let rows = stmt
                .query_map(params_from_iter(values.iter()), entity_from_row)
                .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
                .map_err(|e| GraphStoreError::QueryFailed(e.to_string()))?;
            Ok(rows)
        })
        .await
    }

    async fn query_rows(&self, sql: &str, params: &[Value]) -> Result<Vec<Map<String, Value>>> {
        let sql = sql.to_string();
        let values: Vec<SqlValue> = params.iter().map(json_to_sql).collect();
        self.with_conn(move |conn| {
            let mut stmt = prepare_read(conn, &sql)?;
            let columns: Vec<String> = stmt.column_names().iter().map(|c| c.to_string()).collect();
            let rows = stmt
                .query_map(params_from_iter(values.iter()), |row| {
                    let mut map = Map::new();
                    for (i, name) in columns.iter().enumerate() {
                        map.insert(name.clone(), sql_to_json(row.get_ref(i)?));
                    }
                    Ok(map)
                })
                .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
                .map_err(|e| GraphStoreError::QueryFailed(e.to_string()))?;
            Ok(rows)
        })
        .await
    }

    async fn execute_write(&self, sql: &str, params: &[Value]) -> Result<usize> {
        let table = query_guard::ensure_safe_write(sql)?;
        let sql = sql.to_string();
        let values: Vec<SqlValue> = params.iter().map(json_to_sql).collect();
        let affected = self
            .with_conn(move |conn| {
                Ok(conn
                    .execute(&sql, params_from_iter(values.iter()))
                    .map_err(|e| GraphStoreError::WriteFailed(e.to_string()))?)
            })
            .await?;
        tracing::debug!("Guarded write on '{}' affected {} rows", table, affected);
        Ok(affected)
    }

    async fn vector_search(
        &self,
        index_name: &str,
        vector: &[f32],
        limit: usize,
        repository_ids: &[String],
    ) -> Result<Vec<ScoredEntity>> {
        vector_index::ensure_known_index(index_name)?;
        let index = self.vector_index()?;
        let hits = index
            .search(index_name, vector, limit, repository_ids)
            .await
            .map_err(|e| GraphStoreError::VectorIndexUnavailable(format!("{:#}", e)))?;

        let ids: Vec<String> = hits.iter().map(|h| h.id.clone()).collect();
        let entities = self
            .with_conn(move |conn| entities_by_ids(conn, &ids))
            .await?;

        // Vectors whose entity is gone are skipped
        Ok(hits
            .into_iter()
            .filter_map(|hit| {
                entities.get(&hit.id).map(|entity| ScoredEntity {
                    entity: entity.clone(),
                    score: hit.score,
                })
            })
            .collect())
    }
}
