//! SQLite schema for the code graph.
//!
//! Statements use `IF NOT EXISTS` so they are safe to replay on an
//! already-initialised database.

use rusqlite::Connection;

/// Bumped whenever a table or view changes shape
pub const SCHEMA_VERSION: i32 = 1;

/// Tables a caller may target through the guarded write API
pub const WRITABLE_TABLES: &[&str] = &[
    "repositories",
    "types",
    "methods",
    "fields",
    "annotations",
    "relationships",
    "method_calls",
    "type_supertypes",
];

pub const SCHEMA_STATEMENTS: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS repositories (
        id TEXT PRIMARY KEY,
        url TEXT NOT NULL,
        branch TEXT NOT NULL,
        language TEXT NOT NULL,
        last_commit TEXT,
        last_indexed_at TEXT,
        UNIQUE(url, branch)
    );",
    "CREATE TABLE IF NOT EXISTS types (
        id TEXT PRIMARY KEY,
        repository_id TEXT NOT NULL REFERENCES repositories(id) ON DELETE CASCADE,
        name TEXT NOT NULL,
        fqn TEXT NOT NULL,
        file_path TEXT NOT NULL,
        kind TEXT NOT NULL,
        annotations TEXT NOT NULL DEFAULT '[]',
        superclass TEXT,
        interfaces TEXT NOT NULL DEFAULT '[]',
        description TEXT NOT NULL DEFAULT '',
        source TEXT NOT NULL DEFAULT '',
        start_line INTEGER NOT NULL,
        end_line INTEGER NOT NULL
    );",
    "CREATE TABLE IF NOT EXISTS methods (
        id TEXT PRIMARY KEY,
        repository_id TEXT NOT NULL REFERENCES repositories(id) ON DELETE CASCADE,
        type_id TEXT NOT NULL REFERENCES types(id) ON DELETE CASCADE,
        name TEXT NOT NULL,
        fqn TEXT NOT NULL,
        file_path TEXT NOT NULL,
        signature TEXT NOT NULL,
        annotations TEXT NOT NULL DEFAULT '[]',
        parameters TEXT NOT NULL DEFAULT '[]',
        return_type TEXT,
        is_constructor INTEGER NOT NULL DEFAULT 0,
        description TEXT NOT NULL DEFAULT '',
        source TEXT NOT NULL DEFAULT '',
        start_line INTEGER NOT NULL,
        end_line INTEGER NOT NULL
    );",
    "CREATE TABLE IF NOT EXISTS fields (
        id TEXT PRIMARY KEY,
        repository_id TEXT NOT NULL REFERENCES repositories(id) ON DELETE CASCADE,
        type_id TEXT NOT NULL REFERENCES types(id) ON DELETE CASCADE,
        name TEXT NOT NULL,
        fqn TEXT NOT NULL,
        file_path TEXT NOT NULL,
        field_type TEXT NOT NULL,
        annotations TEXT NOT NULL DEFAULT '[]',
        start_line INTEGER NOT NULL,
        end_line INTEGER NOT NULL
    );",
    "CREATE TABLE IF NOT EXISTS annotations (
        id TEXT PRIMARY KEY,
        repository_id TEXT NOT NULL REFERENCES repositories(id) ON DELETE CASCADE,
        name TEXT NOT NULL,
        UNIQUE(repository_id, name)
    );",
    "CREATE TABLE IF NOT EXISTS method_calls (
        method_id TEXT NOT NULL REFERENCES methods(id) ON DELETE CASCADE,
        callee_name TEXT NOT NULL,
        PRIMARY KEY(method_id, callee_name)
    );",
    "CREATE TABLE IF NOT EXISTS type_supertypes (
        type_id TEXT NOT NULL REFERENCES types(id) ON DELETE CASCADE,
        super_name TEXT NOT NULL,
        rel_type TEXT NOT NULL,
        PRIMARY KEY(type_id, super_name, rel_type)
    );",
    "CREATE TABLE IF NOT EXISTS relationships (
        source_id TEXT NOT NULL,
        target_id TEXT NOT NULL,
        rel_type TEXT NOT NULL,
        repository_id TEXT NOT NULL REFERENCES repositories(id) ON DELETE CASCADE,
        PRIMARY KEY(source_id, target_id, rel_type)
    );",
    "CREATE INDEX IF NOT EXISTS idx_types_repo ON types(repository_id);",
    "CREATE INDEX IF NOT EXISTS idx_types_name ON types(name COLLATE NOCASE);",
    "CREATE INDEX IF NOT EXISTS idx_methods_repo ON methods(repository_id);",
    "CREATE INDEX IF NOT EXISTS idx_methods_type ON methods(type_id);",
    "CREATE INDEX IF NOT EXISTS idx_methods_name ON methods(name COLLATE NOCASE);",
    "CREATE INDEX IF NOT EXISTS idx_fields_repo ON fields(repository_id);",
    "CREATE INDEX IF NOT EXISTS idx_fields_type ON fields(type_id);",
    "CREATE INDEX IF NOT EXISTS idx_rel_source ON relationships(source_id, rel_type);",
    "CREATE INDEX IF NOT EXISTS idx_rel_target ON relationships(target_id, rel_type);",
    "CREATE INDEX IF NOT EXISTS idx_rel_repo ON relationships(repository_id);",
    // Uniform read view over all three entity tables. `detail` carries the
    // type kind, method signature or field type.
    "CREATE VIEW IF NOT EXISTS entities AS
        SELECT id, 'TYPE' AS entity_type, repository_id, name, fqn, file_path,
               kind AS detail, description, source, start_line, end_line,
               NULL AS owner_id
          FROM types
        UNION ALL
        SELECT id, 'METHOD', repository_id, name, fqn, file_path,
               signature, description, source, start_line, end_line, type_id
          FROM methods
        UNION ALL
        SELECT id, 'FIELD', repository_id, name, fqn, file_path,
               field_type, NULL, NULL, start_line, end_line, type_id
          FROM fields;",
];

/// Apply pragmas and create every table, index and view
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    // In-memory databases report "memory" here; ignore the returned mode.
    let _: String = conn.query_row("PRAGMA journal_mode = WAL;", [], |row| row.get(0))?;

    for stmt in SCHEMA_STATEMENTS {
        conn.execute_batch(stmt)?;
    }

    let version: i32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if version < SCHEMA_VERSION {
        tracing::info!(
            "Upgrading graph schema from version {} to {}",
            version,
            SCHEMA_VERSION
        );
        conn.execute_batch(&format!("PRAGMA user_version = {};", SCHEMA_VERSION))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();

        let version: i32 = conn
            .query_row("PRAGMA user_version;", [], |row| row.get(0))
            .unwrap();
        assert_eq!(version, SCHEMA_VERSION);
    }

    #[test]
    fn test_entities_view_exists() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM entities", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn test_writable_tables_exist() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        for table in WRITABLE_TABLES {
            let found: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = ?1",
                    [table],
                    |row| row.get(0),
                )
                .unwrap();
            assert_eq!(found, 1, "missing table {}", table);
        }
    }
}
