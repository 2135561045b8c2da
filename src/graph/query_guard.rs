//! Guardrails for caller-supplied SQL.
//!
//! Reads must be a single `SELECT`/`WITH` statement with no mutating keyword
//! outside string literals. Writes are limited to a single `INSERT INTO` or
//! `UPDATE ... WHERE` against one of the graph's own tables.

use crate::error::GraphStoreError;
use crate::graph::schema::WRITABLE_TABLES;

/// Keywords that may never appear in a read query
const MUTATING_KEYWORDS: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "DROP", "ALTER", "CREATE", "REPLACE", "ATTACH", "DETACH",
    "PRAGMA", "VACUUM", "REINDEX", "TRUNCATE", "UPSERT",
];

/// Keywords that may never appear in a guarded write
const DESTRUCTIVE_KEYWORDS: &[&str] = &[
    "DELETE", "DROP", "ALTER", "CREATE", "REPLACE", "ATTACH", "DETACH", "PRAGMA", "VACUUM",
    "REINDEX", "TRUNCATE",
];

/// Longest query text accepted
pub const MAX_QUERY_LENGTH: usize = 8192;

fn unsafe_query(reason: impl Into<String>) -> GraphStoreError {
    GraphStoreError::UnsafeQuery(reason.into())
}

/// Replace string literals, quoted identifiers and comments with spaces so
/// keyword scanning only sees executable SQL.
fn strip_literals(sql: &str) -> String {
    let chars: Vec<char> = sql.chars().collect();
    let mut out = String::with_capacity(sql.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\'' | '"' | '`' => {
                let quote = c;
                i += 1;
                while i < chars.len() {
                    if chars[i] == quote {
                        // doubled quote is an escape
                        if i + 1 < chars.len() && chars[i + 1] == quote {
                            i += 2;
                            continue;
                        }
                        break;
                    }
                    i += 1;
                }
                i += 1;
                out.push(' ');
            }
            '-' if chars.get(i + 1) == Some(&'-') => {
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
                out.push(' ');
            }
            '/' if chars.get(i + 1) == Some(&'*') => {
                i += 2;
                while i + 1 < chars.len() && !(chars[i] == '*' && chars[i + 1] == '/') {
                    i += 1;
                }
                i += 2;
                out.push(' ');
            }
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }
    out
}

fn keywords(stripped: &str) -> Vec<String> {
    stripped
        .split(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .filter(|w| !w.is_empty())
        .map(|w| w.to_ascii_uppercase())
        .collect()
}

/// Reject empty, oversized, or multi-statement text; return the stripped form
fn check_shape(sql: &str) -> Result<String, GraphStoreError> {
    if sql.trim().is_empty() {
        return Err(unsafe_query("empty query"));
    }
    if sql.len() > MAX_QUERY_LENGTH {
        return Err(unsafe_query(format!(
            "query exceeds {} characters",
            MAX_QUERY_LENGTH
        )));
    }

    let stripped = strip_literals(sql);
    let body = stripped.trim().trim_end_matches(';');
    if body.contains(';') {
        return Err(unsafe_query("multiple statements are not allowed"));
    }
    Ok(body.to_string())
}

/// Validate a read-only structural query
pub fn ensure_read_only(sql: &str) -> Result<(), GraphStoreError> {
    let body = check_shape(sql)?;
    let words = keywords(&body);

    match words.first().map(String::as_str) {
        Some("SELECT") | Some("WITH") => {}
        _ => return Err(unsafe_query("read queries must start with SELECT or WITH")),
    }

    if let Some(word) = words
        .iter()
        .find(|w| MUTATING_KEYWORDS.contains(&w.as_str()))
    {
        return Err(unsafe_query(format!(
            "keyword {} is not allowed in a read query",
            word
        )));
    }
    Ok(())
}

/// Validate a caller write against the allowed operation set
///
/// Returns the target table name.
pub fn ensure_safe_write(sql: &str) -> Result<String, GraphStoreError> {
    let body = check_shape(sql)?;
    let words = keywords(&body);

    if let Some(word) = words
        .iter()
        .find(|w| DESTRUCTIVE_KEYWORDS.contains(&w.as_str()))
    {
        return Err(unsafe_query(format!("keyword {} is not allowed", word)));
    }

    let table = match words.as_slice() {
        [first, into, table, ..] if first == "INSERT" && into == "INTO" => table.clone(),
        [first, table, ..] if first == "UPDATE" => {
            if !words.iter().any(|w| w == "WHERE") {
                return Err(unsafe_query("UPDATE without WHERE is not allowed"));
            }
            table.clone()
        }
        _ => {
            return Err(unsafe_query(
                "only INSERT INTO and UPDATE statements are allowed",
            ));
        }
    };

    let table = table.to_ascii_lowercase();
    if !WRITABLE_TABLES.contains(&table.as_str()) {
        return Err(unsafe_query(format!("table '{}' is not writable", table)));
    }

    // A second INSERT/UPDATE keyword would mean a trigger body or subquery write
    let verbs = words
        .iter()
        .filter(|w| w.as_str() == "INSERT" || w.as_str() == "UPDATE")
        .count();
    if verbs > 1 {
        return Err(unsafe_query("nested write statements are not allowed"));
    }

    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_select_allowed() {
        assert!(ensure_read_only("SELECT * FROM entities WHERE name = ?1").is_ok());
        assert!(ensure_read_only("  select id from types;  ").is_ok());
        assert!(ensure_read_only("WITH t AS (SELECT id FROM types) SELECT * FROM t").is_ok());
    }

    #[test]
    fn test_keywords_inside_literals_ignored() {
        assert!(ensure_read_only("SELECT * FROM entities WHERE description LIKE '%delete%'").is_ok());
        assert!(ensure_read_only("SELECT 'DROP TABLE x' AS s").is_ok());
        assert!(ensure_read_only("SELECT * FROM types -- DELETE everything\n").is_ok());
    }

    #[test]
    fn test_mutations_rejected_in_read() {
        for sql in [
            "DELETE FROM types",
            "DROP TABLE types",
            "UPDATE types SET name = 'x'",
            "SELECT * FROM types; DELETE FROM types",
            "PRAGMA writable_schema = 1",
            "",
        ] {
            assert!(ensure_read_only(sql).is_err(), "accepted: {}", sql);
        }
    }

    #[test]
    fn test_read_keyword_reported() {
        let err = ensure_read_only("SELECT * FROM types WHERE id IN (DELETE FROM x)").unwrap_err();
        assert!(err.to_string().contains("DELETE"));
    }

    #[test]
    fn test_safe_insert_and_update() {
        assert_eq!(
            ensure_safe_write("INSERT INTO relationships (source_id, target_id, rel_type, repository_id) VALUES (?1, ?2, ?3, ?4)").unwrap(),
            "relationships"
        );
        assert_eq!(
            ensure_safe_write("UPDATE types SET description = ?1 WHERE id = ?2").unwrap(),
            "types"
        );
    }

    #[test]
    fn test_destructive_writes_rejected() {
        for sql in [
            "DELETE FROM types WHERE id = 'x'",
            "DROP TABLE repositories",
            "UPDATE types SET description = ''",
            "INSERT OR REPLACE INTO types (id) VALUES ('x')",
            "INSERT INTO sqlite_master VALUES (1)",
            "UPDATE types SET name = 'a' WHERE id = 'b'; DROP TABLE types",
            "SELECT * FROM types",
        ] {
            let err = ensure_safe_write(sql).unwrap_err();
            assert!(matches!(err, GraphStoreError::UnsafeQuery(_)), "{}", sql);
        }
    }

    #[test]
    fn test_strip_literals_handles_escaped_quotes() {
        let stripped = strip_literals("SELECT 'it''s DELETE' FROM t");
        assert!(!stripped.contains("DELETE"));
        assert!(stripped.contains("FROM t"));
    }
}
