//! Source discovery and parsing into type entities

pub mod file_walker;
pub mod java;

pub use file_walker::{FileWalker, SourceFile, discover_source_files};
pub use java::JavaParser;

use crate::error::ParseError;
use crate::graph::model::TypeEntity;
use crate::types::ParseFailure;
use rayon::prelude::*;

/// Outcome of parsing a set of files
#[derive(Debug, Default)]
pub struct ParseBatch {
    pub entities: Vec<TypeEntity>,
    /// Files that parsed cleanly but declare no type
    pub skipped: Vec<String>,
    pub failures: Vec<ParseFailure>,
}

impl ParseBatch {
    pub fn parsed_count(&self) -> usize {
        self.entities.len()
    }
}

/// Parse a single file with a fresh parser
pub fn parse_file(file: &SourceFile, repository_id: &str) -> Result<Option<TypeEntity>, ParseError> {
    JavaParser::new()?.parse(&file.relative_path, &file.content, repository_id)
}

/// Parse files in parallel; a failing file never aborts the batch.
///
/// Results keep the order of `files`.
pub fn parse_batch(files: &[SourceFile], repository_id: &str) -> ParseBatch {
    let results: Vec<(String, Result<Option<TypeEntity>, ParseError>)> = files
        .par_iter()
        .map_init(JavaParser::new, |parser, file| {
            let result = match parser {
                Ok(parser) => parser.parse(&file.relative_path, &file.content, repository_id),
                Err(e) => Err(e.clone()),
            };
            (file.relative_path.clone(), result)
        })
        .collect();

    let mut batch = ParseBatch::default();
    for (file, result) in results {
        match result {
            Ok(Some(entity)) => batch.entities.push(entity),
            Ok(None) => batch.skipped.push(file),
            Err(e) => {
                tracing::warn!("Failed to parse {}: {}", file, e);
                batch.failures.push(ParseFailure {
                    file,
                    error: e.to_string(),
                });
            }
        }
    }

    tracing::info!(
        "Parsed {} files: {} types, {} skipped, {} failed",
        files.len(),
        batch.entities.len(),
        batch.skipped.len(),
        batch.failures.len()
    );
    batch
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_batch_collects_failures() {
        let files = vec![
            SourceFile::from_content("a/Good.java", "package a; public class Good { void run() {} }"),
            SourceFile::from_content("a/Broken.java", "package a; class Broken { void run( }"),
            SourceFile::from_content("a/package-info.java", "package a;"),
            SourceFile::from_content("a/Other.java", "package a; interface Other {}"),
        ];

        let batch = parse_batch(&files, "repo");
        let names: Vec<_> = batch.entities.iter().map(|e| e.fqn.as_str()).collect();
        assert_eq!(names, vec!["a.Good", "a.Other"]);
        assert_eq!(batch.skipped, vec!["a/package-info.java"]);
        assert_eq!(batch.failures.len(), 1);
        assert_eq!(batch.failures[0].file, "a/Broken.java");
        assert!(batch.failures[0].error.contains("Syntax error"));
        assert_eq!(batch.parsed_count(), 2);
    }

    #[test]
    fn test_parse_batch_empty() {
        let batch = parse_batch(&[], "repo");
        assert!(batch.entities.is_empty());
        assert!(batch.failures.is_empty());
    }

    #[test]
    fn test_parse_file() {
        let file = SourceFile::from_content("Foo.java", "class Foo { int x; }");
        let entity = parse_file(&file, "repo").unwrap().unwrap();
        assert_eq!(entity.name, "Foo");
        assert_eq!(entity.fields.len(), 1);
    }
}
