//! Source file discovery for a checked-out working copy

use crate::glob_utils;
use anyhow::{Context, Result};
use globset::GlobSet;
use ignore::WalkBuilder;
use std::fs;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;

/// Extension of the files the parser understands
pub const SOURCE_EXTENSION: &str = "java";

/// A discovered source file with its content
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    /// Path relative to the walk root, always with forward slashes
    pub relative_path: String,
    pub content: String,
}

impl SourceFile {
    /// Build a file from in-memory content (used by tests and benchmarks)
    pub fn from_content(relative_path: impl Into<String>, content: impl Into<String>) -> Self {
        let relative_path = relative_path.into();
        Self {
            path: PathBuf::from(&relative_path),
            relative_path,
            content: content.into(),
        }
    }
}

pub struct FileWalker {
    pub(crate) root: PathBuf,
    pub(crate) max_file_size: usize,
    pub(crate) exclude_patterns: Vec<String>,
    cancellation: Option<CancellationToken>,
}

impl FileWalker {
    pub fn new(root: impl AsRef<Path>, max_file_size: usize) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            max_file_size,
            exclude_patterns: vec![],
            cancellation: None,
        }
    }

    pub fn with_exclude_patterns(mut self, exclude_patterns: Vec<String>) -> Self {
        self.exclude_patterns = exclude_patterns;
        self
    }

    /// Stop the walk early once the token is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = Some(token);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(|token| token.is_cancelled())
    }

    /// Walk the directory and collect every source file outside excluded directories
    pub fn walk(&self) -> Result<Vec<SourceFile>> {
        if !self.root.exists() {
            anyhow::bail!("Root directory does not exist: {:?}", self.root);
        }
        if !self.root.is_dir() {
            anyhow::bail!("Root path is not a directory: {:?}", self.root);
        }

        let excludes = glob_utils::compile_patterns(&self.exclude_patterns)
            .context("Invalid exclude pattern")?;
        let mut files = Vec::new();

        let walker = WalkBuilder::new(&self.root)
            .standard_filters(true)
            .hidden(false)
            .require_git(false)
            .build();

        for entry in walker {
            if self.is_cancelled() {
                tracing::info!("File walk cancelled after {} files", files.len());
                return Err(crate::error::IndexingError::Cancelled.into());
            }

            let entry = entry.context("Failed to read directory entry")?;
            let path = entry.path();

            if path.is_dir() {
                continue;
            }
            if path.components().any(|c| c.as_os_str() == ".git") {
                continue;
            }
            if path.extension().and_then(|e| e.to_str()) != Some(SOURCE_EXTENSION) {
                continue;
            }

            let relative_path = self.relative_path(path);
            if self.is_excluded(&relative_path, &excludes) {
                tracing::debug!("Skipping excluded file: {}", relative_path);
                continue;
            }

            if let Ok(metadata) = fs::metadata(path)
                && metadata.len() > self.max_file_size as u64
            {
                tracing::debug!("Skipping large file: {}", relative_path);
                continue;
            }

            let bytes = match fs::read(path) {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::warn!("Skipping unreadable file {}: {}", relative_path, e);
                    continue;
                }
            };
            let content = match String::from_utf8(bytes) {
                Ok(content) => content,
                Err(e) => {
                    // Legacy encodings keep their ASCII identifiers intact
                    tracing::debug!("Decoding {} lossily: {}", relative_path, e.utf8_error());
                    String::from_utf8_lossy(e.as_bytes()).into_owned()
                }
            };

            files.push(SourceFile {
                path: path.to_path_buf(),
                relative_path,
                content,
            });
        }

        files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
        tracing::info!("Found {} source files under {:?}", files.len(), self.root);
        Ok(files)
    }

    pub(crate) fn relative_path(&self, path: &Path) -> String {
        path.strip_prefix(&self.root)
            .unwrap_or(path)
            .to_string_lossy()
            .replace('\\', "/")
    }

    pub(crate) fn is_excluded(&self, relative_path: &str, excludes: &GlobSet) -> bool {
        glob_utils::matches_path(relative_path, excludes)
    }
}

/// Discover all source files under `root`, skipping test directories
pub fn discover_source_files(
    root: &Path,
    exclude_patterns: &[String],
    max_file_size: usize,
) -> Result<Vec<SourceFile>> {
    FileWalker::new(root, max_file_size)
        .with_exclude_patterns(exclude_patterns.to_vec())
        .walk()
}
