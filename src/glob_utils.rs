//! Glob pattern matching utilities for path filtering

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};

/// Compile glob patterns into a single set for efficient repeated matching
///
/// Invalid patterns are reported as errors rather than silently dropped.
pub fn compile_patterns(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob =
            Glob::new(pattern).with_context(|| format!("Invalid glob pattern '{}'", pattern))?;
        builder.add(glob);
    }
    builder.build().context("Failed to build glob set")
}

/// Check if a relative path matches the set
///
/// Paths are normalized to forward slashes and also matched by suffix, so
/// `test/**` matches `module/test/Foo.java`.
///
/// # Examples
///
/// ```
/// use repograph::glob_utils::{compile_patterns, matches_path};
///
/// let set = compile_patterns(&["**/src/test/**".to_string()]).unwrap();
/// assert!(matches_path("core/src/test/java/FooTest.java", &set));
/// assert!(!matches_path("core/src/main/java/Foo.java", &set));
/// ```
pub fn matches_path(path: &str, set: &GlobSet) -> bool {
    if set.is_empty() {
        return false;
    }

    let normalized = path.replace('\\', "/");
    let trimmed = normalized.trim_start_matches('/');
    if set.is_match(trimmed) {
        return true;
    }

    let parts: Vec<&str> = trimmed.split('/').collect();
    (1..parts.len()).any(|i| set.is_match(parts[i..].join("/")))
}
