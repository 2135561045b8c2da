//! # repograph - Repository indexing into a typed code graph
//!
//! Clones Java repositories, extracts their types, methods and fields with
//! tree-sitter, describes and embeds every type and method, and stores the
//! result as a graph of entities and relationships in SQLite with the
//! embeddings in a vector index beside it. Search combines structural,
//! semantic and hybrid retrieval over that graph.
//!
//! ## Key Features
//!
//! - **Freshness checks**: a branch is reindexed only when its head commit moved
//! - **Single-flight indexing**: concurrent requests for one branch share one run
//! - **Atomic reindex**: readers see the old entity set or the new one, never a mix
//! - **Description embeddings**: vectors are built from generated descriptions,
//!   not raw source, using FastEmbed locally
//! - **Hybrid search**: exact name matches first, fuzzy structural and semantic
//!   results only when there is none
//! - **Graceful degradation**: semantic search falls back to keyword search when
//!   the vector index is unavailable
//!
//! ## Architecture
//!
//! ```text
//!   RepoGraphClient
//!     ├── IndexingManager ── Workspace (git2) ── parser (tree-sitter)
//!     │        │                                     │
//!     │        └────────── EnrichmentPipeline ◄──────┘
//!     │                     (describer + embeddings)
//!     │                              │
//!     ├── SearchEngine ───► GraphStore (SQLite) ─── VectorIndex (LanceDB)
//! ```
//!
//! ## Usage Example
//!
//! ```no_run
//! use repograph::{RepoGraphClient, SearchOptions};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let client = RepoGraphClient::new().await?;
//!     client.ensure_indexed("https://github.com/acme/payments.git", "main").await?;
//!
//!     let results = client.search("who calls PaymentGateway", &SearchOptions::default()).await?;
//!     for result in results {
//!         println!("{:.2} {}", result.score, result.fully_qualified_name);
//!     }
//!     Ok(())
//! }
//! ```

/// Library facade wiring every component from configuration
pub mod client;

/// Configuration management with environment variable overrides
pub mod config;

/// Embedding generation using FastEmbed or feature hashing
pub mod embedding;

/// Entity descriptions and their embeddings
pub mod enrichment;

/// Error types and utilities
pub mod error;

/// Version control and scoped working copies
pub mod git;

/// Glob pattern helpers for file discovery
pub mod glob_utils;

/// Typed entity graph persisted in SQLite
pub mod graph;

/// Freshness checks and single-flight indexing runs
pub mod indexing;

/// Java source discovery and parsing
pub mod parser;

/// Platform-specific default paths
pub mod paths;

/// Structural, semantic, keyword and hybrid search
pub mod search;

/// Request and response types shared by the client and the CLI
pub mod types;

/// Embedding indexes backing semantic search
pub mod vector_index;

pub use client::RepoGraphClient;
pub use config::Config;
pub use error::RepoGraphError;
pub use graph::{Direction, EntityType, RelationshipType};
pub use types::{
    DependencyTree, IndexOutcome, IndexState, IndexStatus, RelationshipPath, SearchMode,
    SearchOptions, SearchResult,
};
