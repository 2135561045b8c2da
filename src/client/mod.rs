//! Core library client for repograph
//!
//! Wires the graph store, vector index, embedding model, version-control
//! client, indexing manager and search engine together from a [`Config`].

use crate::config::Config;
use crate::embedding::{EmbeddingProvider, create_embedding_provider};
use crate::enrichment::{EnrichmentPipeline, TemplateDescriber};
use crate::git::{Git2Client, VersionControl};
use crate::graph::{Direction, GraphStore, RepositoryRecord, SqliteGraphStore};
use crate::indexing::{IndexingManager, RunContext};
use crate::search::SearchEngine;
use crate::types::*;
use crate::vector_index::create_vector_index;

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

/// Main client for indexing repositories and searching them
///
/// # Example
///
/// ```no_run
/// use repograph::{RepoGraphClient, SearchOptions};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let client = RepoGraphClient::new().await?;
///
///     let outcome = client
///         .ensure_indexed("https://github.com/acme/payments.git", "main")
///         .await?;
///     println!("{} is {}", outcome.repository_id, outcome.state);
///
///     let options = SearchOptions::default().in_repository(outcome.repository_id);
///     for hit in client.search("PaymentService", &options).await? {
///         println!("{:.2} {}", hit.score, hit.fully_qualified_name);
///     }
///     Ok(())
/// }
/// ```
#[derive(Clone)]
pub struct RepoGraphClient {
    config: Arc<Config>,
    store: Arc<dyn GraphStore>,
    manager: Arc<IndexingManager>,
    search: Arc<SearchEngine>,
}

impl RepoGraphClient {
    /// Create a client from the default configuration file and environment
    pub async fn new() -> Result<Self> {
        let config = Config::new().context("Failed to load configuration")?;
        Self::with_config(config).await
    }

    /// Create a client with custom configuration
    ///
    /// Opens the SQLite graph database and the configured vector index, and
    /// loads the embedding model.
    pub async fn with_config(config: Config) -> Result<Self> {
        config.validate()?;
        tracing::info!("Initializing repograph client");
        tracing::debug!("Graph database: {}", config.graph_store.db_path.display());
        tracing::debug!("Vector index backend: {}", config.vector_index.backend);
        tracing::debug!(
            "Embedding provider: {} ({})",
            config.embedding.provider,
            config.embedding.model_name
        );

        let embedding_config = config.embedding.clone();
        let embedder = tokio::task::spawn_blocking(move || {
            create_embedding_provider(&embedding_config)
        })
        .await
        .context("Embedding model loader panicked")?
        .context("Failed to initialize embedding provider")?;

        let vectors = create_vector_index(&config.vector_index).await?;
        vectors
            .initialize(embedder.dimension())
            .await
            .context("Failed to initialize vector index")?;

        let store = SqliteGraphStore::open(&config.graph_store.db_path)
            .context("Failed to open graph database")?
            .with_vector_index(vectors);

        Ok(Self::with_components(
            config,
            Arc::new(store),
            embedder,
            Arc::new(Git2Client::new()),
        ))
    }

    /// Assemble a client from already constructed collaborators
    pub fn with_components(
        config: Config,
        store: Arc<dyn GraphStore>,
        embedder: Arc<dyn EmbeddingProvider>,
        vcs: Arc<dyn VersionControl>,
    ) -> Self {
        let pipeline = Arc::new(EnrichmentPipeline::new(
            Arc::new(TemplateDescriber),
            embedder,
            config.embedding.batch_size,
            Duration::from_secs(config.embedding.timeout_secs),
        ));

        let manager = IndexingManager::new(RunContext {
            store: store.clone(),
            vcs,
            pipeline: pipeline.clone(),
            config: config.indexing.clone(),
        });
        let search = SearchEngine::new(store.clone(), pipeline, config.search.clone());

        Self {
            config: Arc::new(config),
            store,
            manager: Arc::new(manager),
            search: Arc::new(search),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn GraphStore> {
        &self.store
    }

    pub fn indexing(&self) -> &IndexingManager {
        &self.manager
    }

    pub fn search_engine(&self) -> &SearchEngine {
        &self.search
    }

    /// Index a branch if it is new or outdated; see [`IndexingManager::ensure_indexed`]
    pub async fn ensure_indexed(&self, url: &str, branch: &str) -> Result<IndexOutcome> {
        self.manager.ensure_indexed(url, branch).await
    }

    pub async fn check_index_status(&self, url: &str, branch: &str) -> Result<IndexStatus> {
        self.manager.check_index_status(url, branch).await
    }

    pub async fn remove_repository(&self, url: &str, branch: &str) -> Result<bool> {
        self.manager.remove_repository(url, branch).await
    }

    pub async fn list_repositories(&self) -> Result<Vec<RepositoryRecord>> {
        self.manager.list_repositories().await
    }

    pub async fn repository_stats(&self, repository_id: &str) -> Result<RepositoryStats> {
        self.manager.repository_stats(repository_id).await
    }

    pub async fn search(&self, query: &str, options: &SearchOptions) -> Result<Vec<SearchResult>> {
        self.search.search(query, options).await
    }

    pub async fn find_dependencies(
        &self,
        entity_id: &str,
        depth: usize,
        direction: Direction,
    ) -> Result<DependencyTree> {
        self.search
            .find_dependencies(entity_id, depth, direction)
            .await
    }

    pub async fn explain_relationship(&self, from_id: &str, to_id: &str) -> Result<RelationshipPath> {
        self.search.explain_relationship(from_id, to_id).await
    }

    /// Cancel in-flight indexing runs and wait for them to finish
    pub async fn shutdown(&self) {
        self.manager.shutdown().await;
    }
}
