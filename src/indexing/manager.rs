use super::index_lock::{IndexLockResult, IndexLocks, wait_for_result};
use super::run::{self, RunContext};
use super::url::RepoKey;
use crate::error::{GraphStoreError, IndexingError, ValidationError};
use crate::graph::RepositoryRecord;
use crate::types::{IndexOutcome, IndexState, IndexStatus, RepositoryStats};
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;

/// Decides whether a repository needs indexing and runs at most one
/// indexing operation per (URL, branch) at a time.
pub struct IndexingManager {
    ctx: RunContext,
    locks: IndexLocks,
    /// Error of the last run per key, cleared by the next successful run
    failures: Arc<RwLock<HashMap<RepoKey, String>>>,
    shutdown: CancellationToken,
    run_timeout: Duration,
}

impl IndexingManager {
    pub fn new(ctx: RunContext) -> Self {
        let run_timeout = Duration::from_secs(ctx.config.run_timeout_secs);
        Self {
            ctx,
            locks: IndexLocks::default(),
            failures: Arc::new(RwLock::new(HashMap::new())),
            shutdown: CancellationToken::new(),
            run_timeout,
        }
    }

    /// Override the per-run deadline
    pub fn with_run_timeout(mut self, run_timeout: Duration) -> Self {
        self.run_timeout = run_timeout;
        self
    }

    /// Make sure the branch is indexed at its current commit.
    ///
    /// Concurrent calls for the same key share one run and all receive its
    /// outcome. A failed run is reported through the outcome's state and
    /// errors; the next call retries it.
    pub async fn ensure_indexed(&self, url: &str, branch: &str) -> Result<IndexOutcome> {
        let key = RepoKey::new(url, branch)?;

        let rx = match self.locks.acquire(&key).await {
            IndexLockResult::WaitForResult(rx) => {
                tracing::info!("Indexing of {} already in progress, waiting", key);
                rx
            }
            IndexLockResult::Acquired(guard) => {
                let rx = guard.subscribe();
                let ctx = self.ctx.clone();
                let failures = self.failures.clone();
                let cancel = self.shutdown.child_token();
                let run_timeout = self.run_timeout;
                let clone_url = url.trim().to_string();

                // The run outlives any single caller so waiters always get a result
                tokio::spawn(async move {
                    let started = Instant::now();
                    let mut outcome = run::empty_outcome(String::new());

                    let result = tokio::time::timeout(
                        run_timeout,
                        run::execute(&ctx, &key, &clone_url, &cancel, &mut outcome),
                    )
                    .await;

                    match result {
                        Ok(Ok(())) => {
                            failures.write().await.remove(&key);
                        }
                        Ok(Err(e)) => {
                            run::fail(&mut outcome, format!("{:#}", e), started);
                            failures.write().await.insert(key.clone(), format!("{:#}", e));
                        }
                        Err(_) => {
                            cancel.cancel();
                            let e = IndexingError::Timeout(run_timeout.as_secs());
                            run::fail(&mut outcome, e.to_string(), started);
                            failures.write().await.insert(key.clone(), e.to_string());
                        }
                    }
                    guard.complete(outcome).await;
                });
                rx
            }
        };

        Ok(wait_for_result(rx).await?)
    }

    /// Report the state of a key without doing any indexing work
    pub async fn check_index_status(&self, url: &str, branch: &str) -> Result<IndexStatus> {
        let key = RepoKey::new(url, branch)?;
        let record = self.ctx.store.find_repository(&key.url, &key.branch).await?;
        let repository_id = record.as_ref().map(|r| r.id.clone());
        let stored_commit = record.as_ref().and_then(|r| r.last_commit.clone());

        if self.locks.is_in_flight(&key).await {
            return Ok(IndexStatus {
                state: IndexState::Indexing,
                repository_id,
                stored_commit,
                current_commit: None,
            });
        }

        let vcs = self.ctx.vcs.clone();
        let remote_url = url.trim().to_string();
        let remote_branch = key.branch.clone();
        let current = tokio::task::spawn_blocking(move || {
            vcs.remote_commit_hash(&remote_url, &remote_branch)
        })
        .await
        .context("Commit lookup task panicked")?;

        let failed = self.failures.read().await.contains_key(&key);
        let state = if failed {
            IndexState::Failed
        } else if record.is_none() {
            IndexState::NotIndexed
        } else {
            match (&stored_commit, &current) {
                (Some(stored), Ok(current)) if stored == current => IndexState::UpToDate,
                _ => IndexState::Outdated,
            }
        };

        let current_commit = match current {
            Ok(commit) => Some(commit),
            Err(e) => {
                tracing::warn!("Could not resolve current commit of {}: {:#}", key, e);
                None
            }
        };

        Ok(IndexStatus {
            state,
            repository_id,
            stored_commit,
            current_commit,
        })
    }

    /// Delete a repository's record, entities, relationships and vectors
    pub async fn remove_repository(&self, url: &str, branch: &str) -> Result<bool> {
        let key = RepoKey::new(url, branch)?;
        if self.locks.is_in_flight(&key).await {
            return Err(ValidationError::InvalidValue(
                "repository".to_string(),
                format!("{} is being indexed", key),
            )
            .into());
        }

        self.failures.write().await.remove(&key);
        let Some(record) = self.ctx.store.find_repository(&key.url, &key.branch).await? else {
            return Ok(false);
        };
        let removed = self.ctx.store.delete_repository(&record.id).await?;
        tracing::info!("Removed repository {} ({})", key, record.id);
        Ok(removed)
    }

    pub async fn list_repositories(&self) -> Result<Vec<RepositoryRecord>> {
        self.ctx.store.list_repositories().await
    }

    pub async fn repository_stats(&self, repository_id: &str) -> Result<RepositoryStats> {
        let record = self
            .ctx
            .store
            .get_repository(repository_id)
            .await?
            .ok_or_else(|| GraphStoreError::RepositoryNotFound(repository_id.to_string()))?;
        let counts = self.ctx.store.count_entities(repository_id).await?;
        Ok(RepositoryStats {
            repository_id: record.id,
            url: record.url,
            branch: record.branch,
            last_commit: record.last_commit,
            counts,
        })
    }

    /// Cancel every in-flight run and wait for their outcomes to be published.
    ///
    /// Runs requested afterwards fail immediately as cancelled.
    pub async fn shutdown(&self) {
        tracing::info!("Shutting down indexing manager");
        self.shutdown.cancel();
        for rx in self.locks.in_flight().await {
            let _ = wait_for_result(rx).await;
        }
    }
}
