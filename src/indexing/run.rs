//! One indexing run: workspace, discovery, parsing, enrichment, storage

use super::url::RepoKey;
use crate::config::IndexingConfig;
use crate::enrichment::EnrichmentPipeline;
use crate::error::IndexingError;
use crate::git::{VersionControl, Workspace};
use crate::graph::{GraphStore, RepositoryRecord};
use crate::parser::{self, FileWalker};
use crate::types::{IndexOutcome, IndexState};
use anyhow::{Context, Result};
use chrono::Utc;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

macro_rules! check_cancelled {
    ($cancel_token:expr) => {
        if $cancel_token.is_cancelled() {
            tracing::info!("Indexing operation cancelled");
            return Err(IndexingError::Cancelled.into());
        }
    };
}

/// Collaborators shared by every run of a manager
#[derive(Clone)]
pub struct RunContext {
    pub store: Arc<dyn GraphStore>,
    pub vcs: Arc<dyn VersionControl>,
    pub pipeline: Arc<EnrichmentPipeline>,
    pub config: IndexingConfig,
}

/// Outcome skeleton for a run that has not produced anything yet
pub(crate) fn empty_outcome(repository_id: String) -> IndexOutcome {
    IndexOutcome {
        state: IndexState::Indexing,
        reused: false,
        commit: None,
        ..IndexOutcome::up_to_date(repository_id, None)
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}

/// Run every step for `key`, recording progress in `outcome` as it goes.
///
/// `outcome` stays meaningful if the future is dropped part-way (deadline).
/// The prior graph for the repository is only replaced by the final store step.
pub(crate) async fn execute(
    ctx: &RunContext,
    key: &RepoKey,
    clone_url: &str,
    cancel: &CancellationToken,
    outcome: &mut IndexOutcome,
) -> Result<()> {
    let started = Instant::now();

    let existing = ctx
        .store
        .find_repository(&key.url, &key.branch)
        .await
        .context("Failed to look up repository record")?;
    if let Some(record) = &existing {
        outcome.repository_id = record.id.clone();
    }
    check_cancelled!(cancel);

    // Workspace
    let step = Instant::now();
    let vcs = ctx.vcs.clone();
    let root = ctx.config.workspace_root.clone();
    let url = clone_url.to_string();
    let branch = key.branch.clone();
    let run_id = Uuid::new_v4().simple().to_string();
    let clone_cancel = cancel.clone();
    let workspace = tokio::task::spawn_blocking(move || {
        Workspace::acquire(vcs, &root, &url, &branch, &run_id, &clone_cancel)
    })
    .await
    .context("Workspace task panicked")?
    .context("Failed to prepare working copy")?;
    let commit = workspace.current_commit_hash()?;
    outcome.commit = Some(commit.clone());
    outcome.durations.clone_ms = elapsed_ms(step);

    let repository_id = match existing {
        Some(record) if record.last_commit.as_deref() == Some(commit.as_str()) => {
            tracing::info!("{} is up to date at {}", key, commit);
            workspace.release()?;
            let mut reused = IndexOutcome::up_to_date(record.id, Some(commit));
            reused.durations = outcome.durations.clone();
            reused.durations.total_ms = elapsed_ms(started);
            *outcome = reused;
            return Ok(());
        }
        Some(record) => {
            tracing::info!(
                "{} is outdated ({} -> {}), reindexing as {}",
                key,
                record.last_commit.as_deref().unwrap_or("none"),
                commit,
                record.id
            );
            record.id
        }
        None => {
            let id = Uuid::new_v4().to_string();
            tracing::info!("{} is not indexed, indexing as {}", key, id);
            id
        }
    };
    outcome.repository_id = repository_id.clone();
    check_cancelled!(cancel);

    // Discovery and parsing
    let step = Instant::now();
    let walker = FileWalker::new(workspace.path(), ctx.config.max_file_size)
        .with_exclude_patterns(ctx.config.exclude_patterns.clone())
        .with_cancellation(cancel.clone());
    let files = tokio::task::spawn_blocking(move || walker.walk())
        .await
        .context("File walker task panicked")?
        .context("Failed to discover source files")?;
    outcome.files_discovered = files.len();
    check_cancelled!(cancel);

    let parse_id = repository_id.clone();
    let batch = tokio::task::spawn_blocking(move || parser::parse_batch(&files, &parse_id))
        .await
        .context("Parser task panicked")?;
    outcome.files_parsed = batch.entities.len();
    outcome.files_skipped = batch.skipped.len();
    outcome.parse_failures = batch.failures;
    outcome.durations.parse_ms = elapsed_ms(step);
    let mut entities = batch.entities;
    check_cancelled!(cancel);

    // Descriptions and embeddings; a failure here fails the run
    let step = Instant::now();
    let stats = ctx
        .pipeline
        .enrich(&mut entities, cancel)
        .await
        .context("Description and embedding step failed")?;
    outcome.embeddings_generated = stats.embeddings;
    outcome.durations.enrich_ms = elapsed_ms(step);
    check_cancelled!(cancel);

    // Storage; the record update commits together with the entities
    let step = Instant::now();
    let record = RepositoryRecord {
        id: repository_id,
        url: key.url.clone(),
        branch: key.branch.clone(),
        language: ctx.config.language.clone(),
        last_commit: Some(commit),
        last_indexed_at: Some(Utc::now()),
    };
    let counts = ctx
        .store
        .replace_repository_entities(&record, &entities)
        .await
        .context("Failed to store entities")?;
    outcome.types_stored = counts.types;
    outcome.methods_stored = counts.methods;
    outcome.fields_stored = counts.fields;
    outcome.durations.store_ms = elapsed_ms(step);

    workspace
        .release()
        .context("Failed to remove working copy")?;

    outcome.state = IndexState::UpToDate;
    outcome.durations.total_ms = elapsed_ms(started);
    tracing::info!(
        "Indexed {} at {}: {} types, {} methods, {} fields, {} parse failures in {} ms",
        key,
        record.last_commit.as_deref().unwrap_or_default(),
        outcome.types_stored,
        outcome.methods_stored,
        outcome.fields_stored,
        outcome.parse_failures.len(),
        outcome.durations.total_ms
    );
    Ok(())
}

/// Mark an outcome as failed with `error`
pub(crate) fn fail(outcome: &mut IndexOutcome, error: String, started: Instant) {
    tracing::error!("Indexing run for {} failed: {}", outcome.repository_id, error);
    outcome.state = IndexState::Failed;
    outcome.reused = false;
    outcome.errors.push(error);
    outcome.durations.total_ms = elapsed_ms(started);
}
