use super::VersionControl;
use crate::error::{GitError, IndexingError};
use anyhow::{Context, Result};
use git2::{Direction, FetchOptions, Remote, RemoteCallbacks, Repository, ResetType, build::RepoBuilder};
use std::fs;
use std::path::Path;
use tokio_util::sync::CancellationToken;

/// Version-control client backed by libgit2
#[derive(Debug, Default, Clone)]
pub struct Git2Client;

impl Git2Client {
    pub fn new() -> Self {
        Self
    }

    fn open(path: &Path) -> Result<Repository> {
        Repository::open(path)
            .map_err(|e| GitError::OpenFailed(format!("{}: {}", path.display(), e)).into())
    }
}

impl VersionControl for Git2Client {
    fn clone_repository(
        &self,
        url: &str,
        branch: &str,
        dest: &Path,
        cancel: &CancellationToken,
    ) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(IndexingError::Cancelled.into());
        }
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        tracing::info!("Cloning {} ({}) into {}", url, branch, dest.display());
        // Returning false from the progress callback aborts the transfer
        let mut callbacks = RemoteCallbacks::new();
        callbacks.transfer_progress(|_| !cancel.is_cancelled());
        let mut fetch = FetchOptions::new();
        fetch.remote_callbacks(callbacks);

        let cloned = RepoBuilder::new()
            .branch(branch)
            .fetch_options(fetch)
            .clone(url, dest);
        match cloned {
            Ok(_) => Ok(()),
            Err(_) if cancel.is_cancelled() => Err(IndexingError::Cancelled.into()),
            Err(e) => Err(GitError::CloneFailed {
                url: url.to_string(),
                reason: e.message().to_string(),
            }
            .into()),
        }
    }

    fn pull(&self, path: &Path, branch: &str) -> Result<()> {
        let repo = Self::open(path)?;
        let pull_failed = |reason: String| GitError::PullFailed {
            path: path.display().to_string(),
            reason,
        };

        let mut remote = repo
            .find_remote("origin")
            .map_err(|e| pull_failed(e.message().to_string()))?;
        remote
            .fetch(&[] as &[&str], None, None)
            .map_err(|e| pull_failed(e.message().to_string()))?;

        let tracking = format!("refs/remotes/origin/{}", branch);
        let target = repo
            .find_reference(&tracking)
            .map_err(|_| GitError::BranchNotFound(branch.to_string()))?
            .peel_to_commit()
            .map_err(|e| pull_failed(e.message().to_string()))?;

        let head = repo.head().ok().and_then(|h| h.target());
        if head == Some(target.id()) {
            tracing::debug!("{} already at {}", path.display(), target.id());
            return Ok(());
        }

        repo.reset(target.as_object(), ResetType::Hard, None)
            .map_err(|e| pull_failed(e.message().to_string()))?;
        tracing::info!("Updated {} to {}", path.display(), target.id());
        Ok(())
    }

    fn current_commit_hash(&self, path: &Path) -> Result<String> {
        let repo = Self::open(path)?;
        let commit = repo
            .head()
            .and_then(|head| head.peel_to_commit())
            .map_err(|_| GitError::NoCommit)?;
        Ok(commit.id().to_string())
    }

    fn remote_commit_hash(&self, url: &str, branch: &str) -> Result<String> {
        let open_failed = |e: git2::Error| GitError::OpenFailed(format!("{}: {}", url, e.message()));
        let mut remote = Remote::create_detached(url).map_err(open_failed)?;
        remote.connect(Direction::Fetch).map_err(open_failed)?;

        let wanted = format!("refs/heads/{}", branch);
        let heads = remote.list().map_err(open_failed)?;
        heads
            .iter()
            .find(|head| head.name() == wanted)
            .map(|head| head.oid().to_string())
            .ok_or_else(|| GitError::BranchNotFound(branch.to_string()).into())
    }

    fn cleanup(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            return Ok(());
        }
        fs::remove_dir_all(path)
            .with_context(|| format!("Failed to remove working copy {}", path.display()))?;
        tracing::debug!("Removed working copy {}", path.display());
        Ok(())
    }
}
