use super::VersionControl;
use crate::error::IndexingError;
use anyhow::Result;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// A working copy that lives for one indexing run.
///
/// Every run gets its own directory, so a run abandoned at its deadline can
/// never write into the checkout of the run that replaces it. Dropping it
/// deletes the directory; [`Workspace::release`] does the same and reports
/// failures.
pub struct Workspace {
    path: PathBuf,
    vcs: Arc<dyn VersionControl>,
    released: bool,
}

impl Workspace {
    /// Directory used by run `run_id` of a (url, branch) key under `root`
    pub fn path_for(root: &Path, url: &str, branch: &str, run_id: &str) -> PathBuf {
        let digest = Sha256::digest(format!("{}\n{}", url, branch).as_bytes());
        root.join(format!("{}-{}", &format!("{:x}", digest)[..16], run_id))
    }

    /// Clone the branch if no working copy exists, otherwise pull it.
    ///
    /// A failed clone or pull removes whatever was left on disk.
    pub fn acquire(
        vcs: Arc<dyn VersionControl>,
        root: &Path,
        url: &str,
        branch: &str,
        run_id: &str,
        cancel: &CancellationToken,
    ) -> Result<Self> {
        std::fs::create_dir_all(root)
            .map_err(|e| IndexingError::WorkspaceFailed(format!("{}: {}", root.display(), e)))?;

        let workspace = Self {
            path: Self::path_for(root, url, branch, run_id),
            vcs,
            released: false,
        };

        if workspace.path.join(".git").exists() {
            tracing::debug!("Reusing working copy {}", workspace.path.display());
            workspace.vcs.pull(&workspace.path, branch)?;
        } else {
            // Leftovers without a repository are unusable
            workspace.vcs.cleanup(&workspace.path)?;
            workspace
                .vcs
                .clone_repository(url, branch, &workspace.path, cancel)?;
        }
        Ok(workspace)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn current_commit_hash(&self) -> Result<String> {
        self.vcs.current_commit_hash(&self.path)
    }

    /// Delete the working copy now
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        self.vcs.cleanup(&self.path)
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        if let Err(e) = self.vcs.cleanup(&self.path) {
            tracing::warn!(
                "Failed to remove working copy {}: {:#}",
                self.path.display(),
                e
            );
        }
    }
}
