//! Version-control access for indexing runs
//!
//! The indexing manager only talks to [`VersionControl`]; [`Git2Client`] is the
//! libgit2-backed implementation and [`Workspace`] scopes a working copy to a
//! single run.

/// libgit2 implementation of the version-control client
pub mod git2_client;
/// Working copies that are removed when a run ends
pub mod workspace;

pub use git2_client::Git2Client;
pub use workspace::Workspace;

use anyhow::Result;
use std::path::Path;
use tokio_util::sync::CancellationToken;

/// Blocking version-control operations; callers run them off the async runtime
pub trait VersionControl: Send + Sync {
    /// Clone `branch` of `url` into `dest`, giving up once `cancel` fires
    fn clone_repository(
        &self,
        url: &str,
        branch: &str,
        dest: &Path,
        cancel: &CancellationToken,
    ) -> Result<()>;

    /// Bring an existing checkout up to date with its remote; a no-op on a current checkout
    fn pull(&self, path: &Path, branch: &str) -> Result<()>;

    /// Commit hash checked out at `path`
    fn current_commit_hash(&self, path: &Path) -> Result<String>;

    /// Commit hash at the tip of `branch` on the remote, without a checkout
    fn remote_commit_hash(&self, url: &str, branch: &str) -> Result<String>;

    /// Delete a working copy; succeeds if it is already gone
    fn cleanup(&self, path: &Path) -> Result<()>;
}
