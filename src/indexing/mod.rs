//! Freshness checks, single-flight admission and indexing runs
//!
//! Per (URL, branch) key the state moves `NOT_INDEXED -> INDEXING -> UP_TO_DATE`,
//! with `OUTDATED` and `FAILED` re-entering `INDEXING` on the next request.

pub(crate) mod index_lock;
mod manager;
pub mod run;
pub mod url;

pub use manager::IndexingManager;
pub use run::RunContext;
pub use url::{RepoKey, normalize_url};
