//! Single-flight registry for indexing runs
//!
//! At most one run per key is in flight. The first caller for a key gets an
//! [`IndexLockGuard`] and performs the run; every later caller receives a
//! watch receiver and observes the same outcome.

use super::url::RepoKey;
use crate::error::IndexingError;
use crate::types::IndexOutcome;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{RwLock, watch};

type ResultRx = watch::Receiver<Option<IndexOutcome>>;

static NEXT_SLOT_ID: AtomicU64 = AtomicU64::new(1);

/// Registry entry; the id tells a slot apart from a later one for the same key
struct Slot {
    id: u64,
    rx: ResultRx,
}

type SlotMap = Arc<RwLock<HashMap<RepoKey, Slot>>>;

/// Remove the key only while it still holds slot `id`
fn remove_slot(locks: &mut HashMap<RepoKey, Slot>, key: &RepoKey, id: u64) {
    if locks.get(key).is_some_and(|slot| slot.id == id) {
        locks.remove(key);
    }
}

/// Result of trying to acquire an index lock
pub(crate) enum IndexLockResult {
    /// We acquired the lock and should perform indexing
    Acquired(IndexLockGuard),
    /// A run for the same key is in progress, wait for its result
    WaitForResult(ResultRx),
}

#[derive(Clone, Default)]
pub(crate) struct IndexLocks {
    inner: SlotMap,
}

impl IndexLocks {
    /// Insert-if-absent under the write lock
    pub(crate) async fn acquire(&self, key: &RepoKey) -> IndexLockResult {
        let mut locks = self.inner.write().await;

        if let Some(slot) = locks.get(key) {
            // A guard that vanished without publishing leaves a closed channel behind
            let live = slot.rx.has_changed().is_ok() || slot.rx.borrow().is_some();
            if live {
                return IndexLockResult::WaitForResult(slot.rx.clone());
            }
            tracing::warn!("Discarding abandoned indexing slot for {}", key);
        }

        let id = NEXT_SLOT_ID.fetch_add(1, Ordering::Relaxed);
        let (result_tx, rx) = watch::channel(None);
        locks.insert(key.clone(), Slot { id, rx });
        IndexLockResult::Acquired(IndexLockGuard {
            key: key.clone(),
            id,
            locks_map: self.inner.clone(),
            result_tx,
            released: false,
        })
    }

    pub(crate) async fn is_in_flight(&self, key: &RepoKey) -> bool {
        self.inner.read().await.contains_key(key)
    }

    /// Receivers of every run currently registered
    pub(crate) async fn in_flight(&self) -> Vec<ResultRx> {
        self.inner
            .read()
            .await
            .values()
            .map(|slot| slot.rx.clone())
            .collect()
    }
}

/// Wait until the run behind `rx` publishes its outcome
pub(crate) async fn wait_for_result(mut rx: ResultRx) -> Result<IndexOutcome, IndexingError> {
    match rx.wait_for(|outcome| outcome.is_some()).await {
        Ok(outcome) => outcome.clone().ok_or(IndexingError::Interrupted),
        Err(_) => Err(IndexingError::Interrupted),
    }
}

/// Held by the task performing a run; publishes its outcome and frees the slot
pub(crate) struct IndexLockGuard {
    key: RepoKey,
    id: u64,
    locks_map: SlotMap,
    result_tx: watch::Sender<Option<IndexOutcome>>,
    released: bool,
}

impl IndexLockGuard {
    pub(crate) fn subscribe(&self) -> ResultRx {
        self.result_tx.subscribe()
    }

    /// Publish the outcome to every waiter, then remove the slot
    pub(crate) async fn complete(mut self, outcome: IndexOutcome) {
        self.result_tx.send_replace(Some(outcome));
        let mut locks = self.locks_map.write().await;
        remove_slot(&mut locks, &self.key, self.id);
        self.released = true;
    }
}

impl Drop for IndexLockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        // Dropping the sender wakes waiters with an error
        tracing::warn!(
            "Indexing slot for {} dropped without a result - spawning cleanup task",
            self.key
        );
        let key = self.key.clone();
        let id = self.id;
        let locks_map = self.locks_map.clone();
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(async move {
                remove_slot(&mut *locks_map.write().await, &key, id);
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(branch: &str) -> RepoKey {
        RepoKey::new("https://example.com/acme/repo", branch).unwrap()
    }

    fn outcome(id: &str) -> IndexOutcome {
        IndexOutcome::up_to_date(id.to_string(), Some("abc".to_string()))
    }

    #[tokio::test]
    async fn test_second_caller_waits() {
        let locks = IndexLocks::default();
        let IndexLockResult::Acquired(guard) = locks.acquire(&key("main")).await else {
            panic!("first caller must acquire");
        };
        let IndexLockResult::WaitForResult(rx) = locks.acquire(&key("main")).await else {
            panic!("second caller must wait");
        };
        assert!(locks.is_in_flight(&key("main")).await);

        let waiter = tokio::spawn(wait_for_result(rx));
        guard.complete(outcome("repo-1")).await;

        assert_eq!(waiter.await.unwrap().unwrap().repository_id, "repo-1");
        assert!(!locks.is_in_flight(&key("main")).await);
    }

    #[tokio::test]
    async fn test_different_branches_are_independent() {
        let locks = IndexLocks::default();
        assert!(matches!(
            locks.acquire(&key("main")).await,
            IndexLockResult::Acquired(_)
        ));
        // The first guard was dropped, but a different branch never waits
        assert!(matches!(
            locks.acquire(&key("dev")).await,
            IndexLockResult::Acquired(_)
        ));
    }

    #[tokio::test]
    async fn test_result_visible_to_late_subscriber() {
        let locks = IndexLocks::default();
        let IndexLockResult::Acquired(guard) = locks.acquire(&key("main")).await else {
            panic!("expected to acquire");
        };
        let rx = guard.subscribe();
        guard.complete(outcome("repo-2")).await;
        assert_eq!(wait_for_result(rx).await.unwrap().repository_id, "repo-2");
    }

    #[tokio::test]
    async fn test_dropped_guard_interrupts_waiters_and_frees_slot() {
        let locks = IndexLocks::default();
        let IndexLockResult::Acquired(guard) = locks.acquire(&key("main")).await else {
            panic!("expected to acquire");
        };
        let IndexLockResult::WaitForResult(rx) = locks.acquire(&key("main")).await else {
            panic!("expected to wait");
        };
        drop(guard);

        assert!(matches!(
            wait_for_result(rx).await,
            Err(IndexingError::Interrupted)
        ));
        // The abandoned slot is replaced even before the cleanup task runs
        let IndexLockResult::Acquired(_replacement) = locks.acquire(&key("main")).await else {
            panic!("abandoned slot must be replaced");
        };
        tokio::task::yield_now().await;
        // The late cleanup must not evict the replacement
        assert!(locks.is_in_flight(&key("main")).await);
    }

    #[tokio::test]
    async fn test_concurrent_acquire_yields_one_leader() {
        let locks = IndexLocks::default();
        let mut handles = Vec::new();
        for _ in 0..16 {
            let locks = locks.clone();
            handles.push(tokio::spawn(async move {
                match locks.acquire(&key("main")).await {
                    IndexLockResult::Acquired(guard) => Some(guard),
                    IndexLockResult::WaitForResult(_) => None,
                }
            }));
        }
        let mut leaders = Vec::new();
        for handle in handles {
            if let Some(guard) = handle.await.unwrap() {
                leaders.push(guard);
            }
        }
        assert_eq!(leaders.len(), 1);
    }
}
