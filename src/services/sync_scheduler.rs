//! Deferred "syncing -> synced" transitions.
//!
//! Nothing is transferred anywhere: each scheduled record simply flips to
//! `synced` after a fixed delay. Tasks are keyed by record id and hold only
//! the id, so a record deleted before its timer fires is looked up, found
//! missing, and left alone.

use std::{
    collections::HashMap,
    future::Future,
    sync::{
        Arc, Mutex, MutexGuard, PoisonError,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

struct Pending {
    generation: u64,
    token: CancellationToken,
}

#[derive(Clone)]
pub struct SyncScheduler {
    delay: Duration,
    pending: Arc<Mutex<HashMap<Uuid, Pending>>>,
    generation: Arc<AtomicU64>,
}

impl SyncScheduler {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            pending: Arc::new(Mutex::new(HashMap::new())),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    fn lock(pending: &Mutex<HashMap<Uuid, Pending>>) -> MutexGuard<'_, HashMap<Uuid, Pending>> {
        pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `on_fire` once the delay has passed, unless `id` is cancelled or
    /// rescheduled first. Rescheduling replaces the earlier task.
    pub fn schedule<F, Fut>(&self, id: Uuid, on_fire: F)
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();
        let generation = self.generation.fetch_add(1, Ordering::Relaxed);
        let previous = Self::lock(&self.pending).insert(
            id,
            Pending {
                generation,
                token: token.clone(),
            },
        );
        if let Some(previous) = previous {
            previous.token.cancel();
        }

        let pending = self.pending.clone();
        let delay = self.delay;
        tokio::spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!("sync timer for {} cancelled", id);
                }
                _ = tokio::time::sleep(delay) => {
                    {
                        let mut map = Self::lock(&pending);
                        if map.get(&id).is_some_and(|p| p.generation == generation) {
                            map.remove(&id);
                        }
                    }
                    on_fire().await;
                }
            }
        });
    }

    /// Cancel the pending task for `id`. Returns whether one existed.
    pub fn cancel(&self, id: Uuid) -> bool {
        match Self::lock(&self.pending).remove(&id) {
            Some(pending) => {
                pending.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel every pending task among `ids`. Returns how many were live.
    pub fn cancel_all(&self, ids: &[Uuid]) -> usize {
        ids.iter().filter(|&&id| self.cancel(id)).count()
    }

    pub fn pending_count(&self) -> usize {
        Self::lock(&self.pending).len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::file_tree::{FileTree, NewFile};
    use crate::models::file_record::{FileType, SyncState};
    use tokio::sync::RwLock;

    const DELAY: Duration = Duration::from_millis(2_000);

    fn tree_with_file() -> (Arc<RwLock<FileTree>>, Uuid) {
        let mut tree = FileTree::new();
        let file = tree
            .add_file(
                "/",
                NewFile {
                    name: "movie.mp4".into(),
                    file_type: FileType::Video,
                    size: 42,
                    hash: None,
                },
            )
            .unwrap();
        (Arc::new(RwLock::new(tree)), file.id)
    }

    fn mark_synced(tree: Arc<RwLock<FileTree>>, id: Uuid) -> impl Future<Output = ()> + Send {
        async move {
            tree.write().await.mark_synced(id);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn fires_after_delay() {
        let (tree, id) = tree_with_file();
        let scheduler = SyncScheduler::new(DELAY);

        let handle = tree.clone();
        scheduler.schedule(id, move || mark_synced(handle, id));
        assert_eq!(scheduler.pending_count(), 1);

        tokio::time::sleep(DELAY / 2).await;
        assert_eq!(
            tree.read().await.get(id).unwrap().sync_status.state,
            SyncState::Syncing
        );

        tokio::time::sleep(DELAY).await;
        assert_eq!(
            tree.read().await.get(id).unwrap().sync_status.state,
            SyncState::Synced
        );
        assert_eq!(scheduler.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_task_never_fires() {
        let (tree, id) = tree_with_file();
        let scheduler = SyncScheduler::new(DELAY);

        let handle = tree.clone();
        scheduler.schedule(id, move || mark_synced(handle, id));
        assert!(scheduler.cancel(id));
        assert!(!scheduler.cancel(id));

        tokio::time::sleep(DELAY * 2).await;
        assert_eq!(
            tree.read().await.get(id).unwrap().sync_status.state,
            SyncState::Syncing
        );
    }

    #[tokio::test(start_paused = true)]
    async fn missing_record_is_a_no_op() {
        let (tree, id) = tree_with_file();
        let scheduler = SyncScheduler::new(DELAY);

        let handle = tree.clone();
        scheduler.schedule(id, move || mark_synced(handle, id));
        {
            let mut guard = tree.write().await;
            guard.set_trashed(&[id], true).unwrap();
            guard.delete_permanently(&[id]).unwrap();
        }

        tokio::time::sleep(DELAY * 2).await;
        assert!(tree.read().await.is_empty());
        assert_eq!(scheduler.pending_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn rescheduling_replaces_the_earlier_task() {
        let (tree, id) = tree_with_file();
        let scheduler = SyncScheduler::new(DELAY);

        let first = tree.clone();
        scheduler.schedule(id, move || mark_synced(first, id));
        tokio::time::sleep(DELAY / 2).await;
        let second = tree.clone();
        scheduler.schedule(id, move || mark_synced(second, id));

        // The first deadline passes without effect.
        tokio::time::sleep(DELAY * 3 / 4).await;
        assert_eq!(
            tree.read().await.get(id).unwrap().sync_status.state,
            SyncState::Syncing
        );
        assert_eq!(scheduler.pending_count(), 1);

        tokio::time::sleep(DELAY).await;
        assert_eq!(
            tree.read().await.get(id).unwrap().sync_status.state,
            SyncState::Synced
        );
    }
}
