//! Durable action queue.
//!
//! [`ActionQueue`] pairs the in-memory [`PendingQueue`] with a
//! [`QueueStore`]. Every mutation is written to the store first and applied
//! in memory only once the write succeeded, so a failed write leaves both
//! views unchanged.

use std::sync::Arc;
use sync_core::PendingQueue;
use sync_types::{now_millis, ActionId, ActionPayload, QueuedAction};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::error::StoreError;
use crate::store::{DeadLetter, QueueStore};

/// Ordered, durable queue of pending actions.
pub struct ActionQueue {
    store: Arc<dyn QueueStore>,
    pending: Mutex<PendingQueue>,
}

impl ActionQueue {
    /// Open the queue, replaying whatever the store holds.
    pub async fn open(store: Arc<dyn QueueStore>) -> Result<Self, StoreError> {
        let actions = store.load_pending().await?;
        debug!(pending = actions.len(), "action queue loaded");
        Ok(Self {
            store,
            pending: Mutex::new(PendingQueue::from_ordered(actions)),
        })
    }

    /// Append a new action. Never rejects on content.
    pub async fn enqueue(&self, payload: ActionPayload) -> Result<ActionId, StoreError> {
        let action = QueuedAction::new(payload);
        let id = action.id;
        let kind = action.kind();

        let mut pending = self.pending.lock().await;
        self.store.append(&action).await?;
        pending.push(action);

        debug!(%id, %kind, size = pending.len(), "action enqueued");
        Ok(id)
    }

    /// Snapshot of pending actions in insertion order.
    pub async fn list_pending(&self) -> Vec<QueuedAction> {
        self.pending.lock().await.snapshot()
    }

    /// Look up one pending action.
    pub async fn get(&self, id: &ActionId) -> Option<QueuedAction> {
        self.pending.lock().await.get(id).cloned()
    }

    /// Remove an action. Removing an unknown id is a no-op.
    ///
    /// Returns whether anything was removed.
    pub async fn remove(&self, id: &ActionId) -> Result<bool, StoreError> {
        let mut pending = self.pending.lock().await;
        let stored = self.store.remove(id).await?;
        let in_memory = pending.remove(id).is_some();
        Ok(stored || in_memory)
    }

    /// Count a failed delivery attempt. The action stays queued.
    ///
    /// Returns the updated action, or `None` if `id` is not pending.
    pub async fn record_failure(
        &self,
        id: &ActionId,
        error: &str,
    ) -> Result<Option<QueuedAction>, StoreError> {
        let mut pending = self.pending.lock().await;
        let Some(current) = pending.get(id) else {
            return Ok(None);
        };
        let attempts = current.attempts.saturating_add(1);

        self.store.record_failure(id, attempts, error).await?;
        Ok(pending.record_failure(id, error).cloned())
    }

    /// Move an action out of the pending queue into the dead-letter area.
    pub async fn dead_letter(&self, id: &ActionId) -> Result<Option<QueuedAction>, StoreError> {
        let mut pending = self.pending.lock().await;
        let Some(action) = pending.get(id).cloned() else {
            return Ok(None);
        };

        self.store.dead_letter(&action, now_millis()).await?;
        pending.remove(id);

        warn!(
            %id,
            kind = %action.kind(),
            attempts = action.attempts,
            "action dead-lettered"
        );
        Ok(Some(action))
    }

    /// Actions parked after hitting the retry ceiling.
    pub async fn dead_letters(&self) -> Result<Vec<DeadLetter>, StoreError> {
        self.store.load_dead_letters().await
    }

    /// Number of pending actions.
    pub async fn size(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// Whether nothing is pending.
    pub async fn is_empty(&self) -> bool {
        self.pending.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing::FlakyStore;
    use crate::store::SqliteStore;
    use sync_types::{ActionKind, ListingDraft, OutgoingMessage};

    fn message(body: &str) -> ActionPayload {
        ActionPayload::MessageSend(OutgoingMessage {
            conversation_id: "c-1".into(),
            sender_id: "buyer-1".into(),
            recipient_id: "seller-1".into(),
            body: body.into(),
        })
    }

    fn listing(crop: &str) -> ActionPayload {
        ActionPayload::ListingCreate(ListingDraft {
            seller_id: "farmer-1".into(),
            crop: crop.into(),
            quantity: 20,
            unit: "bag".into(),
            price_per_unit: 3_500,
            currency: "KES".into(),
            location: "Kitale".into(),
            description: None,
        })
    }

    async fn memory_queue() -> ActionQueue {
        let store = SqliteStore::in_memory().await.unwrap();
        ActionQueue::open(Arc::new(store)).await.unwrap()
    }

    // ===========================================
    // Enqueue / Snapshot Tests
    // ===========================================

    #[tokio::test]
    async fn enqueue_assigns_fresh_ids_and_zero_attempts() {
        let queue = memory_queue().await;
        let a = queue.enqueue(message("one")).await.unwrap();
        let b = queue.enqueue(message("one")).await.unwrap();

        assert_ne!(a, b);
        let pending = queue.list_pending().await;
        assert_eq!(pending.len(), 2);
        assert!(pending.iter().all(|p| p.attempts == 0 && p.last_error.is_none()));
        assert_eq!(pending[0].kind(), ActionKind::MessageSend);
    }

    #[tokio::test]
    async fn snapshot_is_insertion_ordered() {
        let queue = memory_queue().await;
        let a = queue.enqueue(listing("maize")).await.unwrap();
        let b = queue.enqueue(message("hello")).await.unwrap();
        let c = queue.enqueue(listing("beans")).await.unwrap();

        let ids: Vec<_> = queue.list_pending().await.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![a, b, c]);
    }

    #[tokio::test]
    async fn order_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("queue.db");

        let (a, b, c) = {
            let store = SqliteStore::new(&path).await.unwrap();
            let queue = ActionQueue::open(Arc::new(store)).await.unwrap();
            let a = queue.enqueue(listing("maize")).await.unwrap();
            let b = queue.enqueue(message("hello")).await.unwrap();
            let c = queue.enqueue(listing("beans")).await.unwrap();
            queue.record_failure(&b, "timeout").await.unwrap();
            (a, b, c)
        };

        let store = SqliteStore::new(&path).await.unwrap();
        let queue = ActionQueue::open(Arc::new(store)).await.unwrap();
        let pending = queue.list_pending().await;
        let ids: Vec<_> = pending.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![a, b, c]);
        assert_eq!(pending[1].attempts, 1);
        assert_eq!(pending[1].last_error.as_deref(), Some("timeout"));
    }

    // ===========================================
    // Remove / Failure Tests
    // ===========================================

    #[tokio::test]
    async fn remove_is_idempotent() {
        let queue = memory_queue().await;
        let a = queue.enqueue(message("one")).await.unwrap();
        let b = queue.enqueue(message("two")).await.unwrap();

        assert!(queue.remove(&a).await.unwrap());
        let after_first = queue.list_pending().await;
        assert!(!queue.remove(&a).await.unwrap());
        assert_eq!(queue.list_pending().await, after_first);
        assert_eq!(queue.size().await, 1);
        assert!(queue.get(&b).await.is_some());
    }

    #[tokio::test]
    async fn record_failure_keeps_item() {
        let queue = memory_queue().await;
        let a = queue.enqueue(message("one")).await.unwrap();

        queue.record_failure(&a, "unreachable").await.unwrap();
        let updated = queue.record_failure(&a, "timeout").await.unwrap().unwrap();

        assert_eq!(updated.attempts, 2);
        assert_eq!(updated.last_error.as_deref(), Some("timeout"));
        assert_eq!(queue.size().await, 1);
    }

    #[tokio::test]
    async fn record_failure_unknown_id_is_none() {
        let queue = memory_queue().await;
        assert!(queue
            .record_failure(&ActionId::new(), "x")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn failed_write_leaves_view_unchanged() {
        let store = Arc::new(FlakyStore::new(SqliteStore::in_memory().await.unwrap()));
        let queue = ActionQueue::open(store.clone()).await.unwrap();
        let a = queue.enqueue(message("one")).await.unwrap();

        store.set_broken(true);
        assert!(queue.enqueue(message("two")).await.is_err());
        assert!(queue.record_failure(&a, "timeout").await.is_err());
        assert!(queue.remove(&a).await.is_err());

        let pending = queue.list_pending().await;
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, a);
        assert_eq!(pending[0].attempts, 0);
    }

    #[tokio::test]
    async fn dead_letter_leaves_queue() {
        let queue = memory_queue().await;
        let a = queue.enqueue(message("one")).await.unwrap();
        let b = queue.enqueue(message("two")).await.unwrap();
        queue.record_failure(&a, "rejected").await.unwrap();

        let parked = queue.dead_letter(&a).await.unwrap().unwrap();
        assert_eq!(parked.attempts, 1);

        let ids: Vec<_> = queue.list_pending().await.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![b]);
        let letters = queue.dead_letters().await.unwrap();
        assert_eq!(letters.len(), 1);
        assert_eq!(letters[0].action.id, a);
    }
}
