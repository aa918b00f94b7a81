//! Pending action queue for Soko-Sync.
//!
//! This module provides the in-memory ordering of offline actions:
//! - FIFO ordering for delivery
//! - Attempt bookkeeping for actions whose delivery failed
//! - Idempotent removal once delivery succeeded
//!
//! The queue holds no I/O. sync-client pairs it with a durable store and
//! writes every mutation to disk before applying it here.

use std::collections::VecDeque;
use sync_types::{ActionId, QueuedAction};

/// Ordered collection of actions waiting for delivery.
///
/// Actions flow through the queue in this order:
/// 1. `push()` - append to the back
/// 2. `snapshot()` - copy out in insertion order for a drain pass
/// 3. `remove()` - delivery confirmed
///
/// If delivery fails, call `record_failure()`; the action keeps its position.
#[derive(Debug, Default, Clone)]
pub struct PendingQueue {
    actions: VecDeque<QueuedAction>,
}

impl PendingQueue {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a queue from actions already in insertion order.
    pub fn from_ordered(actions: Vec<QueuedAction>) -> Self {
        Self {
            actions: actions.into(),
        }
    }

    /// Append an action to the back of the queue.
    pub fn push(&mut self, action: QueuedAction) {
        self.actions.push_back(action);
    }

    /// Copy of all pending actions in insertion order.
    pub fn snapshot(&self) -> Vec<QueuedAction> {
        self.actions.iter().cloned().collect()
    }

    /// Look up a pending action.
    pub fn get(&self, id: &ActionId) -> Option<&QueuedAction> {
        self.actions.iter().find(|a| a.id == *id)
    }

    /// Check whether an action is still pending.
    pub fn contains(&self, id: &ActionId) -> bool {
        self.get(id).is_some()
    }

    /// Remove an action. Returns `None` if it was already gone.
    pub fn remove(&mut self, id: &ActionId) -> Option<QueuedAction> {
        let index = self.actions.iter().position(|a| a.id == *id)?;
        self.actions.remove(index)
    }

    /// Record a failed delivery attempt.
    ///
    /// Increments `attempts` and stores the error. The action keeps its
    /// position in the queue. Returns the updated action, or `None` if the
    /// id is not pending.
    pub fn record_failure(&mut self, id: &ActionId, error: &str) -> Option<&QueuedAction> {
        let action = self.actions.iter_mut().find(|a| a.id == *id)?;
        action.attempts = action.attempts.saturating_add(1);
        action.last_error = Some(error.to_string());
        Some(action)
    }

    /// Number of pending actions.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Check if the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}
