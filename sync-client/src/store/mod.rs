//! Durable storage for sync-client.
//!
//! Two narrow traits split the durable area by owner:
//! - [`QueueStore`] is written only by the action queue
//! - [`LedgerStore`] is written only by the transaction ledger
//!
//! Both are pure data access. Ordering, retry and escrow policy live in
//! sync-core and are applied by the callers.

mod sqlite;

pub use sqlite::SqliteStore;

use crate::error::StoreError;
use async_trait::async_trait;
use sync_core::{EscrowRecord, Transaction};
use sync_types::{ActionId, QueuedAction, TransactionId};

/// An action that hit the retry ceiling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadLetter {
    /// The action as it was when parked.
    pub action: QueuedAction,
    /// When it was parked, unix millis.
    pub dead_lettered_at: u64,
}

/// Persistence for the pending action queue.
///
/// Every method is durable when it returns.
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// All pending actions, oldest first.
    async fn load_pending(&self) -> Result<Vec<QueuedAction>, StoreError>;

    /// Append a new action after every existing one.
    async fn append(&self, action: &QueuedAction) -> Result<(), StoreError>;

    /// Overwrite the attempt count and last error of a pending action.
    async fn record_failure(
        &self,
        id: &ActionId,
        attempts: u32,
        error: &str,
    ) -> Result<(), StoreError>;

    /// Delete a pending action. Returns whether a row was deleted.
    async fn remove(&self, id: &ActionId) -> Result<bool, StoreError>;

    /// Move a pending action to the dead-letter area in one step.
    async fn dead_letter(&self, action: &QueuedAction, now: u64) -> Result<(), StoreError>;

    /// Parked actions, oldest first.
    async fn load_dead_letters(&self) -> Result<Vec<DeadLetter>, StoreError>;
}

/// Persistence for transactions and escrow records.
///
/// Rows are never deleted.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Insert a new transaction.
    async fn insert_transaction(&self, tx: &Transaction) -> Result<(), StoreError>;

    /// Fetch a transaction.
    async fn get_transaction(&self, id: &TransactionId)
        -> Result<Option<Transaction>, StoreError>;

    /// All transactions, newest first.
    async fn list_transactions(&self) -> Result<Vec<Transaction>, StoreError>;

    /// Persist a settled transaction and, if one was created, its escrow
    /// record, atomically.
    async fn record_settlement(
        &self,
        tx: &Transaction,
        escrow: Option<&EscrowRecord>,
    ) -> Result<(), StoreError>;

    /// Fetch the escrow record for a transaction.
    async fn get_escrow(&self, id: &TransactionId) -> Result<Option<EscrowRecord>, StoreError>;

    /// All escrow records, oldest first.
    async fn list_escrows(&self) -> Result<Vec<EscrowRecord>, StoreError>;

    /// Persist an updated escrow record and copy its status onto the linked
    /// transaction, stamping it `updated_at = now`, atomically.
    async fn update_escrow(&self, record: &EscrowRecord, now: u64) -> Result<(), StoreError>;
}
