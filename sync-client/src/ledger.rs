//! Transaction ledger.
//!
//! Durable owner of transactions and escrow records. Transactions are never
//! deleted; escrow records are created at settlement and afterwards mutated
//! only by condition assertions and release.

use std::sync::Arc;
use sync_core::{
    AuthorizationOutcome, EscrowError, EscrowRecord, ReleaseTransition, Settlement, SyncEvent,
    Transaction,
};
use sync_types::{now_millis, TransactionId};
use tokio::sync::Mutex;
use tracing::info;

use crate::error::{ClientError, Result};
use crate::events::EventBus;
use crate::store::LedgerStore;

/// Durable record of payments and their escrow.
pub struct TransactionLedger {
    store: Arc<dyn LedgerStore>,
    events: EventBus,
    // Serializes read-modify-write cycles on ledger rows.
    write_lock: Mutex<()>,
}

impl TransactionLedger {
    /// Create a ledger over `store`, emitting on `events`.
    pub fn new(store: Arc<dyn LedgerStore>, events: EventBus) -> Self {
        Self {
            store,
            events,
            write_lock: Mutex::new(()),
        }
    }

    /// Record a new pending transaction.
    pub async fn record(&self, tx: &Transaction) -> Result<()> {
        self.store.insert_transaction(tx).await?;
        Ok(())
    }

    /// Record `tx` unless a transaction with its id already exists.
    ///
    /// Returns the stored transaction.
    pub async fn record_if_absent(&self, tx: Transaction) -> Result<Transaction> {
        let _guard = self.write_lock.lock().await;
        if let Some(existing) = self.store.get_transaction(&tx.id).await? {
            return Ok(existing);
        }
        self.store.insert_transaction(&tx).await?;
        Ok(tx)
    }

    /// Fetch a transaction.
    pub async fn get(&self, id: &TransactionId) -> Result<Option<Transaction>> {
        Ok(self.store.get_transaction(id).await?)
    }

    /// All transactions, newest first.
    pub async fn list(&self) -> Result<Vec<Transaction>> {
        Ok(self.store.list_transactions().await?)
    }

    /// Fetch the escrow record for a transaction.
    pub async fn escrow(&self, id: &TransactionId) -> Result<Option<EscrowRecord>> {
        Ok(self.store.get_escrow(id).await?)
    }

    /// All escrow records.
    pub async fn escrows(&self) -> Result<Vec<EscrowRecord>> {
        Ok(self.store.list_escrows().await?)
    }

    /// Apply an authorization verdict to a stored transaction.
    ///
    /// The transaction and any escrow hold are persisted together. A
    /// transaction that was already settled is returned unchanged.
    pub async fn settle(
        &self,
        id: &TransactionId,
        outcome: &AuthorizationOutcome,
    ) -> Result<Transaction> {
        let _guard = self.write_lock.lock().await;
        let mut tx = self
            .store
            .get_transaction(id)
            .await?
            .ok_or(ClientError::TransactionNotFound(*id))?;

        match tx.settle(outcome, now_millis())? {
            Settlement::AlreadySettled => {
                info!(transaction_id = %id, status = tx.status.as_str(), "transaction already settled");
            }
            Settlement::Completed { escrow } => {
                self.store.record_settlement(&tx, escrow.as_ref()).await?;
                info!(
                    transaction_id = %id,
                    total = tx.total,
                    escrow = escrow.is_some(),
                    "payment completed"
                );
            }
            Settlement::Failed { reason } => {
                self.store.record_settlement(&tx, None).await?;
                info!(transaction_id = %id, %reason, "payment declined");
            }
        }
        Ok(tx)
    }

    /// Mark a named release condition as satisfied.
    ///
    /// Returns the updated record. Asserting twice is a no-op.
    pub async fn assert_condition(
        &self,
        id: &TransactionId,
        condition: &str,
    ) -> Result<EscrowRecord> {
        let _guard = self.write_lock.lock().await;
        let mut record = self.require_escrow(id).await?;
        let now = now_millis();
        if record.assert_condition(condition, now) {
            self.store.update_escrow(&record, now).await?;
            info!(transaction_id = %id, condition, "escrow condition asserted");
        }
        Ok(record)
    }

    /// Release held funds. Idempotent: releasing twice changes nothing and
    /// emits no second event.
    pub async fn release_escrow(
        &self,
        id: &TransactionId,
        reason: &str,
    ) -> Result<ReleaseTransition> {
        let _guard = self.write_lock.lock().await;
        let mut record = self.require_escrow(id).await?;

        let now = now_millis();
        let transition = record.release(reason, now);
        if transition == ReleaseTransition::Released {
            self.store.update_escrow(&record, now).await?;
            info!(
                transaction_id = %id,
                reason,
                unmet = ?record.pending_conditions(),
                "escrow released"
            );
            self.events.emit(SyncEvent::EscrowReleased {
                transaction_id: *id,
                reason: reason.to_string(),
            });
        }
        Ok(transition)
    }

    async fn require_escrow(&self, id: &TransactionId) -> Result<EscrowRecord> {
        self.store
            .get_escrow(id)
            .await?
            .ok_or(ClientError::Escrow(EscrowError::EscrowNotFound(*id)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;
    use sync_core::{
        default_providers, EscrowStatus, PaymentRequest, ProviderRegistry, TransactionStatus,
        DELIVERY_CONFIRMED,
    };

    async fn ledger() -> (TransactionLedger, EventBus) {
        let store = SqliteStore::in_memory().await.unwrap();
        let events = EventBus::new();
        (TransactionLedger::new(Arc::new(store), events.clone()), events)
    }

    fn pending(escrow: bool) -> Transaction {
        let registry = ProviderRegistry::new(default_providers());
        PaymentRequest {
            user_id: "buyer-1".into(),
            provider: "mpesa".into(),
            amount: 5_000,
            phone: "+254712345678".into(),
            escrow,
        }
        .price(&registry, now_millis())
        .unwrap()
    }

    async fn held(ledger: &TransactionLedger) -> Transaction {
        let tx = pending(true);
        ledger.record(&tx).await.unwrap();
        ledger
            .settle(&tx.id, &AuthorizationOutcome::approved(Some("MP-1")))
            .await
            .unwrap()
    }

    // ===========================================
    // Settlement Tests
    // ===========================================

    #[tokio::test]
    async fn approval_with_escrow_holds_funds() {
        let (ledger, _) = ledger().await;
        let tx = held(&ledger).await;

        assert_eq!(tx.status, TransactionStatus::Completed);
        assert_eq!(tx.escrow_status, EscrowStatus::Held);
        let record = ledger.escrow(&tx.id).await.unwrap().unwrap();
        assert_eq!(record.amount, 5_075);
        assert_eq!(record.status, EscrowStatus::Held);
    }

    #[tokio::test]
    async fn approval_without_escrow_creates_no_record() {
        let (ledger, _) = ledger().await;
        let tx = pending(false);
        ledger.record(&tx).await.unwrap();

        let settled = ledger
            .settle(&tx.id, &AuthorizationOutcome::approved(None))
            .await
            .unwrap();

        assert_eq!(settled.status, TransactionStatus::Completed);
        assert_eq!(settled.escrow_status, EscrowStatus::None);
        assert!(ledger.escrow(&tx.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn decline_marks_failed_with_reason() {
        let (ledger, _) = ledger().await;
        let tx = pending(true);
        ledger.record(&tx).await.unwrap();

        let settled = ledger
            .settle(&tx.id, &AuthorizationOutcome::declined("insufficient funds"))
            .await
            .unwrap();

        assert_eq!(settled.status, TransactionStatus::Failed);
        assert_eq!(settled.failure_reason.as_deref(), Some("insufficient funds"));
        assert_eq!(settled.escrow_status, EscrowStatus::None);
        assert!(ledger.escrow(&tx.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn redelivered_verdict_changes_nothing() {
        let (ledger, _) = ledger().await;
        let tx = held(&ledger).await;

        let again = ledger
            .settle(&tx.id, &AuthorizationOutcome::declined("late decline"))
            .await
            .unwrap();

        assert_eq!(again, tx);
        assert_eq!(ledger.escrows().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn settle_unknown_transaction() {
        let (ledger, _) = ledger().await;
        let id = TransactionId::new();
        let result = ledger
            .settle(&id, &AuthorizationOutcome::approved(None))
            .await;
        assert!(matches!(
            result,
            Err(ClientError::TransactionNotFound(missing)) if missing == id
        ));
    }

    #[tokio::test]
    async fn record_if_absent_keeps_existing() {
        let (ledger, _) = ledger().await;
        let tx = held(&ledger).await;

        let mut replay = tx.clone();
        replay.status = TransactionStatus::Pending;
        let stored = ledger.record_if_absent(replay).await.unwrap();
        assert_eq!(stored.status, TransactionStatus::Completed);
    }

    #[tokio::test]
    async fn list_is_newest_first() {
        let (ledger, _) = ledger().await;
        let mut first = pending(false);
        first.created_at = 1_000;
        let mut second = pending(false);
        second.created_at = 2_000;
        ledger.record(&first).await.unwrap();
        ledger.record(&second).await.unwrap();

        let ids: Vec<_> = ledger.list().await.unwrap().iter().map(|t| t.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }

    // ===========================================
    // Escrow Release Tests
    // ===========================================

    #[tokio::test]
    async fn release_updates_record_and_transaction() {
        let (ledger, events) = ledger().await;
        let mut rx = events.subscribe();
        let tx = held(&ledger).await;

        let transition = ledger.release_escrow(&tx.id, "delivered").await.unwrap();
        assert_eq!(transition, ReleaseTransition::Released);

        let record = ledger.escrow(&tx.id).await.unwrap().unwrap();
        assert_eq!(record.status, EscrowStatus::Released);
        assert!(record.released_at.is_some());
        assert_eq!(record.release_reason.as_deref(), Some("delivered"));
        let stored = ledger.get(&tx.id).await.unwrap().unwrap();
        assert_eq!(stored.escrow_status, EscrowStatus::Released);

        assert_eq!(
            rx.recv().await.unwrap(),
            SyncEvent::EscrowReleased {
                transaction_id: tx.id,
                reason: "delivered".into()
            }
        );
    }

    #[tokio::test]
    async fn release_twice_is_noop_without_second_event() {
        let (ledger, events) = ledger().await;
        let tx = held(&ledger).await;
        let mut rx = events.subscribe();

        ledger.release_escrow(&tx.id, "delivered").await.unwrap();
        let first = ledger.escrow(&tx.id).await.unwrap().unwrap();

        let transition = ledger.release_escrow(&tx.id, "again").await.unwrap();
        assert_eq!(transition, ReleaseTransition::AlreadyReleased);
        assert_eq!(ledger.escrow(&tx.id).await.unwrap().unwrap(), first);

        assert!(rx.recv().await.is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn release_unknown_is_not_found() {
        let (ledger, _) = ledger().await;
        let id = TransactionId::new();
        let result = ledger.release_escrow(&id, "delivered").await;
        assert!(matches!(
            result,
            Err(ClientError::Escrow(EscrowError::EscrowNotFound(missing))) if missing == id
        ));
    }

    #[tokio::test]
    async fn release_without_escrow_is_not_found() {
        let (ledger, _) = ledger().await;
        let tx = pending(false);
        ledger.record(&tx).await.unwrap();
        ledger
            .settle(&tx.id, &AuthorizationOutcome::approved(None))
            .await
            .unwrap();

        let result = ledger.release_escrow(&tx.id, "delivered").await;
        assert!(matches!(
            result,
            Err(ClientError::Escrow(EscrowError::EscrowNotFound(_)))
        ));
    }

    #[tokio::test]
    async fn assert_condition_persists() {
        let (ledger, _) = ledger().await;
        let tx = held(&ledger).await;

        let record = ledger
            .assert_condition(&tx.id, DELIVERY_CONFIRMED)
            .await
            .unwrap();
        assert!(!record.pending_conditions().contains(&DELIVERY_CONFIRMED));

        let stored = ledger.escrow(&tx.id).await.unwrap().unwrap();
        assert_eq!(stored, record);
        assert_eq!(stored.status, EscrowStatus::Held);
    }
}
