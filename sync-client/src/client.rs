//! SyncClient - the main interface for Soko-Sync.
//!
//! This module provides [`SyncClient`], which wires the durable store, the
//! action queue, the transaction ledger, the payment processor, the sync
//! engine and the connectivity monitor together.
//!
//! # Architecture
//!
//! ```text
//! Application → SyncClient → ActionQueue ──→ SqliteStore
//!                   │            ↑
//!                   ├──→ SyncEngine ──→ RemoteGateway
//!                   │        ↓
//!                   └──→ TransactionLedger (transactions, escrow)
//! ```
//!
//! # Example
//!
//! ```ignore
//! use sync_client::{ClientConfig, MockGateway, SyncClient};
//!
//! let client = SyncClient::open(&ClientConfig::default(), MockGateway::new()).await?;
//! client.enqueue(payload).await?;
//! client.report_connectivity(true).await?;
//! ```

use std::sync::Arc;
use sync_core::{
    EscrowRecord, PaymentRequest, ProviderRegistry, Reachability, ReleaseTransition, SyncEvent,
    Transaction,
};
use sync_types::{ActionId, ActionPayload, QueuedAction, TransactionId};
use tokio::sync::{broadcast, watch};
use tracing::info;

use crate::config::ClientConfig;
use crate::engine::{DrainOutcome, SyncEngine};
use crate::error::Result;
use crate::events::EventBus;
use crate::gateway::RemoteGateway;
use crate::ledger::TransactionLedger;
use crate::monitor::{spawn_connectivity_task, ConnectivityMonitor, Observation};
use crate::payments::{PaymentProcessor, SubmittedPayment};
use crate::queue::ActionQueue;
use crate::store::{DeadLetter, SqliteStore};

/// Point-in-time counts for status displays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientStatus {
    /// Last known reachability.
    pub reachability: Reachability,
    /// Pending actions.
    pub pending: usize,
    /// Parked actions.
    pub dead_letters: usize,
    /// Ledger size.
    pub transactions: usize,
    /// Escrow records still held.
    pub escrow_held: usize,
    /// Whether a drain is in flight.
    pub draining: bool,
}

/// The main sync client.
pub struct SyncClient<G: RemoteGateway> {
    queue: Arc<ActionQueue>,
    ledger: Arc<TransactionLedger>,
    payments: Arc<PaymentProcessor>,
    engine: Arc<SyncEngine<G>>,
    monitor: Arc<ConnectivityMonitor<G>>,
    events: EventBus,
}

impl<G: RemoteGateway + 'static> SyncClient<G> {
    /// Open the database named in `config` and replay its queue.
    pub async fn open(config: &ClientConfig, gateway: G) -> Result<Self> {
        let store = SqliteStore::new(&config.storage.database).await?;
        info!(database = %config.storage.database.display(), "store opened");
        Self::with_store(store, config, gateway).await
    }

    /// Build a client over an existing store.
    pub async fn with_store(store: SqliteStore, config: &ClientConfig, gateway: G) -> Result<Self> {
        let store = Arc::new(store);
        let events = EventBus::new();
        let queue = Arc::new(ActionQueue::open(store.clone()).await?);
        let ledger = Arc::new(TransactionLedger::new(store, events.clone()));
        let payments = Arc::new(PaymentProcessor::new(
            ProviderRegistry::new(config.providers.clone()),
            ledger.clone(),
            queue.clone(),
        ));
        let engine = Arc::new(SyncEngine::new(
            queue.clone(),
            payments.clone(),
            gateway,
            events.clone(),
            config.sync.retry_policy(),
        ));
        let monitor = Arc::new(ConnectivityMonitor::new(
            engine.clone(),
            queue.clone(),
            events.clone(),
        ));

        Ok(Self {
            queue,
            ledger,
            payments,
            engine,
            monitor,
            events,
        })
    }

    /// Queue an action for delivery.
    ///
    /// A `PaymentSubmit` must match its ledger row, or the provider's range
    /// and fee schedule if it has none; [`Self::submit_payment`] is the usual
    /// way to queue a payment.
    pub async fn enqueue(&self, payload: ActionPayload) -> Result<ActionId> {
        if let ActionPayload::PaymentSubmit(submission) = &payload {
            self.payments.verify(submission).await?;
        }
        Ok(self.queue.enqueue(payload).await?)
    }

    /// Price, record and queue a payment.
    pub async fn submit_payment(&self, request: &PaymentRequest) -> Result<SubmittedPayment> {
        self.payments.submit(request).await
    }

    /// Pending actions in delivery order.
    pub async fn pending(&self) -> Vec<QueuedAction> {
        self.queue.list_pending().await
    }

    /// Parked actions.
    pub async fn dead_letters(&self) -> Result<Vec<DeadLetter>> {
        Ok(self.queue.dead_letters().await?)
    }

    /// Run a drain now.
    pub async fn sync_now(&self) -> Result<DrainOutcome> {
        self.engine.drain().await
    }

    /// Feed a reachability reading.
    pub async fn report_connectivity(&self, reachable: bool) -> Result<Observation> {
        self.monitor.report(reachable).await
    }

    /// Follow a reachability channel in the background.
    pub fn watch_connectivity(&self, readings: watch::Receiver<bool>) -> tokio::task::JoinHandle<()> {
        spawn_connectivity_task(self.monitor.clone(), readings)
    }

    /// All transactions, newest first.
    pub async fn transactions(&self) -> Result<Vec<Transaction>> {
        self.ledger.list().await
    }

    /// One transaction.
    pub async fn transaction(&self, id: &TransactionId) -> Result<Option<Transaction>> {
        self.ledger.get(id).await
    }

    /// Escrow record for a transaction.
    pub async fn escrow(&self, id: &TransactionId) -> Result<Option<EscrowRecord>> {
        self.ledger.escrow(id).await
    }

    /// Mark a named escrow release condition as met.
    pub async fn assert_condition(&self, id: &TransactionId, condition: &str) -> Result<EscrowRecord> {
        self.ledger.assert_condition(id, condition).await
    }

    /// Release escrowed funds.
    pub async fn release_escrow(&self, id: &TransactionId, reason: &str) -> Result<ReleaseTransition> {
        self.ledger.release_escrow(id, reason).await
    }

    /// Subscribe to events.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    /// The gateway in use.
    pub fn gateway(&self) -> &G {
        self.engine.gateway()
    }

    /// Point-in-time counts.
    pub async fn status(&self) -> Result<ClientStatus> {
        let escrow_held = self
            .ledger
            .escrows()
            .await?
            .iter()
            .filter(|e| e.status == sync_core::EscrowStatus::Held)
            .count();
        Ok(ClientStatus {
            reachability: self.monitor.reachability().await,
            pending: self.queue.size().await,
            dead_letters: self.queue.dead_letters().await?.len(),
            transactions: self.ledger.list().await?.len(),
            escrow_held,
            draining: self.engine.is_draining(),
        })
    }
}
