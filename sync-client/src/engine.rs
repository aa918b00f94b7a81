//! Sync engine - drains the action queue through the remote gateway.
//!
//! # Architecture
//!
//! ```text
//! trigger → SyncEngine ─ snapshot ─→ ActionQueue
//!               │
//!               ├─ dispatch (sequential) ─→ RemoteGateway
//!               ├─ payment verdicts ─→ PaymentProcessor → TransactionLedger
//!               └─ SyncPassCompleted ─→ EventBus
//! ```
//!
//! At most one drain runs at a time. A trigger that arrives while a drain
//! is in flight returns [`DrainOutcome::AlreadyDraining`] and does nothing.
//! A pass never discards an action on a transient failure; with the default
//! [`RetryPolicy`] the action is retried on every later pass.

use std::sync::Arc;
use sync_core::{PassSummary, RetryDecision, RetryPolicy, SyncEvent, Transaction};
use sync_types::{ActionId, ActionKind, ActionPayload, QueuedAction};
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::error::{ClientError, Result};
use crate::events::EventBus;
use crate::gateway::{GatewayReceipt, RemoteGateway};
use crate::payments::PaymentProcessor;
use crate::queue::ActionQueue;

/// What a successful delivery produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Delivery {
    /// Gateway acknowledgement for a non-payment action.
    Receipt(GatewayReceipt),
    /// The settled transaction for a payment. A declined payment is a
    /// delivered action whose transaction is `failed`.
    Payment(Transaction),
}

/// Fate of one action in a pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemResult {
    /// Delivered and removed from the queue.
    Delivered(Delivery),
    /// Delivery failed; the action stays queued.
    Retained {
        /// Attempts after this failure.
        attempts: u32,
        /// Failure description.
        error: String,
    },
    /// Delivery failed and the retry ceiling was reached.
    DeadLettered {
        /// Attempts after this failure.
        attempts: u32,
        /// Failure description.
        error: String,
    },
    /// The outcome could not be written to the queue store. The action
    /// stays queued as it was and is redelivered on a later pass.
    Unresolved {
        /// Store failure description.
        error: String,
    },
}

/// Per-action line of a drain report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemReport {
    /// The action.
    pub id: ActionId,
    /// Its kind.
    pub kind: ActionKind,
    /// What happened to it.
    pub result: ItemResult,
}

/// Result of one drain pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DrainReport {
    /// Counts.
    pub summary: PassSummary,
    /// One entry per action in the snapshot, in dispatch order.
    pub items: Vec<ItemReport>,
}

/// Result of a drain trigger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DrainOutcome {
    /// This trigger ran a pass.
    Completed(DrainReport),
    /// Another pass was in flight; nothing was done.
    AlreadyDraining,
}

/// Single-flight queue drainer.
pub struct SyncEngine<G: RemoteGateway> {
    queue: Arc<ActionQueue>,
    payments: Arc<PaymentProcessor>,
    gateway: G,
    events: EventBus,
    policy: RetryPolicy,
    drain_guard: Mutex<()>,
}

impl<G: RemoteGateway> SyncEngine<G> {
    /// Create an idle engine.
    pub fn new(
        queue: Arc<ActionQueue>,
        payments: Arc<PaymentProcessor>,
        gateway: G,
        events: EventBus,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            queue,
            payments,
            gateway,
            events,
            policy,
            drain_guard: Mutex::new(()),
        }
    }

    /// The gateway this engine dispatches to.
    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    /// Whether a pass is in flight.
    pub fn is_draining(&self) -> bool {
        self.drain_guard.try_lock().is_err()
    }

    /// Run one drain pass, unless one is already running.
    ///
    /// Actions enqueued during the pass are picked up by the next one.
    /// A store failure while resolving one action is reported for that
    /// action and the pass moves on; the summary is always emitted.
    pub async fn drain(&self) -> Result<DrainOutcome> {
        let Ok(_guard) = self.drain_guard.try_lock() else {
            debug!("drain already in flight, trigger ignored");
            return Ok(DrainOutcome::AlreadyDraining);
        };

        let snapshot = self.queue.list_pending().await;
        info!(pending = snapshot.len(), "drain pass started");

        let mut report = DrainReport {
            summary: PassSummary::default(),
            items: Vec::with_capacity(snapshot.len()),
        };

        for action in snapshot {
            debug!(id = %action.id, kind = %action.kind(), attempts = action.attempts, "dispatching");
            let result = match self.process(&action).await {
                Ok(result) => result,
                Err(err) => {
                    error!(id = %action.id, kind = %action.kind(), %err, "could not record delivery outcome");
                    ItemResult::Unresolved {
                        error: err.to_string(),
                    }
                }
            };
            match &result {
                ItemResult::Delivered(_) => report.summary.record_success(),
                ItemResult::Retained { .. } | ItemResult::Unresolved { .. } => {
                    report.summary.record_failure(RetryDecision::Retain)
                }
                ItemResult::DeadLettered { .. } => {
                    report.summary.record_failure(RetryDecision::DeadLetter)
                }
            }
            report.items.push(ItemReport {
                id: action.id,
                kind: action.kind(),
                result,
            });
        }

        info!(
            succeeded = report.summary.succeeded,
            failed = report.summary.failed,
            dead_lettered = report.summary.dead_lettered,
            "drain pass completed"
        );
        self.events.emit(report.summary.into());
        Ok(DrainOutcome::Completed(report))
    }

    /// Dispatch one action and write its outcome to the queue.
    async fn process(&self, action: &QueuedAction) -> Result<ItemResult> {
        match self.dispatch(action).await {
            Ok(delivery) => {
                self.queue.remove(&action.id).await?;
                Ok(ItemResult::Delivered(delivery))
            }
            Err(err) => self.handle_failure(action, &err).await,
        }
    }

    async fn dispatch(&self, action: &QueuedAction) -> Result<Delivery> {
        let key = &action.id;
        let receipt = match &action.payload {
            ActionPayload::ListingCreate(draft) => self.gateway.create_listing(key, draft).await?,
            ActionPayload::ListingUpdate(patch) => self.gateway.update_listing(key, patch).await?,
            ActionPayload::MessageSend(message) => self.gateway.send_message(key, message).await?,
            ActionPayload::ProfileUpdate(patch) => self.gateway.update_profile(key, patch).await?,
            ActionPayload::PaymentSubmit(submission) => {
                self.payments.verify(submission).await?;
                let outcome = self.gateway.submit_payment(key, submission).await?;
                let tx = self.payments.settle_delivered(submission, &outcome).await?;
                return Ok(Delivery::Payment(tx));
            }
        };
        Ok(Delivery::Receipt(receipt))
    }

    async fn handle_failure(&self, action: &QueuedAction, err: &ClientError) -> Result<ItemResult> {
        let error = err.to_string();
        let attempts = match self.queue.record_failure(&action.id, &error).await? {
            Some(updated) => updated.attempts,
            None => action.attempts.saturating_add(1),
        };

        match self.policy.after_failure(attempts) {
            RetryDecision::Retain => {
                warn!(id = %action.id, kind = %action.kind(), attempts, %error, "delivery failed, retained");
                Ok(ItemResult::Retained { attempts, error })
            }
            RetryDecision::DeadLetter => {
                self.queue.dead_letter(&action.id).await?;
                self.events.emit(SyncEvent::ActionDeadLettered {
                    id: action.id,
                    kind: action.kind(),
                    attempts,
                });
                Ok(ItemResult::DeadLettered { attempts, error })
            }
        }
    }
}
