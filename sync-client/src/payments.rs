//! Payment processor.
//!
//! Prices requests against the provider registry, records the pending
//! transaction and queues it for authorization. Verdicts come back through
//! the sync engine and are applied with [`PaymentProcessor::settle`].

use std::sync::Arc;
use sync_core::{
    AuthorizationOutcome, PaymentError, PaymentRequest, ProviderRegistry, Transaction,
};
use sync_types::{now_millis, ActionId, ActionPayload, PaymentSubmission, TransactionId};
use tracing::info;

use crate::error::Result;
use crate::ledger::TransactionLedger;
use crate::queue::ActionQueue;

/// A priced, recorded and queued payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedPayment {
    /// The pending transaction.
    pub transaction: Transaction,
    /// The queued `PaymentSubmit` action.
    pub action_id: ActionId,
}

/// Turns payment requests into queued, ledgered transactions.
pub struct PaymentProcessor {
    registry: ProviderRegistry,
    ledger: Arc<TransactionLedger>,
    queue: Arc<ActionQueue>,
}

impl PaymentProcessor {
    /// Create a processor.
    pub fn new(
        registry: ProviderRegistry,
        ledger: Arc<TransactionLedger>,
        queue: Arc<ActionQueue>,
    ) -> Self {
        Self {
            registry,
            ledger,
            queue,
        }
    }

    /// Configured providers.
    pub fn registry(&self) -> &ProviderRegistry {
        &self.registry
    }

    /// Price, queue and record a payment.
    ///
    /// Unknown providers and out-of-range amounts are rejected before
    /// anything is written. The action is queued before the ledger row is
    /// written; if the ledger write fails, delivery recreates the row. A row
    /// already written by a concurrent delivery is kept.
    pub async fn submit(&self, request: &PaymentRequest) -> Result<SubmittedPayment> {
        let priced = request.price(&self.registry, now_millis())?;
        let action_id = self
            .queue
            .enqueue(ActionPayload::PaymentSubmit(priced.submission()))
            .await?;
        let transaction = self.ledger.record_if_absent(priced).await?;

        info!(
            transaction_id = %transaction.id,
            provider = %transaction.provider,
            amount = transaction.amount,
            fee = transaction.fee,
            total = transaction.total,
            escrow = transaction.escrow_enabled,
            "payment queued"
        );
        Ok(SubmittedPayment {
            transaction,
            action_id,
        })
    }

    /// Check a submission before it is queued or sent.
    ///
    /// A submission with a ledger row must match it exactly. One without is
    /// re-priced against the registry.
    pub async fn verify(&self, submission: &PaymentSubmission) -> Result<()> {
        match self.ledger.get(&submission.transaction_id).await? {
            Some(recorded) if recorded.submission() == *submission => Ok(()),
            Some(recorded) => Err(PaymentError::Mispriced {
                transaction_id: recorded.id,
                expected_fee: recorded.fee,
                expected_total: recorded.total,
                currency: recorded.currency,
            }
            .into()),
            None => Ok(self.registry.verify(submission)?),
        }
    }

    /// Apply an authorization verdict to a recorded transaction.
    pub async fn settle(
        &self,
        id: &TransactionId,
        outcome: &AuthorizationOutcome,
    ) -> Result<Transaction> {
        self.ledger.settle(id, outcome).await
    }

    /// Apply a verdict for a delivered submission.
    ///
    /// A submission without a ledger row gets one, once it passes
    /// [`Self::verify`].
    pub async fn settle_delivered(
        &self,
        submission: &PaymentSubmission,
        outcome: &AuthorizationOutcome,
    ) -> Result<Transaction> {
        self.verify(submission).await?;
        self.ledger
            .record_if_absent(Transaction::from_submission(submission, now_millis()))
            .await?;
        self.settle(&submission.transaction_id, outcome).await
    }
}
