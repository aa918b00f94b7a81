//! Escrow state machine for Soko-Sync.
//!
//! Funds for an escrow-enabled payment move through exactly two transitions:
//!
//! ```text
//! none ──(payment completed)──► held ──(release_escrow)──► released
//! ```
//!
//! Hold happens once per transaction. Release is idempotent: releasing an
//! already released record succeeds without changing it. Records are never
//! deleted; they are the audit trail for money that moved.

use serde::{Deserialize, Serialize};
use sync_types::TransactionId;
use thiserror::Error;

use crate::payment::{Transaction, TransactionStatus};

/// Release condition: the buyer confirmed delivery.
pub const DELIVERY_CONFIRMED: &str = "delivery_confirmed";

/// Release condition: the dispute window closed without a dispute.
pub const DISPUTE_WINDOW_ELAPSED: &str = "dispute_window_elapsed";

/// Escrow status of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EscrowStatus {
    /// No escrow for this transaction.
    #[default]
    None,
    /// Funds held pending release.
    Held,
    /// Funds released to the seller.
    Released,
}

impl EscrowStatus {
    /// Lowercase name used in storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            EscrowStatus::None => "none",
            EscrowStatus::Held => "held",
            EscrowStatus::Released => "released",
        }
    }

    /// Parse the storage name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "none" => Some(EscrowStatus::None),
            "held" => Some(EscrowStatus::Held),
            "released" => Some(EscrowStatus::Released),
            _ => None,
        }
    }
}

/// Escrow errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EscrowError {
    /// No escrow record exists for the transaction.
    #[error("escrow not found for transaction {0}")]
    EscrowNotFound(TransactionId),

    /// The transaction already has an escrow record.
    #[error("escrow already held for transaction {0}")]
    EscrowAlreadyHeld(TransactionId),

    /// The transaction did not request escrow.
    #[error("escrow not enabled for transaction {0}")]
    EscrowNotEnabled(TransactionId),

    /// Funds can only be held for a completed payment.
    #[error("transaction {0} is not completed")]
    NotCompleted(TransactionId),
}

/// A named condition that gates release.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseCondition {
    /// Condition name, e.g. [`DELIVERY_CONFIRMED`].
    pub name: String,
    /// When the condition was asserted, if it has been.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asserted_at: Option<u64>,
}

impl ReleaseCondition {
    /// An unasserted condition.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            asserted_at: None,
        }
    }

    /// Whether the condition has been asserted.
    pub fn is_met(&self) -> bool {
        self.asserted_at.is_some()
    }
}

/// Default conditions attached to a new hold.
pub fn default_conditions() -> Vec<ReleaseCondition> {
    vec![
        ReleaseCondition::new(DELIVERY_CONFIRMED),
        ReleaseCondition::new(DISPUTE_WINDOW_ELAPSED),
    ]
}

/// Result of a release call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseTransition {
    /// `held -> released` happened now.
    Released,
    /// The record was already released; nothing changed.
    AlreadyReleased,
}

/// Escrow bound 1:1 to a completed, escrow-enabled transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowRecord {
    /// The transaction whose funds are held.
    pub transaction_id: TransactionId,
    /// Held amount (the transaction total).
    pub amount: u64,
    /// ISO currency code.
    pub currency: String,
    /// Conditions expected before release.
    pub release_conditions: Vec<ReleaseCondition>,
    /// `Held` or `Released`.
    pub status: EscrowStatus,
    /// When funds were held.
    pub held_at: u64,
    /// When funds were released.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub released_at: Option<u64>,
    /// Reason given on release.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub release_reason: Option<String>,
}

impl EscrowRecord {
    /// `none -> held` for a completed, escrow-enabled transaction.
    pub fn hold(
        tx: &Transaction,
        conditions: Vec<ReleaseCondition>,
        now: u64,
    ) -> Result<Self, EscrowError> {
        if !tx.escrow_enabled {
            return Err(EscrowError::EscrowNotEnabled(tx.id));
        }
        if tx.status != TransactionStatus::Completed {
            return Err(EscrowError::NotCompleted(tx.id));
        }
        if tx.escrow_status != EscrowStatus::None {
            return Err(EscrowError::EscrowAlreadyHeld(tx.id));
        }
        Ok(Self {
            transaction_id: tx.id,
            amount: tx.total,
            currency: tx.currency.clone(),
            release_conditions: conditions,
            status: EscrowStatus::Held,
            held_at: now,
            released_at: None,
            release_reason: None,
        })
    }

    /// `held -> released`. Idempotent.
    pub fn release(&mut self, reason: &str, now: u64) -> ReleaseTransition {
        if self.status == EscrowStatus::Released {
            return ReleaseTransition::AlreadyReleased;
        }
        self.status = EscrowStatus::Released;
        self.released_at = Some(now);
        self.release_reason = Some(reason.to_string());
        ReleaseTransition::Released
    }

    /// Mark a condition as met, adding it if it was not listed.
    ///
    /// Returns `false` if the condition was already asserted.
    pub fn assert_condition(&mut self, name: &str, now: u64) -> bool {
        match self.release_conditions.iter_mut().find(|c| c.name == name) {
            Some(c) if c.is_met() => false,
            Some(c) => {
                c.asserted_at = Some(now);
                true
            }
            None => {
                self.release_conditions.push(ReleaseCondition {
                    name: name.to_string(),
                    asserted_at: Some(now),
                });
                true
            }
        }
    }

    /// Names of conditions not yet asserted.
    pub fn pending_conditions(&self) -> Vec<&str> {
        self.release_conditions
            .iter()
            .filter(|c| !c.is_met())
            .map(|c| c.name.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::payment::AuthorizationOutcome;
    use sync_types::PaymentSubmission;

    fn completed_tx(escrow: bool) -> Transaction {
        let submission = PaymentSubmission {
            transaction_id: TransactionId::new(),
            user_id: "buyer-1".into(),
            provider: "mpesa".into(),
            amount: 5000,
            fee: 75,
            total: 5075,
            currency: "KES".into(),
            phone: "+254700000001".into(),
            escrow_enabled: escrow,
        };
        let mut tx = Transaction::from_submission(&submission, 1_000);
        tx.status = TransactionStatus::Completed;
        tx
    }

    #[test]
    fn hold_creates_held_record() {
        let tx = completed_tx(true);
        let record = EscrowRecord::hold(&tx, default_conditions(), 2_000).unwrap();

        assert_eq!(record.status, EscrowStatus::Held);
        assert_eq!(record.amount, 5075);
        assert_eq!(record.held_at, 2_000);
        assert_eq!(
            record.pending_conditions(),
            vec![DELIVERY_CONFIRMED, DISPUTE_WINDOW_ELAPSED]
        );
    }

    #[test]
    fn hold_requires_escrow_enabled() {
        let tx = completed_tx(false);
        let result = EscrowRecord::hold(&tx, default_conditions(), 0);
        assert_eq!(result, Err(EscrowError::EscrowNotEnabled(tx.id)));
    }

    #[test]
    fn hold_requires_completed_payment() {
        let mut tx = completed_tx(true);
        tx.status = TransactionStatus::Pending;
        let result = EscrowRecord::hold(&tx, default_conditions(), 0);
        assert_eq!(result, Err(EscrowError::NotCompleted(tx.id)));
    }

    #[test]
    fn hold_twice_is_rejected() {
        let mut tx = completed_tx(true);
        EscrowRecord::hold(&tx, default_conditions(), 0).unwrap();
        tx.escrow_status = EscrowStatus::Held;

        let result = EscrowRecord::hold(&tx, default_conditions(), 0);
        assert_eq!(result, Err(EscrowError::EscrowAlreadyHeld(tx.id)));
    }

    #[test]
    fn release_stamps_time_and_reason() {
        let tx = completed_tx(true);
        let mut record = EscrowRecord::hold(&tx, default_conditions(), 0).unwrap();

        let transition = record.release("delivery_confirmed", 9_000);

        assert_eq!(transition, ReleaseTransition::Released);
        assert_eq!(record.status, EscrowStatus::Released);
        assert_eq!(record.released_at, Some(9_000));
        assert_eq!(record.release_reason.as_deref(), Some("delivery_confirmed"));
    }

    #[test]
    fn release_is_idempotent() {
        let tx = completed_tx(true);
        let mut record = EscrowRecord::hold(&tx, default_conditions(), 0).unwrap();

        record.release("delivery_confirmed", 9_000);
        let second = record.release("other", 10_000);

        assert_eq!(second, ReleaseTransition::AlreadyReleased);
        assert_eq!(record.status, EscrowStatus::Released);
        assert_eq!(record.released_at, Some(9_000));
        assert_eq!(record.release_reason.as_deref(), Some("delivery_confirmed"));
    }

    #[test]
    fn assert_condition_marks_met_once() {
        let tx = completed_tx(true);
        let mut record = EscrowRecord::hold(&tx, default_conditions(), 0).unwrap();

        assert!(record.assert_condition(DELIVERY_CONFIRMED, 5));
        assert!(!record.assert_condition(DELIVERY_CONFIRMED, 6));
        assert_eq!(record.pending_conditions(), vec![DISPUTE_WINDOW_ELAPSED]);
    }

    #[test]
    fn assert_unknown_condition_appends_it() {
        let tx = completed_tx(true);
        let mut record = EscrowRecord::hold(&tx, Vec::new(), 0).unwrap();

        assert!(record.assert_condition("quality_inspected", 5));
        assert_eq!(record.release_conditions.len(), 1);
        assert!(record.pending_conditions().is_empty());
    }

    #[test]
    fn settle_then_hold_sets_transaction_status() {
        let mut tx = completed_tx(true);
        tx.status = TransactionStatus::Pending;
        let settlement = tx.settle(&AuthorizationOutcome::approved(None), 3_000);
        assert!(settlement.is_ok());
        assert_eq!(tx.escrow_status, EscrowStatus::Held);
    }

    #[test]
    fn status_names_roundtrip() {
        for status in [EscrowStatus::None, EscrowStatus::Held, EscrowStatus::Released] {
            assert_eq!(EscrowStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(EscrowStatus::parse("frozen"), None);
    }
}
