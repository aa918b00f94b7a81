//! Payment pricing and settlement for Soko-Sync.
//!
//! Pricing runs before anything is queued: an unknown provider or an amount
//! outside the provider's range is rejected immediately and never reaches the
//! queue. Settlement runs after the gateway has returned an authorization
//! verdict for a queued `PaymentSubmit`.
//!
//! All amounts are integers in the currency's minor unit. Percent fees are
//! held as basis points (1.5% = 150 bps) so fee arithmetic stays exact.

use serde::{Deserialize, Serialize};
use sync_types::{PaymentSubmission, TransactionId};
use thiserror::Error;

use crate::escrow::{default_conditions, EscrowError, EscrowRecord, EscrowStatus};

/// Basis points in one hundred percent.
const BPS_DENOMINATOR: u128 = 10_000;

/// Payment validation errors, raised before enqueue.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaymentError {
    /// No provider is configured under this id.
    #[error("unknown payment provider: {0}")]
    UnknownProvider(String),

    /// Amount outside the provider's inclusive range.
    #[error("amount {amount} outside provider range [{min}, {max}]")]
    AmountOutOfRange {
        /// Requested amount.
        amount: u64,
        /// Provider minimum.
        min: u64,
        /// Provider maximum.
        max: u64,
    },

    /// A submission that disagrees with its ledger row or with the
    /// provider's pricing.
    #[error("transaction {transaction_id} is mispriced: expected fee {expected_fee} total {expected_total} {currency}")]
    Mispriced {
        /// The offending transaction.
        transaction_id: TransactionId,
        /// Fee the provider charges for the amount.
        expected_fee: u64,
        /// Total the provider charges for the amount.
        expected_total: u64,
        /// Currency the provider charges in.
        currency: String,
    },
}

/// Fee schedule and limits for one payment provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Provider id used in requests (e.g. `mpesa`).
    pub id: String,
    /// Display name.
    pub name: String,
    /// Percentage fee in basis points.
    #[serde(default)]
    pub fee_bps: u32,
    /// Fixed fee added on top of the percentage.
    #[serde(default)]
    pub fee_fixed: u64,
    /// Smallest accepted amount (inclusive).
    pub min_amount: u64,
    /// Largest accepted amount (inclusive).
    pub max_amount: u64,
    /// ISO currency code the provider charges in.
    pub currency: String,
}

impl ProviderConfig {
    /// A provider with no fees and the widest possible range.
    pub fn new(id: &str, name: &str, currency: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            fee_bps: 0,
            fee_fixed: 0,
            min_amount: 0,
            max_amount: u64::MAX,
            currency: currency.to_string(),
        }
    }

    /// Set the percentage fee (1.5 means 1.5%).
    pub fn with_fee_percent(mut self, percent: f64) -> Self {
        self.fee_bps = (percent * 100.0).round().max(0.0) as u32;
        self
    }

    /// Set the fixed fee.
    pub fn with_fixed_fee(mut self, fee: u64) -> Self {
        self.fee_fixed = fee;
        self
    }

    /// Set the inclusive amount range.
    pub fn with_limits(mut self, min: u64, max: u64) -> Self {
        self.min_amount = min;
        self.max_amount = max;
        self
    }

    /// Percentage fee as a percent value.
    pub fn fee_percent(&self) -> f64 {
        f64::from(self.fee_bps) / 100.0
    }

    /// Fee for `amount`: percentage part rounded half-up, plus the fixed fee.
    pub fn fee_for(&self, amount: u64) -> u64 {
        let scaled = u128::from(amount) * u128::from(self.fee_bps);
        let percent_part = (scaled + BPS_DENOMINATOR / 2) / BPS_DENOMINATOR;
        u64::try_from(percent_part)
            .unwrap_or(u64::MAX)
            .saturating_add(self.fee_fixed)
    }

    /// Check the range and price `amount`.
    pub fn quote(&self, amount: u64) -> Result<FeeQuote, PaymentError> {
        if amount < self.min_amount || amount > self.max_amount {
            return Err(PaymentError::AmountOutOfRange {
                amount,
                min: self.min_amount,
                max: self.max_amount,
            });
        }
        let fee = self.fee_for(amount);
        Ok(FeeQuote {
            amount,
            fee,
            total: amount.saturating_add(fee),
        })
    }
}

/// A priced amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeeQuote {
    /// Amount before fees.
    pub amount: u64,
    /// Provider fee.
    pub fee: u64,
    /// `amount + fee`.
    pub total: u64,
}

/// The set of configured providers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProviderRegistry {
    providers: Vec<ProviderConfig>,
}

impl ProviderRegistry {
    /// Build a registry from a provider list.
    pub fn new(providers: Vec<ProviderConfig>) -> Self {
        Self { providers }
    }

    /// Look up a provider by id.
    pub fn get(&self, id: &str) -> Result<&ProviderConfig, PaymentError> {
        self.providers
            .iter()
            .find(|p| p.id == id)
            .ok_or_else(|| PaymentError::UnknownProvider(id.to_string()))
    }

    /// All providers in configuration order.
    pub fn providers(&self) -> &[ProviderConfig] {
        &self.providers
    }

    /// Check a submission against its provider's range and fee schedule.
    pub fn verify(&self, submission: &PaymentSubmission) -> Result<(), PaymentError> {
        let provider = self.get(&submission.provider)?;
        let quote = provider.quote(submission.amount)?;
        if quote.fee != submission.fee
            || quote.total != submission.total
            || provider.currency != submission.currency
        {
            return Err(PaymentError::Mispriced {
                transaction_id: submission.transaction_id,
                expected_fee: quote.fee,
                expected_total: quote.total,
                currency: provider.currency.clone(),
            });
        }
        Ok(())
    }
}

/// Providers shipped by default.
pub fn default_providers() -> Vec<ProviderConfig> {
    vec![
        ProviderConfig::new("mpesa", "M-Pesa", "KES")
            .with_fee_percent(1.5)
            .with_limits(1_000, 1_000_000),
        ProviderConfig::new("airtel_money", "Airtel Money", "KES")
            .with_fee_percent(2.0)
            .with_limits(500, 500_000),
        ProviderConfig::new("card", "Card", "KES")
            .with_fee_percent(2.9)
            .with_fixed_fee(30)
            .with_limits(100, 5_000_000),
    ]
}

/// A caller's request to pay. Already validated for shape by the form layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentRequest {
    /// Paying user.
    pub user_id: String,
    /// Provider id.
    pub provider: String,
    /// Amount before fees.
    pub amount: u64,
    /// Phone number to charge.
    pub phone: String,
    /// Hold funds in escrow after completion.
    pub escrow: bool,
}

impl PaymentRequest {
    /// Price the request into a pending transaction.
    pub fn price(
        &self,
        registry: &ProviderRegistry,
        now: u64,
    ) -> Result<Transaction, PaymentError> {
        let provider = registry.get(&self.provider)?;
        let quote = provider.quote(self.amount)?;
        Ok(Transaction {
            id: TransactionId::new(),
            user_id: self.user_id.clone(),
            provider: provider.id.clone(),
            amount: quote.amount,
            fee: quote.fee,
            total: quote.total,
            currency: provider.currency.clone(),
            phone: self.phone.clone(),
            status: TransactionStatus::Pending,
            escrow_enabled: self.escrow,
            escrow_status: EscrowStatus::None,
            reference: None,
            failure_reason: None,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Lifecycle status of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionStatus {
    /// Waiting for authorization.
    Pending,
    /// Authorized.
    Completed,
    /// Declined by the provider.
    Failed,
}

impl TransactionStatus {
    /// Lowercase name used in storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Pending => "pending",
            TransactionStatus::Completed => "completed",
            TransactionStatus::Failed => "failed",
        }
    }

    /// Parse the storage name.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(TransactionStatus::Pending),
            "completed" => Some(TransactionStatus::Completed),
            "failed" => Some(TransactionStatus::Failed),
            _ => None,
        }
    }
}

/// The gateway's verdict on a payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AuthorizationOutcome {
    /// Provider accepted the charge.
    Approved {
        /// Provider reference for the charge.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reference: Option<String>,
    },
    /// Provider refused the charge.
    Declined {
        /// Provider's reason.
        reason: String,
    },
}

impl AuthorizationOutcome {
    /// An approval.
    pub fn approved(reference: Option<&str>) -> Self {
        Self::Approved {
            reference: reference.map(str::to_string),
        }
    }

    /// A decline.
    pub fn declined(reason: &str) -> Self {
        Self::Declined {
            reason: reason.to_string(),
        }
    }

    /// True for approvals.
    pub fn is_approved(&self) -> bool {
        matches!(self, Self::Approved { .. })
    }
}

/// What settling a transaction changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement {
    /// `pending -> completed`, with the new escrow record if escrow was
    /// requested.
    Completed {
        /// Escrow created by this settlement.
        escrow: Option<EscrowRecord>,
    },
    /// `pending -> failed`.
    Failed {
        /// Decline reason.
        reason: String,
    },
    /// The transaction was settled before; nothing changed.
    AlreadySettled,
}

/// One payment attempt, owned by the transaction ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Transaction id.
    pub id: TransactionId,
    /// Paying user.
    pub user_id: String,
    /// Provider id.
    pub provider: String,
    /// Amount before fees.
    pub amount: u64,
    /// Provider fee.
    pub fee: u64,
    /// `amount + fee`.
    pub total: u64,
    /// ISO currency code.
    pub currency: String,
    /// Phone number charged.
    pub phone: String,
    /// Lifecycle status.
    pub status: TransactionStatus,
    /// Whether escrow was requested.
    pub escrow_enabled: bool,
    /// Escrow status; always `None` when escrow is disabled.
    pub escrow_status: EscrowStatus,
    /// Provider reference once approved.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    /// Decline reason once failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    /// Creation time, unix millis.
    pub created_at: u64,
    /// Last status change, unix millis.
    pub updated_at: u64,
}

impl Transaction {
    /// Rebuild a pending transaction from its queued submission.
    pub fn from_submission(submission: &PaymentSubmission, now: u64) -> Self {
        Self {
            id: submission.transaction_id,
            user_id: submission.user_id.clone(),
            provider: submission.provider.clone(),
            amount: submission.amount,
            fee: submission.fee,
            total: submission.total,
            currency: submission.currency.clone(),
            phone: submission.phone.clone(),
            status: TransactionStatus::Pending,
            escrow_enabled: submission.escrow_enabled,
            escrow_status: EscrowStatus::None,
            reference: None,
            failure_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// The queue payload for this transaction.
    pub fn submission(&self) -> PaymentSubmission {
        PaymentSubmission {
            transaction_id: self.id,
            user_id: self.user_id.clone(),
            provider: self.provider.clone(),
            amount: self.amount,
            fee: self.fee,
            total: self.total,
            currency: self.currency.clone(),
            phone: self.phone.clone(),
            escrow_enabled: self.escrow_enabled,
        }
    }

    /// Apply an authorization verdict.
    ///
    /// Only a pending transaction changes; a redelivered verdict for a
    /// settled transaction returns [`Settlement::AlreadySettled`].
    pub fn settle(
        &mut self,
        outcome: &AuthorizationOutcome,
        now: u64,
    ) -> Result<Settlement, EscrowError> {
        if self.status != TransactionStatus::Pending {
            return Ok(Settlement::AlreadySettled);
        }
        match outcome {
            AuthorizationOutcome::Approved { reference } => {
                self.status = TransactionStatus::Completed;
                self.reference = reference.clone();
                self.updated_at = now;
                let escrow = if self.escrow_enabled {
                    let record = EscrowRecord::hold(self, default_conditions(), now)?;
                    self.escrow_status = EscrowStatus::Held;
                    Some(record)
                } else {
                    None
                };
                Ok(Settlement::Completed { escrow })
            }
            AuthorizationOutcome::Declined { reason } => {
                self.status = TransactionStatus::Failed;
                self.failure_reason = Some(reason.clone());
                self.updated_at = now;
                Ok(Settlement::Failed {
                    reason: reason.clone(),
                })
            }
        }
    }
}
