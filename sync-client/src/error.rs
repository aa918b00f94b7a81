//! Error types for sync-client.

use sync_core::{EscrowError, PaymentError};
use sync_types::{SyncError, TransactionId};

use crate::config::ConfigError;
use crate::gateway::GatewayError;

/// Main error type for sync-client operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Durable store error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Remote gateway error.
    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Payment rejected before enqueue.
    #[error("payment rejected: {0}")]
    Payment(#[from] PaymentError),

    /// Escrow misuse.
    #[error("escrow error: {0}")]
    Escrow(#[from] EscrowError),

    /// Data could not be encoded or decoded.
    #[error("data error: {0}")]
    Data(#[from] SyncError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// No transaction with this id in the ledger.
    #[error("transaction not found: {0}")]
    TransactionNotFound(TransactionId),
}

/// Storage layer errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A stored row could not be decoded.
    #[error("corrupt row in {table}: {reason}")]
    Corrupt {
        /// Table the row came from.
        table: &'static str,
        /// What was wrong with it.
        reason: String,
    },

    /// A value does not fit SQLite's signed 64-bit integers.
    #[error("value out of range for storage: {0}")]
    OutOfRange(u64),

    /// Update targeted a row that does not exist.
    #[error("{table} row not found: {id}")]
    NotFound {
        /// Table searched.
        table: &'static str,
        /// Missing id.
        id: String,
    },
}

/// Result type alias for client operations.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Result type alias for storage operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;
