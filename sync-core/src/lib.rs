//! # sync-core
//!
//! Pure logic for Soko-Sync (no I/O, instant tests).
//!
//! This crate implements the queue ordering, connectivity edge detection,
//! drain bookkeeping, payment pricing and escrow state machine without any
//! network or disk I/O, enabling fast unit tests.
//!
//! ## Design Philosophy
//!
//! All modules in this crate are **pure** - they take input and produce output
//! without side effects. This enables:
//! - Instant unit tests (no mocks, no async)
//! - Deterministic behavior (same input → same output, clocks passed in)
//! - Easy reasoning about state transitions
//!
//! The actual I/O (gateway calls, SQLite) is performed by `sync-client`,
//! which persists and dispatches what these modules decide.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod connectivity;
pub mod drain;
pub mod escrow;
pub mod events;
pub mod payment;
pub mod queue;

pub use connectivity::{ConnectivityEdge, ConnectivityState, Reachability};
pub use drain::{PassSummary, RetryDecision, RetryPolicy};
pub use escrow::{
    default_conditions, EscrowError, EscrowRecord, EscrowStatus, ReleaseCondition,
    ReleaseTransition, DELIVERY_CONFIRMED, DISPUTE_WINDOW_ELAPSED,
};
pub use events::SyncEvent;
pub use payment::{
    default_providers, AuthorizationOutcome, FeeQuote, PaymentError, PaymentRequest,
    ProviderConfig, ProviderRegistry, Settlement, Transaction, TransactionStatus,
};
pub use queue::PendingQueue;
