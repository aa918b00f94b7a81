//! # sync-client
//!
//! Client library for Soko-Sync.
//!
//! Captures marketplace actions while offline, persists them in SQLite and
//! replays them in order through a [`RemoteGateway`] once connectivity
//! returns. Payments are priced up front, recorded in the
//! [`TransactionLedger`] and settled (with optional escrow) when the
//! gateway's verdict comes back.
//!
//! ## Components
//!
//! - [`ActionQueue`] - ordered durable queue of pending actions
//! - [`SyncEngine`] - single-flight drain through the gateway
//! - [`ConnectivityMonitor`] - edge detection, automatic drain on reconnect
//! - [`PaymentProcessor`] - fee computation and payment submission
//! - [`TransactionLedger`] - transactions and escrow records
//! - [`SyncClient`] - wires all of the above together

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod client;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod gateway;
pub mod ledger;
pub mod monitor;
pub mod payments;
pub mod queue;
pub mod store;

pub use client::{ClientStatus, SyncClient};
pub use config::{ClientConfig, ConfigError, GatewayConfig, StorageConfig, SyncConfig};
pub use engine::{Delivery, DrainOutcome, DrainReport, ItemReport, ItemResult, SyncEngine};
pub use error::{ClientError, StoreError};
pub use events::EventBus;
pub use gateway::{
    GatewayCall, GatewayError, GatewayReceipt, HttpGateway, MockGateway, RemoteGateway,
};
pub use ledger::TransactionLedger;
pub use monitor::{spawn_connectivity_task, ConnectivityMonitor, Observation};
pub use payments::{PaymentProcessor, SubmittedPayment};
pub use queue::ActionQueue;
pub use store::{DeadLetter, LedgerStore, QueueStore, SqliteStore};

// Re-export the shared vocabulary so applications need one dependency.
pub use sync_core::{
    AuthorizationOutcome, EscrowError, EscrowRecord, EscrowStatus, PaymentError, PaymentRequest,
    ProviderConfig, Reachability, ReleaseTransition, RetryPolicy, SyncEvent, Transaction,
    TransactionStatus,
};
pub use sync_types::{
    ActionId, ActionKind, ActionPayload, ListingDraft, ListingPatch, ListingStatus,
    now_millis, OutgoingMessage, PaymentSubmission, ProfilePatch, QueuedAction, TransactionId,
};
