//! # sync-types
//!
//! Data types shared by every Soko-Sync crate.
//!
//! - [`ActionId`], [`TransactionId`] - Identity types
//! - [`QueuedAction`], [`ActionPayload`], [`ActionKind`] - Offline mutations
//! - [`SyncError`] - Decoding errors

#![warn(missing_docs)]
#![warn(clippy::all)]

mod action;
mod error;
mod ids;

pub use action::{
    ActionKind, ActionPayload, ListingDraft, ListingPatch, ListingStatus, OutgoingMessage,
    PaymentSubmission, ProfilePatch, QueuedAction,
};
pub use error::SyncError;
pub use ids::{now_millis, ActionId, TransactionId};
