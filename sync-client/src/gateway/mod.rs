//! Remote gateway abstraction for Soko-Sync.
//!
//! The gateway is the marketplace backend that accepts replayed actions.
//! It is pluggable so the engine can be driven by the HTTP client in
//! production and by [`MockGateway`] in tests.
//!
//! # Design
//!
//! Every call carries the action id as an idempotency key. Delivery is
//! at-least-once: a crash between a successful call and the local removal
//! replays the call, and the gateway is expected to deduplicate on the key.
//!
//! - Transport failures surface as [`GatewayError`] and keep the action queued
//! - A payment decline is a *successful* call returning
//!   [`AuthorizationOutcome::Declined`]
//!
//! # Example
//!
//! ```ignore
//! let gateway = MockGateway::new();
//! let receipt = gateway.send_message(&action.id, &message).await?;
//! ```

mod http;
mod mock;

pub use http::HttpGateway;
pub use mock::{GatewayCall, MockGateway};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sync_core::AuthorizationOutcome;
use sync_types::{
    ActionId, ListingDraft, ListingPatch, OutgoingMessage, PaymentSubmission, ProfilePatch,
};
use thiserror::Error;

/// Gateway errors.
///
/// All of these are delivery failures: the action stays queued.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GatewayError {
    /// Remote could not be reached.
    #[error("gateway unreachable: {0}")]
    Unreachable(String),

    /// Remote did not answer in time.
    #[error("gateway timeout")]
    Timeout,

    /// Remote answered with an error status.
    #[error("gateway rejected request ({status}): {message}")]
    Rejected {
        /// HTTP-style status code.
        status: u16,
        /// Body or reason phrase.
        message: String,
    },

    /// Remote answered with something we could not parse.
    #[error("invalid gateway response: {0}")]
    InvalidResponse(String),
}

/// Acknowledgement of a delivered non-payment action.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayReceipt {
    /// Identifier assigned by the remote, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_id: Option<String>,
}

impl GatewayReceipt {
    /// Receipt carrying a remote id.
    pub fn with_id(id: &str) -> Self {
        Self {
            remote_id: Some(id.to_string()),
        }
    }
}

/// Remote gateway trait.
///
/// `key` is the id of the queued action being delivered.
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    /// Publish a new produce listing.
    async fn create_listing(
        &self,
        key: &ActionId,
        draft: &ListingDraft,
    ) -> Result<GatewayReceipt, GatewayError>;

    /// Edit an existing listing.
    async fn update_listing(
        &self,
        key: &ActionId,
        patch: &ListingPatch,
    ) -> Result<GatewayReceipt, GatewayError>;

    /// Deliver a chat message.
    async fn send_message(
        &self,
        key: &ActionId,
        message: &OutgoingMessage,
    ) -> Result<GatewayReceipt, GatewayError>;

    /// Edit a user profile.
    async fn update_profile(
        &self,
        key: &ActionId,
        patch: &ProfilePatch,
    ) -> Result<GatewayReceipt, GatewayError>;

    /// Ask the payment provider to authorize a transaction.
    async fn submit_payment(
        &self,
        key: &ActionId,
        submission: &PaymentSubmission,
    ) -> Result<AuthorizationOutcome, GatewayError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn receipt_json_omits_missing_id() {
        let json = serde_json::to_string(&GatewayReceipt::default()).unwrap();
        assert_eq!(json, "{}");

        let parsed: GatewayReceipt = serde_json::from_str(r#"{"remote_id":"L-9"}"#).unwrap();
        assert_eq!(parsed, GatewayReceipt::with_id("L-9"));
    }

    #[test]
    fn error_display() {
        let err = GatewayError::Rejected {
            status: 503,
            message: "maintenance".into(),
        };
        assert_eq!(
            err.to_string(),
            "gateway rejected request (503): maintenance"
        );
    }
}
