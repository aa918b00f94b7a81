//! Queued actions and their kind-specific payloads.
//!
//! The payload enum carries the kind tag, so a [`QueuedAction`] can never hold
//! a payload that disagrees with its kind. On disk and on the wire a payload
//! is JSON of the form `{"kind": "MessageSend", "data": {...}}`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::{now_millis, ActionId, SyncError, TransactionId};

/// The exhaustive set of action kinds the queue accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ActionKind {
    /// Create a new produce listing.
    ListingCreate,
    /// Change an existing produce listing.
    ListingUpdate,
    /// Send a message in a buyer/seller conversation.
    MessageSend,
    /// Submit a payment for authorization.
    PaymentSubmit,
    /// Update the user's profile.
    ProfileUpdate,
}

impl ActionKind {
    /// Every kind, in declaration order.
    pub const ALL: [ActionKind; 5] = [
        ActionKind::ListingCreate,
        ActionKind::ListingUpdate,
        ActionKind::MessageSend,
        ActionKind::PaymentSubmit,
        ActionKind::ProfileUpdate,
    ];

    /// The string tag used in persisted payloads.
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::ListingCreate => "ListingCreate",
            ActionKind::ListingUpdate => "ListingUpdate",
            ActionKind::MessageSend => "MessageSend",
            ActionKind::PaymentSubmit => "PaymentSubmit",
            ActionKind::ProfileUpdate => "ProfileUpdate",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionKind {
    type Err = SyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ActionKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| SyncError::UnknownKind(s.to_string()))
    }
}

/// A new produce listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingDraft {
    /// Seller creating the listing.
    pub seller_id: String,
    /// Crop or product name.
    pub crop: String,
    /// Available quantity, in `unit`.
    pub quantity: u32,
    /// Unit of sale (kg, crate, bag).
    pub unit: String,
    /// Asking price per unit, in currency minor units.
    pub price_per_unit: u64,
    /// ISO currency code.
    pub currency: String,
    /// Market or village the produce is collected from.
    pub location: String,
    /// Optional free-text description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Lifecycle status of a listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    /// Visible to buyers.
    Active,
    /// Reserved by a buyer.
    Reserved,
    /// Sold out.
    Sold,
    /// Withdrawn by the seller.
    Withdrawn,
}

/// Changes to an existing listing. Absent fields are left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingPatch {
    /// Listing being changed.
    pub listing_id: String,
    /// New quantity.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<u32>,
    /// New price per unit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_per_unit: Option<u64>,
    /// New status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ListingStatus>,
    /// New description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A chat message to deliver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    /// Conversation the message belongs to.
    pub conversation_id: String,
    /// Author.
    pub sender_id: String,
    /// Recipient.
    pub recipient_id: String,
    /// Message text.
    pub body: String,
}

/// Changes to the user's profile. Absent fields are left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfilePatch {
    /// Profile owner.
    pub user_id: String,
    /// New display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// New phone number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    /// New home location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Preferred interface language.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
}

/// A priced payment waiting for authorization.
///
/// Built by the payment processor once the amount has passed the provider's
/// range check; the fee and total are final at this point.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentSubmission {
    /// Ledger entry this payment settles.
    pub transaction_id: TransactionId,
    /// Paying user.
    pub user_id: String,
    /// Payment provider id (e.g. `mpesa`).
    pub provider: String,
    /// Amount before fees, in currency minor units.
    pub amount: u64,
    /// Provider fee.
    pub fee: u64,
    /// `amount + fee`.
    pub total: u64,
    /// ISO currency code.
    pub currency: String,
    /// Phone number charged by mobile-money providers.
    pub phone: String,
    /// Whether funds are held in escrow after completion.
    pub escrow_enabled: bool,
}

impl fmt::Debug for PaymentSubmission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PaymentSubmission")
            .field("transaction_id", &self.transaction_id)
            .field("user_id", &self.user_id)
            .field("provider", &self.provider)
            .field("amount", &self.amount)
            .field("fee", &self.fee)
            .field("total", &self.total)
            .field("currency", &self.currency)
            .field("phone", &mask_phone(&self.phone))
            .field("escrow_enabled", &self.escrow_enabled)
            .finish()
    }
}

/// Keep the last three digits of a phone number.
fn mask_phone(phone: &str) -> String {
    let visible: String = phone
        .chars()
        .rev()
        .take(3)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("***{}", visible)
}

/// Kind-tagged payload of a queued action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data")]
pub enum ActionPayload {
    /// See [`ActionKind::ListingCreate`].
    ListingCreate(ListingDraft),
    /// See [`ActionKind::ListingUpdate`].
    ListingUpdate(ListingPatch),
    /// See [`ActionKind::MessageSend`].
    MessageSend(OutgoingMessage),
    /// See [`ActionKind::PaymentSubmit`].
    PaymentSubmit(PaymentSubmission),
    /// See [`ActionKind::ProfileUpdate`].
    ProfileUpdate(ProfilePatch),
}

impl ActionPayload {
    /// The kind this payload belongs to.
    pub fn kind(&self) -> ActionKind {
        match self {
            ActionPayload::ListingCreate(_) => ActionKind::ListingCreate,
            ActionPayload::ListingUpdate(_) => ActionKind::ListingUpdate,
            ActionPayload::MessageSend(_) => ActionKind::MessageSend,
            ActionPayload::PaymentSubmit(_) => ActionKind::PaymentSubmit,
            ActionPayload::ProfileUpdate(_) => ActionKind::ProfileUpdate,
        }
    }

    /// Build a payload from a kind and its untagged JSON body.
    pub fn from_parts(kind: ActionKind, body: serde_json::Value) -> Result<Self, SyncError> {
        let tagged = serde_json::json!({ "kind": kind.as_str(), "data": body });
        serde_json::from_value(tagged).map_err(SyncError::Deserialization)
    }

    /// The untagged JSON body of this payload.
    pub fn body(&self) -> Result<serde_json::Value, SyncError> {
        let mut tagged = serde_json::to_value(self).map_err(SyncError::Serialization)?;
        Ok(tagged
            .get_mut("data")
            .map(serde_json::Value::take)
            .unwrap_or(serde_json::Value::Null))
    }

    /// Serialize to the tagged JSON form used for persistence.
    pub fn to_json(&self) -> Result<String, SyncError> {
        serde_json::to_string(self).map_err(SyncError::Serialization)
    }

    /// Parse the tagged JSON form.
    ///
    /// An unrecognized kind tag is a programming error upstream and surfaces
    /// as [`SyncError::Deserialization`].
    pub fn from_json(json: &str) -> Result<Self, SyncError> {
        serde_json::from_str(json).map_err(SyncError::Deserialization)
    }
}

/// One pending mutation waiting for delivery to the remote gateway.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedAction {
    /// Stable identifier, also the idempotency key sent to the gateway.
    pub id: ActionId,
    /// Kind-tagged payload.
    pub payload: ActionPayload,
    /// Creation time, milliseconds since the Unix epoch.
    pub enqueued_at: u64,
    /// Dispatch attempts so far. Never decreases.
    pub attempts: u32,
    /// Description of the most recent failed attempt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl QueuedAction {
    /// Create a fresh action with a new id and zero attempts.
    pub fn new(payload: ActionPayload) -> Self {
        Self {
            id: ActionId::new(),
            payload,
            enqueued_at: now_millis(),
            attempts: 0,
            last_error: None,
        }
    }

    /// The kind of this action.
    pub fn kind(&self) -> ActionKind {
        self.payload.kind()
    }
}
