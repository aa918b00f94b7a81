//! Mock gateway for testing.
//!
//! Records every call in order and lets tests script failures, payment
//! verdicts and pauses.

use super::{GatewayError, GatewayReceipt, RemoteGateway};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use sync_core::AuthorizationOutcome;
use sync_types::{
    ActionId, ActionKind, ListingDraft, ListingPatch, OutgoingMessage, PaymentSubmission,
    ProfilePatch, TransactionId,
};
use tokio::sync::watch;

/// One call observed by the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GatewayCall {
    /// Idempotency key sent with the call.
    pub key: ActionId,
    /// Which operation was called.
    pub kind: ActionKind,
}

/// Mock gateway for testing.
///
/// Clones share state, so a test can keep a handle while the engine owns
/// another.
#[derive(Debug, Clone)]
pub struct MockGateway {
    inner: Arc<Mutex<MockGatewayInner>>,
    paused: Arc<watch::Sender<bool>>,
}

#[derive(Debug, Default)]
struct MockGatewayInner {
    calls: Vec<GatewayCall>,
    offline: bool,
    fail_next: VecDeque<GatewayError>,
    fail_keys: HashMap<ActionId, GatewayError>,
    outcomes: VecDeque<AuthorizationOutcome>,
    verdicts: HashMap<TransactionId, AuthorizationOutcome>,
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl MockGateway {
    /// Create a mock that accepts everything and approves every payment.
    pub fn new() -> Self {
        let (paused, _) = watch::channel(false);
        Self {
            inner: Arc::new(Mutex::new(MockGatewayInner::default())),
            paused: Arc::new(paused),
        }
    }

    fn inner(&self) -> MutexGuard<'_, MockGatewayInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// All calls so far, in the order they were made.
    pub fn calls(&self) -> Vec<GatewayCall> {
        self.inner().calls.clone()
    }

    /// Idempotency keys of all calls so far, in order.
    pub fn keys(&self) -> Vec<ActionId> {
        self.inner().calls.iter().map(|c| c.key).collect()
    }

    /// Make every call fail with [`GatewayError::Unreachable`].
    pub fn set_offline(&self, offline: bool) {
        self.inner().offline = offline;
    }

    /// Cause the next call to fail with `error`.
    pub fn fail_next(&self, error: GatewayError) {
        self.inner().fail_next.push_back(error);
    }

    /// Cause every call for `key` to fail until [`Self::clear_failures`].
    pub fn fail_key(&self, key: ActionId, error: GatewayError) {
        self.inner().fail_keys.insert(key, error);
    }

    /// Drop all scripted failures.
    pub fn clear_failures(&self) {
        let mut inner = self.inner();
        inner.fail_next.clear();
        inner.fail_keys.clear();
    }

    /// Verdict for the next payment the mock has not seen before.
    pub fn queue_payment_outcome(&self, outcome: AuthorizationOutcome) {
        self.inner().outcomes.push_back(outcome);
    }

    /// Hold every call until [`Self::resume`]. Calls are still logged.
    pub fn pause(&self) {
        self.paused.send_replace(true);
    }

    /// Release paused calls.
    pub fn resume(&self) {
        self.paused.send_replace(false);
    }

    async fn call(&self, key: &ActionId, kind: ActionKind) -> Result<(), GatewayError> {
        self.inner().calls.push(GatewayCall { key: *key, kind });

        let mut paused = self.paused.subscribe();
        if paused.wait_for(|p| !p).await.is_err() {
            return Err(GatewayError::Unreachable("mock closed".into()));
        }

        let mut inner = self.inner();
        if inner.offline {
            return Err(GatewayError::Unreachable("mock offline".into()));
        }
        if let Some(err) = inner.fail_next.pop_front() {
            return Err(err);
        }
        if let Some(err) = inner.fail_keys.get(key) {
            return Err(err.clone());
        }
        Ok(())
    }

    fn receipt(&self) -> GatewayReceipt {
        let n = self.inner().calls.len();
        GatewayReceipt {
            remote_id: Some(format!("R-{}", n)),
        }
    }
}

#[async_trait]
impl RemoteGateway for MockGateway {
    async fn create_listing(
        &self,
        key: &ActionId,
        _draft: &ListingDraft,
    ) -> Result<GatewayReceipt, GatewayError> {
        self.call(key, ActionKind::ListingCreate).await?;
        Ok(self.receipt())
    }

    async fn update_listing(
        &self,
        key: &ActionId,
        _patch: &ListingPatch,
    ) -> Result<GatewayReceipt, GatewayError> {
        self.call(key, ActionKind::ListingUpdate).await?;
        Ok(self.receipt())
    }

    async fn send_message(
        &self,
        key: &ActionId,
        _message: &OutgoingMessage,
    ) -> Result<GatewayReceipt, GatewayError> {
        self.call(key, ActionKind::MessageSend).await?;
        Ok(self.receipt())
    }

    async fn update_profile(
        &self,
        key: &ActionId,
        _patch: &ProfilePatch,
    ) -> Result<GatewayReceipt, GatewayError> {
        self.call(key, ActionKind::ProfileUpdate).await?;
        Ok(self.receipt())
    }

    async fn submit_payment(
        &self,
        key: &ActionId,
        submission: &PaymentSubmission,
    ) -> Result<AuthorizationOutcome, GatewayError> {
        self.call(key, ActionKind::PaymentSubmit).await?;

        // Same transaction, same verdict.
        let mut inner = self.inner();
        if let Some(previous) = inner.verdicts.get(&submission.transaction_id) {
            return Ok(previous.clone());
        }
        let outcome = inner.outcomes.pop_front().unwrap_or_else(|| {
            AuthorizationOutcome::approved(Some(&format!("MOCK-{}", submission.transaction_id)))
        });
        inner
            .verdicts
            .insert(submission.transaction_id, outcome.clone());
        Ok(outcome)
    }
}
