//! Events emitted to the application layer.

use sync_types::{ActionId, ActionKind, TransactionId};

use crate::connectivity::ConnectivityEdge;
use crate::drain::PassSummary;

/// Events emitted to external collaborators (UI, notifications).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// Remote became reachable.
    BecameOnline,
    /// Remote became unreachable.
    BecameOffline,
    /// A drain pass finished.
    SyncPassCompleted {
        /// Actions delivered and removed.
        succeeded: usize,
        /// Actions whose delivery failed.
        failed: usize,
    },
    /// Escrowed funds were released.
    EscrowReleased {
        /// The transaction whose escrow was released.
        transaction_id: TransactionId,
        /// Reason given by the caller.
        reason: String,
    },
    /// An action hit the retry ceiling and left the pending queue.
    ActionDeadLettered {
        /// The parked action.
        id: ActionId,
        /// Its kind.
        kind: ActionKind,
        /// Attempts made before giving up.
        attempts: u32,
    },
}

impl From<ConnectivityEdge> for SyncEvent {
    fn from(edge: ConnectivityEdge) -> Self {
        match edge {
            ConnectivityEdge::BecameOnline => SyncEvent::BecameOnline,
            ConnectivityEdge::BecameOffline => SyncEvent::BecameOffline,
        }
    }
}

impl From<PassSummary> for SyncEvent {
    fn from(summary: PassSummary) -> Self {
        SyncEvent::SyncPassCompleted {
            succeeded: summary.succeeded,
            failed: summary.failed,
        }
    }
}
