//! Drain pass bookkeeping.
//!
//! A drain pass walks a snapshot of the pending queue once. This module
//! decides what happens to an action after a failed delivery and tallies the
//! pass summary; the dispatching itself lives in sync-client.

/// What to do with an action after a failed delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Keep it queued for the next pass.
    Retain,
    /// Move it out of the pending queue into the dead-letter area.
    DeadLetter,
}

/// Retry ceiling for failed deliveries.
///
/// The default never gives up: an action stays queued until the gateway
/// accepts it. A ceiling is opt-in for deployments that would rather park a
/// permanently rejected action than retry it forever.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RetryPolicy {
    max_attempts: Option<u32>,
}

impl RetryPolicy {
    /// Retry forever.
    pub fn unbounded() -> Self {
        Self { max_attempts: None }
    }

    /// Dead-letter once `attempts` reaches `max_attempts`.
    ///
    /// A ceiling of zero is treated as one: every action gets at least one
    /// attempt.
    pub fn with_ceiling(max_attempts: u32) -> Self {
        Self {
            max_attempts: Some(max_attempts.max(1)),
        }
    }

    /// The configured ceiling, if any.
    pub fn max_attempts(&self) -> Option<u32> {
        self.max_attempts
    }

    /// Decide the fate of an action whose attempt count (after the failure
    /// was recorded) is `attempts`.
    pub fn after_failure(&self, attempts: u32) -> RetryDecision {
        match self.max_attempts {
            Some(max) if attempts >= max => RetryDecision::DeadLetter,
            _ => RetryDecision::Retain,
        }
    }
}

/// Counts reported at the end of a drain pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PassSummary {
    /// Actions the gateway accepted (and that were removed).
    pub succeeded: usize,
    /// Actions whose delivery failed (retained or dead-lettered).
    pub failed: usize,
    /// Subset of `failed` that hit the retry ceiling.
    pub dead_lettered: usize,
}

impl PassSummary {
    /// Tally a successful delivery.
    pub fn record_success(&mut self) {
        self.succeeded += 1;
    }

    /// Tally a failed delivery and the decision taken for it.
    pub fn record_failure(&mut self, decision: RetryDecision) {
        self.failed += 1;
        if decision == RetryDecision::DeadLetter {
            self.dead_lettered += 1;
        }
    }

    /// Number of actions the pass looked at.
    pub fn total(&self) -> usize {
        self.succeeded + self.failed
    }
}
