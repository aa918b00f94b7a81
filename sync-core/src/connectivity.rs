//! Connectivity tracking for Soko-Sync.
//!
//! Pure edge detector: feed it raw reachability readings and it reports
//! transitions. Repeated identical readings produce nothing, so callers can
//! poll as often as they like without flooding listeners.

/// Last known network reachability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Reachability {
    /// No reading yet.
    #[default]
    Unknown,
    /// Remote reachable.
    Online,
    /// Remote unreachable.
    Offline,
}

/// A change in reachability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityEdge {
    /// Transitioned to reachable.
    BecameOnline,
    /// Transitioned to unreachable.
    BecameOffline,
}

/// Edge-triggered connectivity state.
#[derive(Debug, Clone, Default)]
pub struct ConnectivityState {
    current: Reachability,
}

impl ConnectivityState {
    /// Create a tracker with no reading yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a reading. Returns the edge it caused, if any.
    ///
    /// The first reading always produces an edge.
    pub fn observe(&mut self, reachable: bool) -> Option<ConnectivityEdge> {
        let next = if reachable {
            Reachability::Online
        } else {
            Reachability::Offline
        };
        if next == self.current {
            return None;
        }
        self.current = next;
        Some(match next {
            Reachability::Online => ConnectivityEdge::BecameOnline,
            _ => ConnectivityEdge::BecameOffline,
        })
    }

    /// Current reachability.
    pub fn reachability(&self) -> Reachability {
        self.current
    }

    /// True only after a reachable reading.
    pub fn is_online(&self) -> bool {
        self.current == Reachability::Online
    }
}
