//! Connectivity monitor.
//!
//! Turns raw reachability readings into edge events and starts a drain when
//! the remote comes back. This is the only automatic drain trigger.

use std::sync::Arc;
use sync_core::{ConnectivityEdge, ConnectivityState, Reachability};
use tokio::sync::{watch, Mutex};
use tracing::{debug, info};

use crate::engine::{DrainOutcome, SyncEngine};
use crate::error::Result;
use crate::events::EventBus;
use crate::gateway::RemoteGateway;
use crate::queue::ActionQueue;

/// What one reading caused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    /// The edge, if reachability changed.
    pub edge: Option<ConnectivityEdge>,
    /// The drain this reading triggered, if any.
    pub drain: Option<DrainOutcome>,
}

/// Edge-triggered reachability tracker wired to the sync engine.
pub struct ConnectivityMonitor<G: RemoteGateway> {
    state: Mutex<ConnectivityState>,
    engine: Arc<SyncEngine<G>>,
    queue: Arc<ActionQueue>,
    events: EventBus,
}

impl<G: RemoteGateway> ConnectivityMonitor<G> {
    /// Create a monitor with no reading yet.
    pub fn new(engine: Arc<SyncEngine<G>>, queue: Arc<ActionQueue>, events: EventBus) -> Self {
        Self {
            state: Mutex::new(ConnectivityState::new()),
            engine,
            queue,
            events,
        }
    }

    /// Last known reachability.
    pub async fn reachability(&self) -> Reachability {
        self.state.lock().await.reachability()
    }

    /// Feed one reading.
    ///
    /// On `BecameOnline` with a non-empty queue and an idle engine, runs a
    /// drain before returning.
    pub async fn report(&self, reachable: bool) -> Result<Observation> {
        let edge = self.state.lock().await.observe(reachable);
        let Some(edge) = edge else {
            return Ok(Observation {
                edge: None,
                drain: None,
            });
        };

        info!(?edge, "connectivity changed");
        self.events.emit(edge.into());

        let drain = if edge == ConnectivityEdge::BecameOnline
            && !self.queue.is_empty().await
            && !self.engine.is_draining()
        {
            debug!("back online with pending actions, draining");
            Some(self.engine.drain().await?)
        } else {
            None
        };

        Ok(Observation {
            edge: Some(edge),
            drain,
        })
    }
}

/// Spawn a task feeding `readings` into `monitor`.
///
/// The current value is reported immediately, then every change. The task
/// ends when the sender is dropped.
pub fn spawn_connectivity_task<G>(
    monitor: Arc<ConnectivityMonitor<G>>,
    mut readings: watch::Receiver<bool>,
) -> tokio::task::JoinHandle<()>
where
    G: RemoteGateway + 'static,
{
    tokio::spawn(async move {
        tracing::info!("Connectivity task started");

        loop {
            let reachable = *readings.borrow_and_update();
            if let Err(e) = monitor.report(reachable).await {
                tracing::error!("Connectivity-triggered drain failed: {}", e);
            }
            if readings.changed().await.is_err() {
                break;
            }
        }

        tracing::info!("Connectivity task stopped");
    })
}
