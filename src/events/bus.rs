//! # Event bus for cluster lifecycle events.
//!
//! [`Bus`] wraps [`tokio::sync::broadcast`]: every server supervisor and the
//! orchestrator publish into it, and any number of observers subscribe
//! through [`Cluster::subscribe`](crate::Cluster::subscribe).
//!
//! ```text
//! Publishers (many):                 Observers (any):
//!   run_server(cfg)    ──┐
//!   run_server(data-*) ──┼──► Bus ──► Cluster::subscribe() receivers
//!   router hook        ──┤  (broadcast chan)
//!   Cluster::kill      ──┘
//! ```
//!
//! ## Rules
//! - `publish()` never blocks; events sent with no receivers are dropped.
//! - A single ring buffer is shared by all receivers; laggards observe
//!   `RecvError::Lagged(n)` and skip the `n` oldest events.

use tokio::sync::broadcast;

use super::event::Event;

/// Broadcast channel for cluster events.
///
/// Cheap to clone (holds an `Arc`-backed sender).
#[derive(Clone, Debug)]
pub struct Bus {
    tx: broadcast::Sender<Event>,
}

impl Bus {
    /// Creates a new bus; capacity is clamped to at least 1.
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel::<Event>(capacity.max(1));
        Self { tx }
    }

    /// Publishes an event to all current receivers.
    pub fn publish(&self, ev: Event) {
        let _ = self.tx.send(ev);
    }

    /// Creates a receiver that observes events sent after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.tx.subscribe()
    }
}
