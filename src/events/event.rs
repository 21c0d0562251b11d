//! # Lifecycle events emitted while the cluster comes up.
//!
//! The [`EventKind`] enum classifies event types across three categories:
//! - **Server events**: one supervised process (starting, spawned, ready, stopped, failed, killed)
//! - **Topology events**: replica-set initiation, the startup barrier, shard registration
//! - **Database events**: database creation, sharding enablement, setup completion
//!
//! The [`Event`] struct carries additional metadata such as timestamps, the
//! service name, the replica set and a failure reason.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases monotonically.
//! Use `seq` to restore the exact order when events are delivered out of order.
//!
//! ## Example
//! ```rust
//! use shardvisor::{Event, EventKind};
//!
//! let ev = Event::new(EventKind::ReplicaSetInitiated)
//!     .with_service("data-0-1")
//!     .with_replica_set("rsData0");
//!
//! assert_eq!(ev.kind, EventKind::ReplicaSetInitiated);
//! assert_eq!(ev.service.as_deref(), Some("data-0-1"));
//! assert_eq!(ev.replica_set.as_deref(), Some("rsData0"));
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

use crate::core::ServerRole;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of cluster events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Server events ===
    /// Supervisor accepted a server and is preparing its launch.
    ///
    /// Sets: `service`, `role`.
    ServerStarting,

    /// Server process was spawned.
    ///
    /// Sets: `service`, `role`.
    ProcessSpawned,

    /// Server answered a ping.
    ///
    /// Sets: `service`.
    ServerReady,

    /// Server process exited cleanly or was stopped through its scope.
    ///
    /// Sets: `service`.
    ServerStopped,

    /// Server supervision ended with an error.
    ///
    /// Sets: `service`, `reason`.
    ServerFailed,

    /// Service was cancelled through [`Cluster::kill`](crate::Cluster::kill).
    ///
    /// Sets: `service`.
    ServiceKilled,

    // === Topology events ===
    /// `replSetInitiate` succeeded.
    ///
    /// Sets: `service` (member that issued it), `replica_set`.
    ReplicaSetInitiated,

    /// Config replica set is ready; data servers and router may start.
    StartupBarrierOpened,

    /// Shard was registered on the router.
    ///
    /// Sets: `replica_set`.
    ShardAdded,

    // === Database events ===
    /// Target database was created.
    ///
    /// Sets: `reason` (database name).
    DatabaseCreated,

    /// Sharding was enabled for the target database.
    ///
    /// Sets: `reason` (database name).
    ShardingEnabled,

    /// Setup hook finished; the cluster is fully formed.
    SetupCompleted,
}

/// Cluster event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,
    /// Logical service name, if applicable.
    pub service: Option<Arc<str>>,
    /// Server role, if applicable.
    pub role: Option<ServerRole>,
    /// Replica set name, if applicable.
    pub replica_set: Option<Arc<str>>,
    /// Human-readable reason (errors, database name).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            service: None,
            role: None,
            replica_set: None,
            reason: None,
        }
    }

    /// Attaches a service name.
    #[inline]
    pub fn with_service(mut self, service: impl Into<Arc<str>>) -> Self {
        self.service = Some(service.into());
        self
    }

    /// Attaches a server role.
    #[inline]
    pub fn with_role(mut self, role: ServerRole) -> Self {
        self.role = Some(role);
        self
    }

    /// Attaches a replica set name.
    #[inline]
    pub fn with_replica_set(mut self, rs: impl Into<Arc<str>>) -> Self {
        self.replica_set = Some(rs.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// True if this event concerns the given service.
    #[inline]
    pub fn is_for(&self, service: &str) -> bool {
        self.service.as_deref() == Some(service)
    }
}
