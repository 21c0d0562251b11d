//! Runtime core: orchestration and process supervision.
//!
//! The public entry point is [`Cluster`], which stages the bring-up and owns
//! the service registry.
//!
//! Internal modules:
//! - [`cluster`]: staged bring-up and the role-specific readiness hooks;
//! - [`server`]: supervises one server process and its admin client;
//! - [`probe`]: readiness probing under a deadline;
//! - [`registry`]: name → cancellation handle, for listing and killing;
//! - [`group`]: task group where the first error cancels the rest;
//! - [`sync`]: per-shard init gate and the config startup latch;
//! - [`state_dir`]: per-instance state directory guard;
//! - [`launcher`]: turns a launch description into a process command;
//! - [`topology`]: fixed loopback address plan.

mod cluster;
mod group;
mod launcher;
mod probe;
mod registry;
mod server;
mod state_dir;
mod sync;
pub(crate) mod topology;

pub use cluster::{Cluster, ClusterBuilder};
pub use launcher::{BinaryLauncher, Launch, Launcher};
pub use server::ServerRole;
pub use topology::{ReplicaSetSpec, Topology};
