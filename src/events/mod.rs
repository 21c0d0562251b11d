//! Cluster events: types and broadcast bus.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] event classification and payload metadata
//! - [`Bus`] thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `core::server::run_server`, the readiness hooks in
//!   `core::cluster`, and `Cluster::kill`.
//! - **Consumers**: receivers handed out by `Cluster::subscribe()`.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
