//! # Administrative client seam.
//!
//! The database driver is an external collaborator. The runtime only needs:
//! - a direct, single-address connection ([`Connector::connect`]);
//! - `ping` for readiness probing;
//! - arbitrary admin commands against a named database (`replSetInitiate`,
//!   `addShard`, `enableSharding`);
//! - collection creation inside a named database.
//!
//! Documents are plain [`serde_json::Value`]s; the [`commands`] module builds
//! the ones the bring-up issues.
//!
//! ## Implementing a client
//! ```no_run
//! use std::net::SocketAddr;
//! use std::sync::Arc;
//! use async_trait::async_trait;
//! use shardvisor::{AdminClient, ClientError, ClientRef, Connector, Document};
//!
//! struct Driver;
//!
//! #[async_trait]
//! impl AdminClient for Driver {
//!     async fn ping(&self) -> Result<(), ClientError> { Ok(()) }
//!     async fn run_command(&self, _db: &str, _cmd: Document) -> Result<Document, ClientError> {
//!         Ok(serde_json::json!({ "ok": 1 }))
//!     }
//!     async fn create_collection(&self, _db: &str, _name: &str) -> Result<(), ClientError> { Ok(()) }
//!     async fn disconnect(&self) {}
//! }
//!
//! struct DriverConnector;
//!
//! #[async_trait]
//! impl Connector for DriverConnector {
//!     async fn connect(&self, _addr: SocketAddr) -> Result<ClientRef, ClientError> {
//!         Ok(Arc::new(Driver))
//!     }
//! }
//! ```

pub mod commands;

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::ClientError;

/// Command and reply document.
pub type Document = serde_json::Value;

/// Shared handle to a connected admin client.
pub type ClientRef = Arc<dyn AdminClient>;

/// # Administrative client bound to one server address.
#[async_trait]
pub trait AdminClient: Send + Sync + 'static {
    /// Round-trips a ping to the server.
    ///
    /// The caller bounds every call with its own timeout.
    async fn ping(&self) -> Result<(), ClientError>;

    /// Runs `command` against database `db` and returns the reply.
    async fn run_command(&self, db: &str, command: Document) -> Result<Document, ClientError>;

    /// Creates collection `name` inside database `db`.
    async fn create_collection(&self, db: &str, name: &str) -> Result<(), ClientError>;

    /// Releases the connection. Errors are not reported.
    async fn disconnect(&self);
}

/// # Factory of direct connections.
///
/// `connect` runs concurrently with the server process start, so it must not
/// wait for the server to accept connections; that is the readiness prober's job.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    /// Creates a client talking directly to `addr` (no topology discovery).
    async fn connect(&self, addr: SocketAddr) -> Result<ClientRef, ClientError>;
}
