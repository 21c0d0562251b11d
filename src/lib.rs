//! # shardvisor
//!
//! **Shardvisor** brings up a local sharded, replicated document-database
//! cluster and keeps it supervised.
//!
//! It starts one config server, `shards × replicas` data servers and a query
//! router as child processes, forms the replica sets and the shard map, creates
//! and shards the target database, then runs an optional setup hook. Every
//! server is registered by name and can be killed independently. The crate is
//! meant for integration tests and local tooling that need a real cluster
//! without operator steps.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!                      ┌──────────────────────────────┐
//!                      │ ClusterSpec (binaries, dir,  │
//!                      │ shards, replicas, database)  │
//!                      └──────────────┬───────────────┘
//!                                     ▼
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Cluster (orchestrator)                                           │
//! │  - Registry (service name → cancellation token)                   │
//! │  - Bus (broadcast events)                                         │
//! │  - StartupLatch (config replica set initiated)                    │
//! └──────┬──────────────────┬──────────────────────────────┬──────────┘
//!        ▼                  ▼                              ▼
//!   ┌──────────┐   ┌─────────────────┐            ┌───────────────┐
//!   │   cfg    │   │ data-<s>-<r>    │ × S×R      │    routing    │
//!   │run_server│   │ run_server      │            │  run_server   │
//!   └────┬─────┘   └────────┬────────┘            └───────┬───────┘
//!        │                  │                             │
//!        │  process leg: spawn ─► LogProxy ─► wait / kill │
//!        │  client leg:  connect ─► ensure_server ─► OnReady
//!        ▼                  ▼                             ▼
//!   replSetInitiate    InitGate per shard:          addShard × S
//!   latch.open()       first member initiates       create <db>._init
//!                                                   enableSharding
//!                                                   setup hook
//! ```
//!
//! ### Lifecycle
//! ```text
//! Cluster::run(ctx)
//!   ├─► config stage: run_server(cfg) ─► ready ─► initiate rsConfig ─► latch.open()
//!   ├─► data stage:   latch.wait() ─► run_server(data-*) ─► first ready member initiates rsData<s>
//!   └─► router stage: latch.wait() ─► run_server(routing) ─► shards, database, sharding, hook
//!
//! exit conditions:
//!   - ctx cancelled                       ─► Err(Canceled), every process killed
//!   - any fatal error (spawn, exit, timeout, command, hook) ─► whole tree cancelled
//!   - Cluster::kill(name)                 ─► only that server stops, directory removed
//! ```
//!
//! ## Features
//! | Area              | Description                                                  | Key types / traits                        |
//! |-------------------|--------------------------------------------------------------|-------------------------------------------|
//! | **Orchestration** | Staged bring-up, kill by name, lifecycle events.             | [`Cluster`], [`ClusterBuilder`]           |
//! | **Configuration** | Cluster shape, binaries, deadlines.                          | [`ClusterSpec`], [`ProbePolicy`]          |
//! | **Client seam**   | Admin operations the bring-up needs from a database driver.  | [`AdminClient`], [`Connector`]            |
//! | **Setup**         | Caller-supplied step run once the cluster is formed.         | [`SetupHook`], [`SetupFn`]                |
//! | **Processes**     | How servers are launched.                                    | [`Launcher`], [`BinaryLauncher`]          |
//! | **Logs**          | Server JSON logs re-emitted through `tracing`.               | [`LogRecord`], [`LogProxy`]               |
//! | **Errors**        | Typed errors for bring-up and client operations.             | [`ClusterError`], [`ClientError`]         |
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use shardvisor::{Cluster, ClusterSpec, Connector};
//!
//! # async fn example(connector: Arc<dyn Connector>) -> Result<(), shardvisor::ClusterError> {
//! let spec = ClusterSpec::builder()
//!     .dir("/tmp/cluster")
//!     .shards(2)
//!     .replicas(3)
//!     .build()?;
//!
//! let cluster = Arc::new(Cluster::new(spec, connector)?);
//! let ctx = CancellationToken::new();
//!
//! let runner = {
//!     let cluster = cluster.clone();
//!     let ctx = ctx.clone();
//!     tokio::spawn(async move { cluster.run(&ctx).await })
//! };
//!
//! // ... talk to cluster.router_addr() ...
//!
//! ctx.cancel();
//! let _ = runner.await;
//! # Ok(())
//! # }
//! ```
mod client;
mod config;
mod core;
mod error;
mod events;
mod logs;
mod policies;
mod setup;

// ---- Public re-exports ----

pub use client::commands;
pub use client::{AdminClient, ClientRef, Connector, Document};
pub use config::{ClusterSpec, ClusterSpecBuilder};
pub use core::{
    BinaryLauncher, Cluster, ClusterBuilder, Launch, Launcher, ReplicaSetSpec, ServerRole,
    Topology,
};
pub use error::{BoxError, ClientError, ClusterError, Stage};
pub use events::{Event, EventKind};
pub use logs::{IngestStats, LogProxy, LogRecord, MAX_LINE_BYTES, Severity};
pub use policies::{JitterPolicy, ProbePolicy};
pub use setup::{SetupFn, SetupHook, SetupRef};
