//! # Supervise one server process.
//!
//! [`ServerRuntime::run_server`] owns a single `mongod`/`mongos` process from
//! launch to exit and drives an admin client through readiness and the
//! role-specific [`OnReady`] hook.
//!
//! ```text
//! run_server(parent, opts)
//!   ├─► publish ServerStarting
//!   ├─► StateDir::create(<dir>/<name>)          (stateful roles only)
//!   ├─► scope = parent.child_token(); registry.register(name, scope)
//!   └─► TaskGroup(scope)
//!         ├─ process leg: spawn ─► ProcessSpawned ─► LogProxy::attach
//!         │                 └─► wait exit | scope cancelled → kill + reap
//!         └─ client leg:  connect ─► ensure_server ─► ServerReady
//!                           └─► on_ready(client) ─► disconnect
//!   └─► StateDir::remove                        (stateful roles only)
//!
//! result:
//!   Ok                                  → ServerStopped
//!   Canceled, scope killed, parent live → ServerStopped, Ok
//!   Canceled                            → ServerStopped, Canceled
//!   Err(e)                              → ServerFailed, e
//! ```
//!
//! ## Rules
//! - The first failing leg cancels the other.
//! - The state directory outlives both legs. It is removed after the group
//!   finishes, or by its drop guard if `run_server` itself is dropped.
//! - A kill through the registry is a clean stop, not a failure.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, Span};

use super::group::TaskGroup;
use super::launcher::{Launch, Launcher};
use super::probe::ensure_server;
use super::registry::Registry;
use super::state_dir::StateDir;
use crate::client::{ClientRef, Connector};
use crate::error::{ClusterError, Result};
use crate::events::{Bus, Event, EventKind};
use crate::logs::LogProxy;
use crate::policies::ProbePolicy;

/// Time given to the output pipes to reach EOF after the process exited.
const LOG_DRAIN_GRACE: Duration = Duration::from_secs(1);

/// Role of a server in the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServerRole {
    /// Shard replica-set member (`mongod --shardsvr`).
    Data,
    /// Config replica-set member (`mongod --configsvr`).
    Config,
    /// Query router (`mongos`).
    Routing,
}

impl ServerRole {
    /// True for roles that keep on-disk state.
    pub fn is_stateful(&self) -> bool {
        matches!(self, ServerRole::Data | ServerRole::Config)
    }

    /// Returns a short stable label.
    pub fn as_str(&self) -> &'static str {
        match self {
            ServerRole::Data => "data",
            ServerRole::Config => "config",
            ServerRole::Routing => "routing",
        }
    }
}

/// Hook invoked once a server answers pings.
///
/// Runs with the connected client and the server's scope; returning an error
/// fails the server and, through its task group, the bring-up.
#[async_trait]
pub trait OnReady: Send + Sync + 'static {
    /// Performs the role-specific formation step.
    async fn on_ready(
        &self,
        service: &str,
        scope: CancellationToken,
        client: ClientRef,
    ) -> Result<()>;
}

/// Shared handle to a readiness hook.
pub type OnReadyRef = Arc<dyn OnReady>;

/// Everything needed to run one server.
#[derive(Clone)]
pub struct ServerOptions {
    /// Server role.
    pub role: ServerRole,
    /// Binary to execute.
    pub binary: PathBuf,
    /// Logical service name.
    pub name: String,
    /// Bind address.
    pub addr: SocketAddr,
    /// Replica set name (stateful roles).
    pub replica_set: Option<String>,
    /// Base directory; stateful roles use `<dir>/<name>/`.
    pub dir: PathBuf,
    /// Config server seed list `rs/host:port` (routing role).
    pub config_server: Option<String>,
    /// Readiness hook.
    pub on_ready: OnReadyRef,
}

impl ServerOptions {
    /// Options for a stateful server (`Data` or `Config`).
    pub fn stateful(
        role: ServerRole,
        binary: PathBuf,
        name: impl Into<String>,
        addr: SocketAddr,
        replica_set: impl Into<String>,
        dir: PathBuf,
        on_ready: OnReadyRef,
    ) -> Self {
        Self {
            role,
            binary,
            name: name.into(),
            addr,
            replica_set: Some(replica_set.into()),
            dir,
            config_server: None,
            on_ready,
        }
    }

    /// Options for the router.
    pub fn routing(
        binary: PathBuf,
        name: impl Into<String>,
        addr: SocketAddr,
        config_server: impl Into<String>,
        dir: PathBuf,
        on_ready: OnReadyRef,
    ) -> Self {
        Self {
            role: ServerRole::Routing,
            binary,
            name: name.into(),
            addr,
            replica_set: None,
            dir,
            config_server: Some(config_server.into()),
            on_ready,
        }
    }
}

/// Command-line arguments for a server.
///
/// `cache_gb` is only honoured by stateful roles.
pub fn launch_args(opts: &ServerOptions, cache_gb: Option<f64>) -> Vec<String> {
    let mut args = vec![
        "--bind_ip".to_string(),
        opts.addr.ip().to_string(),
        "--port".to_string(),
        opts.addr.port().to_string(),
    ];
    match opts.role {
        ServerRole::Config => args.push("--configsvr".into()),
        ServerRole::Data => args.push("--shardsvr".into()),
        ServerRole::Routing => {}
    }
    if opts.role.is_stateful() {
        if let Some(rs) = &opts.replica_set {
            args.extend(["--replSet".to_string(), rs.clone()]);
        }
        args.extend(["--dbpath".to_string(), ".".to_string()]);
        if let Some(gb) = cache_gb {
            args.extend(["--wiredTigerCacheSizeGB".to_string(), gb.to_string()]);
        }
    }
    if let Some(cfg) = opts.config_server.as_ref().filter(|_| opts.role == ServerRole::Routing) {
        args.extend(["--configdb".to_string(), cfg.clone()]);
    }
    args
}

/// Shared collaborators of every supervised server.
pub(crate) struct ServerRuntime {
    pub(crate) registry: Arc<Registry>,
    pub(crate) bus: Bus,
    pub(crate) connector: Arc<dyn Connector>,
    pub(crate) launcher: Arc<dyn Launcher>,
    pub(crate) cache_gb: Option<f64>,
    pub(crate) setup_timeout: Duration,
    pub(crate) probe: ProbePolicy,
}

impl ServerRuntime {
    /// Runs one server until it exits, fails, is killed or `parent` is cancelled.
    pub(crate) async fn run_server(
        self: Arc<Self>,
        parent: CancellationToken,
        opts: ServerOptions,
    ) -> Result<()> {
        let span = tracing::info_span!("server", name = %opts.name, role = opts.role.as_str());
        self.supervise(parent, opts).instrument(span).await
    }

    async fn supervise(
        self: Arc<Self>,
        parent: CancellationToken,
        opts: ServerOptions,
    ) -> Result<()> {
        let name = opts.name.clone();
        self.bus.publish(
            Event::new(EventKind::ServerStarting)
                .with_service(name.as_str())
                .with_role(opts.role),
        );

        let scope = parent.child_token();
        let res = match self.clone().serve(&scope, opts).await {
            Err(ClusterError::Canceled) if scope.is_cancelled() && !parent.is_cancelled() => {
                tracing::info!("Server killed");
                Ok(())
            }
            other => other,
        };

        match &res {
            Ok(()) | Err(ClusterError::Canceled) => {
                self.bus
                    .publish(Event::new(EventKind::ServerStopped).with_service(name.as_str()));
            }
            Err(e) => {
                tracing::error!(error = %e, label = e.as_label(), "Server failed");
                self.bus.publish(
                    Event::new(EventKind::ServerFailed)
                        .with_service(name.as_str())
                        .with_reason(e.to_string()),
                );
            }
        }
        res
    }

    async fn serve(self: Arc<Self>, scope: &CancellationToken, opts: ServerOptions) -> Result<()> {
        let state = if opts.role.is_stateful() {
            let dir = StateDir::create(&opts.dir, &opts.name)
                .await
                .map_err(|source| ClusterError::StateDir {
                    service: opts.name.clone(),
                    path: opts.dir.join(&opts.name),
                    source,
                })?;
            tracing::debug!(dir = %dir.path().display(), "State directory ready");
            Some(dir)
        } else {
            None
        };

        let launch = Launch {
            service: opts.name.clone(),
            role: opts.role,
            binary: opts.binary.clone(),
            args: launch_args(&opts, self.cache_gb),
            dir: state.as_ref().map(|d| d.path().to_path_buf()),
        };

        self.registry.register(&opts.name, scope.clone()).await;

        let mut group = TaskGroup::new(scope);
        let token = group.token().clone();
        group.spawn(
            self.clone()
                .process_leg(token.clone(), launch)
                .instrument(Span::current()),
        );
        group.spawn(
            self.clone()
                .client_leg(token, opts)
                .instrument(Span::current()),
        );
        let res = group.wait().await;

        if let Some(dir) = state {
            dir.remove().await;
        }
        res
    }

    async fn process_leg(self: Arc<Self>, token: CancellationToken, launch: Launch) -> Result<()> {
        let mut cmd = self.launcher.command(&launch);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| ClusterError::Spawn {
            service: launch.service.clone(),
            binary: launch.binary.clone(),
            source,
        })?;
        tracing::debug!(pid = child.id(), args = ?launch.args, "Process spawned");
        self.bus.publish(
            Event::new(EventKind::ProcessSpawned)
                .with_service(launch.service.as_str())
                .with_role(launch.role),
        );

        let proxy = LogProxy::attach(Span::current(), child.stdout.take(), child.stderr.take());

        let exit = tokio::select! {
            biased;
            _ = token.cancelled() => None,
            status = child.wait() => Some(status),
        };

        let res = match exit {
            None => {
                if let Err(e) = child.start_kill() {
                    tracing::debug!(error = %e, "Kill failed");
                }
                if let Err(e) = child.wait().await {
                    tracing::warn!(error = %e, "Failed to reap killed process");
                }
                Err(ClusterError::Canceled)
            }
            Some(Ok(status)) if status.success() => {
                tracing::info!(%status, "Process exited");
                Ok(())
            }
            Some(Ok(status)) => Err(ClusterError::ProcessExited {
                service: launch.service.clone(),
                status,
            }),
            Some(Err(source)) => Err(ClusterError::Wait {
                service: launch.service.clone(),
                source,
            }),
        };

        let stats = proxy.drain(LOG_DRAIN_GRACE).await;
        tracing::debug!(
            records = stats.records,
            malformed = stats.malformed,
            "Log ingestion stopped"
        );
        res
    }

    async fn client_leg(
        self: Arc<Self>,
        token: CancellationToken,
        opts: ServerOptions,
    ) -> Result<()> {
        let client = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(ClusterError::Canceled),
            res = self.connector.connect(opts.addr) => res.map_err(|source| ClusterError::Connect {
                service: opts.name.clone(),
                source,
            })?,
        };

        let res = self.drive(&token, &opts, client.clone()).await;
        client.disconnect().await;
        tracing::info!("Disconnected");
        res
    }

    async fn drive(
        &self,
        token: &CancellationToken,
        opts: &ServerOptions,
        client: ClientRef,
    ) -> Result<()> {
        ensure_server(
            token,
            &opts.name,
            client.as_ref(),
            self.setup_timeout,
            &self.probe,
        )
        .await?;
        self.bus
            .publish(Event::new(EventKind::ServerReady).with_service(opts.name.as_str()));

        tokio::select! {
            biased;
            _ = token.cancelled() => Err(ClusterError::Canceled),
            res = opts.on_ready.on_ready(&opts.name, token.clone(), client) => res,
        }
    }
}
