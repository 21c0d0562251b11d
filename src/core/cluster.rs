//! # Cluster orchestration.
//!
//! [`Cluster`] brings a sharded topology up in stages and keeps every server
//! supervised until the caller's token is cancelled.
//!
//! ```text
//! run(ctx)
//!   └─► TaskGroup(ctx)
//!         ├─ config stage:  run_server(cfg)
//!         │                   └─ ConfigReady: replSetInitiate(rsConfig) ─► latch.open()
//!         ├─ data stage:    latch.wait() ─► TaskGroup
//!         │                   └─ run_server(data-<s>-<r>) × shards × replicas
//!         │                        └─ ShardReady: gate[s].fire(replSetInitiate(rsData<s>))
//!         └─ routing stage: latch.wait() ─► run_server(routing)
//!                             └─ RouterReady: addShard × shards
//!                                              ─► create <db>._init
//!                                              ─► enableSharding(<db>)
//!                                              ─► setup hook
//! ```
//!
//! ## Rules
//! - No data server or router starts before the config replica set is initiated.
//! - Each shard's `replSetInitiate` runs once, from whichever member is ready first.
//! - The router steps run strictly in the order above.
//! - The first fatal error anywhere cancels the whole tree and is returned.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use super::group::TaskGroup;
use super::launcher::{BinaryLauncher, Launcher};
use super::registry::Registry;
use super::server::{OnReady, OnReadyRef, ServerOptions, ServerRole, ServerRuntime};
use super::sync::{InitGate, LatchOutcome, LatchState, StartupLatch};
use super::topology::{CONFIG_SERVICE, ROUTER_SERVICE, ReplicaSetSpec, Topology};
use crate::client::commands::{self, ADMIN_DB, PLACEHOLDER_COLLECTION};
use crate::client::{AdminClient, ClientRef, Connector, Document};
use crate::config::ClusterSpec;
use crate::error::{ClusterError, Result, Stage};
use crate::events::{Bus, Event, EventKind};
use crate::setup::SetupRef;

/// Builder for a [`Cluster`] with optional collaborators.
pub struct ClusterBuilder {
    spec: ClusterSpec,
    connector: Arc<dyn Connector>,
    launcher: Option<Arc<dyn Launcher>>,
}

impl ClusterBuilder {
    /// Creates a builder; `connector` creates the admin clients.
    pub fn new(spec: ClusterSpec, connector: Arc<dyn Connector>) -> Self {
        Self {
            spec,
            connector,
            launcher: None,
        }
    }

    /// Replaces the default [`BinaryLauncher`].
    pub fn launcher(mut self, launcher: Arc<dyn Launcher>) -> Self {
        self.launcher = Some(launcher);
        self
    }

    /// Validates the spec and builds the cluster.
    pub fn build(self) -> Result<Cluster> {
        self.spec.validate()?;

        let runtime = ServerRuntime {
            registry: Arc::new(Registry::new()),
            bus: Bus::new(self.spec.bus_capacity),
            connector: self.connector,
            launcher: self
                .launcher
                .unwrap_or_else(|| Arc::new(BinaryLauncher) as Arc<dyn Launcher>),
            cache_gb: self.spec.cache_size_hint(),
            setup_timeout: self.spec.setup_timeout,
            probe: self.spec.probe,
        };

        Ok(Cluster {
            topology: self.spec.topology(),
            spec: Arc::new(self.spec),
            runtime: Arc::new(runtime),
            barrier: Arc::new(StartupLatch::new()),
        })
    }
}

/// Sharded cluster bring-up engine.
///
/// One instance drives one bring-up; [`services`](Cluster::services) and
/// [`kill`](Cluster::kill) may be called concurrently with [`run`](Cluster::run).
pub struct Cluster {
    spec: Arc<ClusterSpec>,
    topology: Topology,
    runtime: Arc<ServerRuntime>,
    barrier: Arc<StartupLatch>,
}

impl Cluster {
    /// Starts a builder.
    pub fn builder(spec: ClusterSpec, connector: Arc<dyn Connector>) -> ClusterBuilder {
        ClusterBuilder::new(spec, connector)
    }

    /// Builds a cluster with the default launcher.
    pub fn new(spec: ClusterSpec, connector: Arc<dyn Connector>) -> Result<Self> {
        Self::builder(spec, connector).build()
    }

    /// Brings the cluster up and supervises it until `ctx` is cancelled.
    ///
    /// Returns [`ClusterError::Canceled`] after a cancellation, or the first
    /// fatal error of any stage.
    pub async fn run(&self, ctx: &CancellationToken) -> Result<()> {
        tracing::info!(
            shards = self.topology.shards(),
            replicas = self.topology.replicas(),
            dir = %self.spec.dir.display(),
            "Starting cluster"
        );
        let res = self.ensure(ctx).await;
        match &res {
            Ok(()) => tracing::info!("Cluster stopped"),
            Err(ClusterError::Canceled) => tracing::info!("Cluster canceled"),
            Err(e) => tracing::error!(error = %e, label = e.as_label(), "Cluster failed"),
        }
        res
    }

    async fn ensure(&self, ctx: &CancellationToken) -> Result<()> {
        let latch = self.barrier.clone();
        let mut group = TaskGroup::new(ctx);
        let scope = group.token().clone();

        let config = ServerOptions::stateful(
            ServerRole::Config,
            self.spec.mongod.clone(),
            CONFIG_SERVICE,
            self.topology.config_addr(),
            self.topology.config_replica_set().name(),
            self.spec.dir.clone(),
            Arc::new(ConfigReady {
                replica_set: self.topology.config_replica_set(),
                latch: latch.clone(),
                bus: self.runtime.bus.clone(),
            }),
        );
        group.spawn(self.runtime.clone().run_server(scope.clone(), config));

        group.spawn(data_stage(
            self.runtime.clone(),
            self.spec.clone(),
            self.topology,
            scope.clone(),
            latch.clone(),
        ));

        let router = ServerOptions::routing(
            self.spec.mongos.clone(),
            ROUTER_SERVICE,
            self.topology.router_addr(),
            self.topology.config_replica_set().seed_list(),
            self.spec.dir.clone(),
            Arc::new(RouterReady {
                shards: self.topology.shard_replica_sets(),
                database: self.spec.database.clone(),
                setup: self.spec.on_setup.clone(),
                bus: self.runtime.bus.clone(),
            }),
        );
        group.spawn(routing_stage(self.runtime.clone(), scope, latch, router));

        group.wait().await
    }

    /// Sorted names of every registered service.
    pub async fn services(&self) -> Vec<String> {
        self.runtime.registry.list().await
    }

    /// Stops one service: its process is killed and its state directory removed.
    ///
    /// Returns [`ClusterError::ServiceNotFound`] if no service has this name.
    ///
    /// Killing `cfg` before its replica set is initiated leaves the data and
    /// routing stages waiting on the startup barrier; [`run`](Cluster::run)
    /// then returns only when its token is cancelled.
    pub async fn kill(&self, name: &str) -> Result<()> {
        self.runtime.registry.kill(name).await?;
        tracing::info!(service = name, "Service killed");
        if name == CONFIG_SERVICE && self.barrier.state() == LatchState::Closed {
            tracing::warn!(
                service = name,
                "Config server killed before initiation; data and routing stages stalled"
            );
        }
        self.runtime
            .bus
            .publish(Event::new(EventKind::ServiceKilled).with_service(name));
        Ok(())
    }

    /// Subscribes to lifecycle events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.runtime.bus.subscribe()
    }

    /// Address plan.
    pub fn topology(&self) -> Topology {
        self.topology
    }

    /// Spec the cluster was built from.
    pub fn spec(&self) -> &ClusterSpec {
        &self.spec
    }

    /// Address clients should connect to once the cluster is up.
    pub fn router_addr(&self) -> SocketAddr {
        self.topology.router_addr()
    }
}

async fn data_stage(
    runtime: Arc<ServerRuntime>,
    spec: Arc<ClusterSpec>,
    topology: Topology,
    scope: CancellationToken,
    latch: Arc<StartupLatch>,
) -> Result<()> {
    if latch.wait(&scope).await == LatchOutcome::Canceled {
        return Err(ClusterError::Canceled);
    }
    tracing::info!(shards = topology.shards(), "Starting data servers");

    let mut group = TaskGroup::new(&scope);
    let token = group.token().clone();
    for shard in 0..topology.shards() {
        let replica_set = Arc::new(topology.shard_replica_set(shard));
        let hook: OnReadyRef = Arc::new(ShardReady {
            replica_set: replica_set.clone(),
            gate: InitGate::new(),
            bus: runtime.bus.clone(),
        });
        for replica in 0..topology.replicas() {
            let opts = ServerOptions::stateful(
                ServerRole::Data,
                spec.mongod.clone(),
                topology.data_service(shard, replica),
                topology.data_addr(shard, replica),
                replica_set.name(),
                spec.dir.clone(),
                hook.clone(),
            );
            group.spawn(runtime.clone().run_server(token.clone(), opts));
        }
    }
    group.wait().await
}

async fn routing_stage(
    runtime: Arc<ServerRuntime>,
    scope: CancellationToken,
    latch: Arc<StartupLatch>,
    router: ServerOptions,
) -> Result<()> {
    if latch.wait(&scope).await == LatchOutcome::Canceled {
        return Err(ClusterError::Canceled);
    }
    runtime.run_server(scope, router).await
}

/// Runs an admin command and checks its reply.
async fn admin_command(
    client: &dyn AdminClient,
    service: &str,
    stage: Stage,
    command: Document,
) -> Result<Document> {
    let name = commands::command_name(&command).to_string();
    tracing::debug!(command = %name, "Running admin command");
    client
        .run_command(ADMIN_DB, command)
        .await
        .and_then(|reply| commands::check_reply(&name, reply))
        .map_err(|source| ClusterError::command(service, stage, source))
}

async fn initiate(client: &dyn AdminClient, service: &str, rs: &ReplicaSetSpec) -> Result<()> {
    admin_command(
        client,
        service,
        Stage::ReplicaSetInitiate,
        commands::replset_initiate(rs),
    )
    .await?;
    Ok(())
}

/// Config server: initiate `rsConfig`, then release the other stages.
struct ConfigReady {
    replica_set: ReplicaSetSpec,
    latch: Arc<StartupLatch>,
    bus: Bus,
}

#[async_trait]
impl OnReady for ConfigReady {
    async fn on_ready(
        &self,
        service: &str,
        _scope: CancellationToken,
        client: ClientRef,
    ) -> Result<()> {
        initiate(client.as_ref(), service, &self.replica_set).await?;
        tracing::info!(replica_set = self.replica_set.name(), "Config replica set initialized");
        self.bus.publish(
            Event::new(EventKind::ReplicaSetInitiated)
                .with_service(service)
                .with_replica_set(self.replica_set.name()),
        );

        self.latch.open();
        self.bus.publish(Event::new(EventKind::StartupBarrierOpened));
        Ok(())
    }
}

/// Shard member: the first ready member initiates the shard's replica set.
struct ShardReady {
    replica_set: Arc<ReplicaSetSpec>,
    gate: InitGate,
    bus: Bus,
}

#[async_trait]
impl OnReady for ShardReady {
    async fn on_ready(
        &self,
        service: &str,
        _scope: CancellationToken,
        client: ClientRef,
    ) -> Result<()> {
        let fired = self
            .gate
            .fire(|| initiate(client.as_ref(), service, &self.replica_set))
            .await;
        match fired {
            Some(res) => {
                res?;
                tracing::info!(
                    replica_set = self.replica_set.name(),
                    members = self.replica_set.members().len(),
                    "Replica set initialized"
                );
                self.bus.publish(
                    Event::new(EventKind::ReplicaSetInitiated)
                        .with_service(service)
                        .with_replica_set(self.replica_set.name()),
                );
            }
            None => tracing::debug!(
                replica_set = self.replica_set.name(),
                "Replica set already initiated"
            ),
        }
        Ok(())
    }
}

/// Router: register shards, create and shard the database, run the setup hook.
struct RouterReady {
    shards: Vec<ReplicaSetSpec>,
    database: String,
    setup: Option<SetupRef>,
    bus: Bus,
}

#[async_trait]
impl OnReady for RouterReady {
    async fn on_ready(
        &self,
        service: &str,
        scope: CancellationToken,
        client: ClientRef,
    ) -> Result<()> {
        for rs in &self.shards {
            let cmd = commands::add_shard(rs);
            admin_command(client.as_ref(), service, Stage::AddShard, cmd).await?;
            tracing::debug!(shard = %rs, "Shard added");
            self.bus
                .publish(Event::new(EventKind::ShardAdded).with_replica_set(rs.name()));
        }
        tracing::info!(count = self.shards.len(), "Shards added");

        let db = self.database.as_str();
        tracing::info!(db, "Initializing database");
        client
            .create_collection(db, PLACEHOLDER_COLLECTION)
            .await
            .map_err(|source| ClusterError::command(service, Stage::CreateDatabase, source))?;
        self.bus
            .publish(Event::new(EventKind::DatabaseCreated).with_reason(db));

        tracing::info!(db, "Enabling sharding");
        admin_command(
            client.as_ref(),
            service,
            Stage::EnableSharding,
            commands::enable_sharding(db),
        )
        .await?;
        tracing::info!(db, "Sharding enabled");
        self.bus
            .publish(Event::new(EventKind::ShardingEnabled).with_reason(db));

        if let Some(hook) = &self.setup {
            tracing::info!(hook = hook.name(), "Running setup hook");
            hook.setup(scope, client)
                .await
                .map_err(|source| ClusterError::Setup { source })?;
        }
        tracing::info!("Cluster ready");
        self.bus.publish(Event::new(EventKind::SetupCompleted));
        Ok(())
    }
}
