//! # Cluster specification.
//!
//! [`ClusterSpec`] centralizes everything the bring-up needs: binaries, the
//! base directory, the target database, the shape of the cluster and the
//! readiness settings. It is built once, validated, and handed to
//! [`Cluster::new`](crate::Cluster::new), which never mutates it.
//!
//! ## Sentinel values
//! - `max_cache_gb = 0.0` → no `--wiredTigerCacheSizeGB` flag
//! - `on_setup = None` → nothing runs after sharding is enabled

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::core::Topology;
use crate::core::topology::{CONFIG_PORT, ROUTER_PORT, data_port};
use crate::error::{ClusterError, Result};
use crate::policies::ProbePolicy;
use crate::setup::SetupRef;

/// Cluster specification.
///
/// ## Field semantics
/// - `mongod`: binary for Data and Config servers
/// - `mongos`: binary for the Routing server
/// - `dir`: base directory; each stateful server gets `<dir>/<service>/`
/// - `database`: database created and sharded on the router
/// - `replicas`, `shards`: cluster shape (`>= 1` each)
/// - `max_cache_gb`: storage cache hint (`0.0` = engine default)
/// - `setup_timeout`: readiness deadline per server
/// - `probe`: readiness probe interval/attempt timeout
/// - `bus_capacity`: event bus ring buffer size (min 1)
/// - `on_setup`: optional hook run on the router once the cluster is formed
#[derive(Clone)]
pub struct ClusterSpec {
    /// Data/config server binary path.
    pub mongod: PathBuf,
    /// Routing server binary path.
    pub mongos: PathBuf,
    /// Base directory for server state.
    pub dir: PathBuf,
    /// Target database name.
    pub database: String,
    /// Members per shard replica set.
    pub replicas: u16,
    /// Number of shards.
    pub shards: u16,
    /// Storage cache size hint in GB.
    pub max_cache_gb: f64,
    /// Deadline for a freshly started server to answer a ping.
    pub setup_timeout: Duration,
    /// Readiness probe policy.
    pub probe: ProbePolicy,
    /// Capacity of the event bus.
    pub bus_capacity: usize,
    /// Post-formation setup hook.
    pub on_setup: Option<SetupRef>,
}

impl ClusterSpec {
    /// Starts a builder from [`ClusterSpec::default`].
    pub fn builder() -> ClusterSpecBuilder {
        ClusterSpecBuilder {
            spec: ClusterSpec::default(),
        }
    }

    /// Returns the cache size hint as an `Option`.
    ///
    /// - `None` → leave the engine default
    /// - `Some(gb)` → pass `--wiredTigerCacheSizeGB gb`
    #[inline]
    pub fn cache_size_hint(&self) -> Option<f64> {
        (self.max_cache_gb > 0.0).then_some(self.max_cache_gb)
    }

    /// Returns the address plan derived from `shards` and `replicas`.
    #[inline]
    pub fn topology(&self) -> Topology {
        Topology::new(self.shards, self.replicas)
    }

    /// Checks the spec for values the bring-up cannot work with.
    pub fn validate(&self) -> Result<()> {
        if self.shards == 0 {
            return Err(ClusterError::invalid_spec("shards must be at least 1"));
        }
        if self.replicas == 0 {
            return Err(ClusterError::invalid_spec("replicas must be at least 1"));
        }
        if self.replicas >= 100 {
            return Err(ClusterError::invalid_spec(
                "replicas must be below 100 (ports are spaced by 100 per shard)",
            ));
        }
        if self.database.is_empty() {
            return Err(ClusterError::invalid_spec("database name is empty"));
        }
        if !self.max_cache_gb.is_finite() || self.max_cache_gb < 0.0 {
            return Err(ClusterError::invalid_spec(format!(
                "max_cache_gb must be a non-negative number, got {}",
                self.max_cache_gb
            )));
        }
        if self.setup_timeout.is_zero() {
            return Err(ClusterError::invalid_spec("setup_timeout must be positive"));
        }

        let last = u32::from(self.shards - 1) * 100 + u32::from(self.replicas - 1);
        if u32::from(crate::core::topology::DATA_BASE_PORT) + last > u32::from(u16::MAX) {
            return Err(ClusterError::invalid_spec("data server ports overflow"));
        }
        for s in 0..self.shards {
            for r in 0..self.replicas {
                let port = data_port(s, r);
                if port == ROUTER_PORT || port == CONFIG_PORT {
                    return Err(ClusterError::invalid_spec(format!(
                        "data-{s}-{r} port {port} collides with a fixed service port"
                    )));
                }
            }
        }
        Ok(())
    }
}

impl Default for ClusterSpec {
    /// Default specification:
    ///
    /// - `mongod = "mongod"`, `mongos = "mongos"` (resolved through `PATH`)
    /// - `dir = <tmp>/shardvisor`
    /// - `database = "cloud"`
    /// - `replicas = 1`, `shards = 1`
    /// - `max_cache_gb = 0.0` (engine default)
    /// - `setup_timeout = 30s`
    /// - `probe = ProbePolicy::default()`
    /// - `bus_capacity = 1024`
    fn default() -> Self {
        Self {
            mongod: PathBuf::from("mongod"),
            mongos: PathBuf::from("mongos"),
            dir: std::env::temp_dir().join("shardvisor"),
            database: "cloud".to_string(),
            replicas: 1,
            shards: 1,
            max_cache_gb: 0.0,
            setup_timeout: Duration::from_secs(30),
            probe: ProbePolicy::default(),
            bus_capacity: 1024,
            on_setup: None,
        }
    }
}

impl fmt::Debug for ClusterSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClusterSpec")
            .field("mongod", &self.mongod)
            .field("mongos", &self.mongos)
            .field("dir", &self.dir)
            .field("database", &self.database)
            .field("replicas", &self.replicas)
            .field("shards", &self.shards)
            .field("max_cache_gb", &self.max_cache_gb)
            .field("setup_timeout", &self.setup_timeout)
            .field("probe", &self.probe)
            .field("bus_capacity", &self.bus_capacity)
            .field("on_setup", &self.on_setup.as_ref().map(|h| h.name().to_string()))
            .finish()
    }
}

/// Builder for [`ClusterSpec`].
pub struct ClusterSpecBuilder {
    spec: ClusterSpec,
}

impl ClusterSpecBuilder {
    /// Sets the data/config server binary.
    pub fn mongod(mut self, path: impl Into<PathBuf>) -> Self {
        self.spec.mongod = path.into();
        self
    }

    /// Sets the routing server binary.
    pub fn mongos(mut self, path: impl Into<PathBuf>) -> Self {
        self.spec.mongos = path.into();
        self
    }

    /// Sets the base directory.
    pub fn dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.spec.dir = dir.into();
        self
    }

    /// Sets the target database.
    pub fn database(mut self, name: impl Into<String>) -> Self {
        self.spec.database = name.into();
        self
    }

    /// Sets the number of shards.
    pub fn shards(mut self, n: u16) -> Self {
        self.spec.shards = n;
        self
    }

    /// Sets the members per shard replica set.
    pub fn replicas(mut self, n: u16) -> Self {
        self.spec.replicas = n;
        self
    }

    /// Sets the storage cache hint in GB.
    pub fn max_cache_gb(mut self, gb: f64) -> Self {
        self.spec.max_cache_gb = gb;
        self
    }

    /// Sets the readiness deadline.
    pub fn setup_timeout(mut self, d: Duration) -> Self {
        self.spec.setup_timeout = d;
        self
    }

    /// Sets the readiness probe policy.
    pub fn probe(mut self, probe: ProbePolicy) -> Self {
        self.spec.probe = probe;
        self
    }

    /// Sets the event bus capacity.
    pub fn bus_capacity(mut self, capacity: usize) -> Self {
        self.spec.bus_capacity = capacity;
        self
    }

    /// Sets the post-formation setup hook.
    pub fn on_setup(mut self, hook: SetupRef) -> Self {
        self.spec.on_setup = Some(hook);
        self
    }

    /// Validates and returns the spec.
    pub fn build(self) -> Result<ClusterSpec> {
        self.spec.validate()?;
        Ok(self.spec)
    }
}
