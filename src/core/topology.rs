//! # Fixed loopback network plan and replica-set layout.
//!
//! Every component listens on `127.0.0.1`:
//! ```text
//! cfg           127.0.0.1:28001          replica set rsConfig
//! data-<s>-<r>  127.0.0.1:29000+s*100+r  replica set rsData<s>
//! routing       127.0.0.1:29501          --configdb rsConfig/127.0.0.1:28001
//! ```
//!
//! [`Topology`] derives names, addresses and [`ReplicaSetSpec`]s from the
//! shard and replica counts; it holds no runtime state.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Loopback address every server binds to.
pub const LOOPBACK: IpAddr = IpAddr::V4(Ipv4Addr::LOCALHOST);

/// Config server port.
pub const CONFIG_PORT: u16 = 28001;
/// Router port.
pub const ROUTER_PORT: u16 = 29501;
/// First data server port; shard `s`, replica `r` listens on `DATA_BASE_PORT + s*100 + r`.
pub const DATA_BASE_PORT: u16 = 29000;

/// Config server service name.
pub const CONFIG_SERVICE: &str = "cfg";
/// Router service name.
pub const ROUTER_SERVICE: &str = "routing";
/// Config replica set name.
pub const CONFIG_REPLICA_SET: &str = "rsConfig";
/// Prefix of data replica set names (`rsData0`, `rsData1`, ...).
pub const DATA_REPLICA_SET_PREFIX: &str = "rsData";

/// Logical name plus ordered member list of one replica set.
///
/// Computed once before launch and never mutated.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplicaSetSpec {
    name: String,
    members: Vec<SocketAddr>,
}

impl ReplicaSetSpec {
    /// Creates a replica set spec.
    pub fn new(name: impl Into<String>, members: Vec<SocketAddr>) -> Self {
        Self {
            name: name.into(),
            members,
        }
    }

    /// Replica set name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Members in initiation order (member `_id` is the index).
    pub fn members(&self) -> &[SocketAddr] {
        &self.members
    }

    /// Seed string `name/host1,host2,...` used by `addShard` and `--configdb`.
    pub fn seed_list(&self) -> String {
        let hosts: Vec<String> = self.members.iter().map(|m| m.to_string()).collect();
        format!("{}/{}", self.name, hosts.join(","))
    }
}

impl fmt::Display for ReplicaSetSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.seed_list())
    }
}

/// Deterministic address plan for a cluster of `shards × replicas` data servers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Topology {
    shards: u16,
    replicas: u16,
}

impl Topology {
    /// Creates a plan.
    ///
    /// Counts are validated by [`ClusterSpec::validate`](crate::ClusterSpec::validate).
    pub fn new(shards: u16, replicas: u16) -> Self {
        Self { shards, replicas }
    }

    /// Number of shards.
    pub fn shards(&self) -> u16 {
        self.shards
    }

    /// Members per shard replica set.
    pub fn replicas(&self) -> u16 {
        self.replicas
    }

    /// Config server address.
    pub fn config_addr(&self) -> SocketAddr {
        SocketAddr::new(LOOPBACK, CONFIG_PORT)
    }

    /// Router address.
    pub fn router_addr(&self) -> SocketAddr {
        SocketAddr::new(LOOPBACK, ROUTER_PORT)
    }

    /// Address of replica `replica` in shard `shard`.
    pub fn data_addr(&self, shard: u16, replica: u16) -> SocketAddr {
        SocketAddr::new(LOOPBACK, data_port(shard, replica))
    }

    /// Service name of replica `replica` in shard `shard`.
    pub fn data_service(&self, shard: u16, replica: u16) -> String {
        format!("data-{shard}-{replica}")
    }

    /// Config replica set: the config server is its sole member.
    pub fn config_replica_set(&self) -> ReplicaSetSpec {
        ReplicaSetSpec::new(CONFIG_REPLICA_SET, vec![self.config_addr()])
    }

    /// Replica set of shard `shard` with every member address.
    pub fn shard_replica_set(&self, shard: u16) -> ReplicaSetSpec {
        let members = (0..self.replicas)
            .map(|r| self.data_addr(shard, r))
            .collect();
        ReplicaSetSpec::new(format!("{DATA_REPLICA_SET_PREFIX}{shard}"), members)
    }

    /// All shard replica sets in shard order.
    pub fn shard_replica_sets(&self) -> Vec<ReplicaSetSpec> {
        (0..self.shards).map(|s| self.shard_replica_set(s)).collect()
    }

    /// Every service name the cluster registers, sorted.
    pub fn service_names(&self) -> Vec<String> {
        let mut names = vec![CONFIG_SERVICE.to_string(), ROUTER_SERVICE.to_string()];
        for s in 0..self.shards {
            for r in 0..self.replicas {
                names.push(self.data_service(s, r));
            }
        }
        names.sort_unstable();
        names
    }
}

/// Data server port for shard `shard`, replica `replica`.
///
/// Saturates instead of wrapping; shard/replica counts are bounded by
/// [`ClusterSpec::validate`](crate::ClusterSpec::validate) so that every port is distinct.
pub fn data_port(shard: u16, replica: u16) -> u16 {
    DATA_BASE_PORT
        .saturating_add(shard.saturating_mul(100))
        .saturating_add(replica)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_ports() {
        assert_eq!(data_port(0, 0), 29000);
        assert_eq!(data_port(0, 2), 29002);
        assert_eq!(data_port(3, 1), 29301);
    }

    #[test]
    fn test_shard_replica_set_members() {
        let topo = Topology::new(2, 3);
        let rs = topo.shard_replica_set(1);
        assert_eq!(rs.name(), "rsData1");
        assert_eq!(rs.members().len(), 3);
        assert_eq!(
            rs.seed_list(),
            "rsData1/127.0.0.1:29100,127.0.0.1:29101,127.0.0.1:29102"
        );
    }

    #[test]
    fn test_config_seed_list() {
        let topo = Topology::new(1, 1);
        assert_eq!(topo.config_replica_set().seed_list(), "rsConfig/127.0.0.1:28001");
    }

    #[test]
    fn test_service_names_count_and_order() {
        let topo = Topology::new(2, 2);
        let names = topo.service_names();
        assert_eq!(names.len(), 2 * 2 + 2);
        assert_eq!(
            names,
            vec!["cfg", "data-0-0", "data-0-1", "data-1-0", "data-1-1", "routing"]
        );
    }
}
