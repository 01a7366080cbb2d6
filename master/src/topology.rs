//! Cluster topology model.
//!
//! One [`Cluster`] tracks the membership of a single keyspace/datacenter
//! pair. [`ClusterSnapshot`] is the immutable view pushed to clients so
//! they can reconstruct authoritative state without polling.

use std::collections::BTreeMap;

use vireo_common::{DatacenterName, KeyspaceName, ServerAddress};

/// One store server's participation in a cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterNode {
    pub server: ServerAddress,
    /// Shards hosted by this server, primary first.
    pub shard_ids: Vec<u32>,
}

/// A full immutable view of one keyspace/datacenter cluster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterSnapshot {
    pub keyspace: KeyspaceName,
    pub datacenter: DatacenterName,
    /// The cluster size the topology is converging toward.
    pub expected_size: u32,
    /// Member nodes ordered by server address.
    pub nodes: Vec<ClusterNode>,
}

/// Mutable membership state for one keyspace/datacenter cluster.
#[derive(Debug, Clone)]
pub struct Cluster {
    keyspace: KeyspaceName,
    datacenter: DatacenterName,
    expected_size: u32,
    nodes: BTreeMap<ServerAddress, ClusterNode>,
}

impl Cluster {
    pub fn new(keyspace: KeyspaceName, datacenter: DatacenterName, expected_size: u32) -> Self {
        Self {
            keyspace,
            datacenter,
            expected_size,
            nodes: BTreeMap::new(),
        }
    }

    pub fn keyspace(&self) -> &KeyspaceName {
        &self.keyspace
    }

    pub fn datacenter(&self) -> &DatacenterName {
        &self.datacenter
    }

    pub fn expected_size(&self) -> u32 {
        self.expected_size
    }

    /// Records `node` as a member, replacing any previous entry for the
    /// same server. Returns the previous entry if one existed.
    pub fn upsert_node(&mut self, node: ClusterNode) -> Option<ClusterNode> {
        self.nodes.insert(node.server.clone(), node)
    }

    /// Removes the member with address `server`, returning it if present.
    pub fn remove_node(&mut self, server: &ServerAddress) -> Option<ClusterNode> {
        self.nodes.remove(server)
    }

    pub fn node_count(&self) -> u32 {
        self.nodes.len() as u32
    }

    /// Sets the size the cluster is resizing toward.
    pub fn set_expected_size(&mut self, size: u32) {
        self.expected_size = size;
    }

    /// Produces the immutable view sent to clients.
    pub fn snapshot(&self) -> ClusterSnapshot {
        ClusterSnapshot {
            keyspace: self.keyspace.clone(),
            datacenter: self.datacenter.clone(),
            expected_size: self.expected_size,
            nodes: self.nodes.values().cloned().collect(),
        }
    }
}
