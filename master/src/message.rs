//! Messages pushed to connected client sessions.

use vireo_common::KeyspaceName;

use crate::topology::{ClusterNode, ClusterSnapshot};

/// A topology notification delivered on a client channel.
///
/// Each variant carries enough for the client to update its view of
/// authoritative cluster state without polling the master.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientMessage {
    /// One or more store servers changed: added, removed, or promoted.
    StoreResourceUpdate {
        keyspace: KeyspaceName,
        /// The nodes affected by the change.
        nodes: Vec<ClusterNode>,
        /// The listed nodes left the cluster.
        is_delete: bool,
        /// The listed nodes were promoted from candidate to member.
        is_promotion: bool,
    },

    /// A full topology view, pushed when a client first connects and
    /// whenever incremental updates are insufficient.
    Cluster(ClusterSnapshot),

    /// The cluster is resizing from `current_cluster_size` toward
    /// `target_cluster_size`.
    Resize {
        keyspace: KeyspaceName,
        current_cluster_size: u32,
        target_cluster_size: u32,
    },
}
