//! Master-side coordination: cluster topology bookkeeping and the client
//! notification registry.
//!
//! The master tracks which store servers participate in each
//! keyspace/datacenter cluster and pushes topology changes to every
//! connected client session through per-client delivery channels. The
//! wire transport draining those channels lives outside this crate; its
//! only obligations are to stream messages in channel order and to call
//! [`ClientChannels::remove_client`] when a connection dies.

pub mod error;
pub mod message;
pub mod registry;
pub mod topology;

pub use error::{Error, Result};
pub use message::ClientMessage;
pub use registry::{ClientChannels, CLIENT_CHANNEL_CAPACITY};
pub use topology::{Cluster, ClusterNode, ClusterSnapshot};
