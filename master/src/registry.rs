//! The client channel registry.
//!
//! Every connected client session registers one bounded delivery channel
//! keyed by `keyspace:datacenter:server`. Topology events fan out to all
//! channels in a keyspace/datacenter scope by prefix match; a dedicated
//! writer loop per connection (outside this crate) drains each channel to
//! the network in enqueue order.
//!
//! Locking: the registry mutex guards only the key-to-sender map. Fanout
//! snapshots the matching senders under the lock and enqueues after
//! releasing it, so a slow consumer can delay its own queue but never
//! blocks registration, removal, or delivery to other clients.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use tokio::sync::mpsc;
use tracing::warn;
use vireo_common::{DatacenterName, KeyspaceName, ServerAddress};

use crate::error::{Error, Result};
use crate::message::ClientMessage;
use crate::topology::{Cluster, ClusterNode};

/// Capacity of each client delivery channel.
///
/// Deliberately small: a few pending notifications of headroom, with
/// backpressure beyond that. A stalled client can hold back at most this
/// many messages before its senders start waiting.
pub const CLIENT_CHANNEL_CAPACITY: usize = 3;

fn client_key(keyspace: &KeyspaceName, datacenter: &DatacenterName, server: &ServerAddress) -> String {
    format!("{}:{}:{}", keyspace, datacenter, server)
}

fn scope_prefix(keyspace: &KeyspaceName, datacenter: &DatacenterName) -> String {
    format!("{}:{}:", keyspace, datacenter)
}

/// Registry of per-client delivery channels.
///
/// The registry owns every sender; [`add_client`](Self::add_client) hands
/// the matching receiver to the caller's writer loop, and
/// [`remove_client`](Self::remove_client) dropping the sender is the only
/// valid way to end that stream.
pub struct ClientChannels {
    channels: Mutex<HashMap<String, mpsc::Sender<ClientMessage>>>,
}

impl ClientChannels {
    pub fn new() -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, mpsc::Sender<ClientMessage>>> {
        // A poisoned lock only means another thread panicked between map
        // operations; the map itself is still consistent.
        self.channels.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registers a delivery channel for the client and returns its
    /// receiving end.
    ///
    /// Fails with [`Error::DuplicateClient`] if the key already has an
    /// active channel; the existing registration is left untouched.
    pub fn add_client(
        &self,
        keyspace: &KeyspaceName,
        datacenter: &DatacenterName,
        server: &ServerAddress,
    ) -> Result<mpsc::Receiver<ClientMessage>> {
        let key = client_key(keyspace, datacenter, server);
        let mut channels = self.lock();
        if channels.contains_key(&key) {
            return Err(Error::DuplicateClient(key));
        }
        let (tx, rx) = mpsc::channel(CLIENT_CHANNEL_CAPACITY);
        channels.insert(key, tx);
        Ok(rx)
    }

    /// Unregisters the client and closes its channel.
    ///
    /// Dropping the registry's sender signals end-of-stream to the reader
    /// once any in-flight sends settle. Fails with
    /// [`Error::UnknownClient`] if no channel is registered.
    pub fn remove_client(
        &self,
        keyspace: &KeyspaceName,
        datacenter: &DatacenterName,
        server: &ServerAddress,
    ) -> Result<()> {
        let key = client_key(keyspace, datacenter, server);
        let mut channels = self.lock();
        match channels.remove(&key) {
            Some(_tx) => Ok(()),
            None => Err(Error::UnknownClient(key)),
        }
    }

    /// Enqueues `msg` for exactly one client.
    ///
    /// Waits if the channel is at capacity. Fails with
    /// [`Error::UnknownClient`] if no channel is registered and
    /// [`Error::ChannelClosed`] if the reader went away mid-send.
    pub async fn send_client(
        &self,
        keyspace: &KeyspaceName,
        datacenter: &DatacenterName,
        server: &ServerAddress,
        msg: ClientMessage,
    ) -> Result<()> {
        let key = client_key(keyspace, datacenter, server);
        let tx = {
            let channels = self.lock();
            match channels.get(&key) {
                Some(tx) => tx.clone(),
                None => return Err(Error::UnknownClient(key)),
            }
        };

        tx.send(msg).await.map_err(|_| Error::ChannelClosed(key))
    }

    /// Enqueues `msg` on every channel registered under the
    /// keyspace/datacenter scope.
    ///
    /// Recipients whose reader disappeared mid-send are skipped with a
    /// warning; they are about to be removed by their connection handler
    /// anyway.
    pub async fn notify_clients(
        &self,
        keyspace: &KeyspaceName,
        datacenter: &DatacenterName,
        msg: ClientMessage,
    ) -> Result<()> {
        let prefix = scope_prefix(keyspace, datacenter);
        let recipients: Vec<(String, mpsc::Sender<ClientMessage>)> = {
            let channels = self.lock();
            channels
                .iter()
                .filter(|(key, _)| key.starts_with(&prefix))
                .map(|(key, tx)| (key.clone(), tx.clone()))
                .collect()
        };

        for (key, tx) in recipients {
            if tx.send(msg.clone()).await.is_err() {
                warn!(client = %key, "skipping notification, client channel closed");
            }
        }
        Ok(())
    }

    /// Notifies the scope that store servers were added, removed, or
    /// promoted.
    pub async fn notify_store_resource_update(
        &self,
        keyspace: &KeyspaceName,
        datacenter: &DatacenterName,
        nodes: Vec<ClusterNode>,
        is_delete: bool,
        is_promotion: bool,
    ) -> Result<()> {
        self.notify_clients(
            keyspace,
            datacenter,
            ClientMessage::StoreResourceUpdate {
                keyspace: keyspace.clone(),
                nodes,
                is_delete,
                is_promotion,
            },
        )
        .await
    }

    /// Pushes a full topology snapshot to one client.
    pub async fn send_client_cluster(
        &self,
        keyspace: &KeyspaceName,
        datacenter: &DatacenterName,
        server: &ServerAddress,
        cluster: &Cluster,
    ) -> Result<()> {
        self.send_client(
            keyspace,
            datacenter,
            server,
            ClientMessage::Cluster(cluster.snapshot()),
        )
        .await
    }

    /// Notifies the scope that the cluster is resizing.
    pub async fn notify_cluster_resize(
        &self,
        keyspace: &KeyspaceName,
        datacenter: &DatacenterName,
        current_cluster_size: u32,
        target_cluster_size: u32,
    ) -> Result<()> {
        self.notify_clients(
            keyspace,
            datacenter,
            ClientMessage::Resize {
                keyspace: keyspace.clone(),
                current_cluster_size,
                target_cluster_size,
            },
        )
        .await
    }
}

impl Default for ClientChannels {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn ks(name: &str) -> KeyspaceName {
        KeyspaceName::new(name).unwrap()
    }

    fn dc(name: &str) -> DatacenterName {
        DatacenterName::new(name).unwrap()
    }

    fn server(name: &str) -> ServerAddress {
        ServerAddress::new(name).unwrap()
    }

    fn resize(keyspace: &str, current: u32, target: u32) -> ClientMessage {
        ClientMessage::Resize {
            keyspace: ks(keyspace),
            current_cluster_size: current,
            target_cluster_size: target,
        }
    }

    #[tokio::test]
    async fn should_fail_duplicate_registration() {
        // given
        let registry = ClientChannels::new();
        let _rx = registry.add_client(&ks("ks"), &dc("dc"), &server("s1")).unwrap();

        // when
        let result = registry.add_client(&ks("ks"), &dc("dc"), &server("s1"));

        // then
        assert_eq!(result.err(), Some(Error::DuplicateClient("ks:dc:s1".to_string())));
    }

    #[tokio::test]
    async fn should_allow_re_registration_after_removal() {
        // given
        let registry = ClientChannels::new();
        let _rx = registry.add_client(&ks("ks"), &dc("dc"), &server("s1")).unwrap();

        // when
        registry.remove_client(&ks("ks"), &dc("dc"), &server("s1")).unwrap();

        // then - the key is free again
        assert!(registry.add_client(&ks("ks"), &dc("dc"), &server("s1")).is_ok());
    }

    #[tokio::test]
    async fn should_fail_removal_of_unknown_client() {
        let registry = ClientChannels::new();

        let result = registry.remove_client(&ks("ks"), &dc("dc"), &server("s1"));

        assert_eq!(result, Err(Error::UnknownClient("ks:dc:s1".to_string())));
    }

    #[tokio::test]
    async fn should_fail_send_to_unknown_client_without_side_effect() {
        // given - an unrelated registered client
        let registry = ClientChannels::new();
        let mut other_rx = registry.add_client(&ks("ks"), &dc("dc"), &server("s1")).unwrap();

        // when
        let result = registry
            .send_client(&ks("ks"), &dc("dc"), &server("s2"), resize("ks", 1, 2))
            .await;

        // then
        assert_eq!(result, Err(Error::UnknownClient("ks:dc:s2".to_string())));
        assert!(other_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn should_signal_end_of_stream_on_removal() {
        // given
        let registry = ClientChannels::new();
        let mut rx = registry.add_client(&ks("ks"), &dc("dc"), &server("s1")).unwrap();

        // when
        registry.remove_client(&ks("ks"), &dc("dc"), &server("s1")).unwrap();

        // then
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn should_fail_send_when_reader_went_away() {
        // given - a registered client whose reader has been dropped
        let registry = ClientChannels::new();
        let rx = registry.add_client(&ks("ks"), &dc("dc"), &server("s1")).unwrap();
        drop(rx);

        // when
        let result = registry
            .send_client(&ks("ks"), &dc("dc"), &server("s1"), resize("ks", 1, 2))
            .await;

        // then - a clean error, not a panic
        assert_eq!(result, Err(Error::ChannelClosed("ks:dc:s1".to_string())));
    }

    #[tokio::test]
    async fn should_deliver_fanout_only_to_matching_scope() {
        // given - clients across two keyspaces and two datacenters
        let registry = ClientChannels::new();
        let mut ks1_dc1_s1 = registry.add_client(&ks("ks1"), &dc("dc1"), &server("s1")).unwrap();
        let mut ks1_dc1_s2 = registry.add_client(&ks("ks1"), &dc("dc1"), &server("s2")).unwrap();
        let mut ks1_dc2_s1 = registry.add_client(&ks("ks1"), &dc("dc2"), &server("s1")).unwrap();
        let mut ks2_dc1_s1 = registry.add_client(&ks("ks2"), &dc("dc1"), &server("s1")).unwrap();

        // when
        registry
            .notify_clients(&ks("ks1"), &dc("dc1"), resize("ks1", 2, 3))
            .await
            .unwrap();

        // then - only the two servers in (ks1, dc1) receive it
        assert_eq!(ks1_dc1_s1.recv().await, Some(resize("ks1", 2, 3)));
        assert_eq!(ks1_dc1_s2.recv().await, Some(resize("ks1", 2, 3)));
        assert!(ks1_dc2_s1.try_recv().is_err());
        assert!(ks2_dc1_s1.try_recv().is_err());
    }

    #[tokio::test]
    async fn should_skip_closed_channels_during_fanout() {
        // given - one live client and one whose reader died
        let registry = ClientChannels::new();
        let mut live = registry.add_client(&ks("ks"), &dc("dc"), &server("s1")).unwrap();
        let dead = registry.add_client(&ks("ks"), &dc("dc"), &server("s2")).unwrap();
        drop(dead);

        // when
        registry
            .notify_clients(&ks("ks"), &dc("dc"), resize("ks", 1, 2))
            .await
            .unwrap();

        // then - the live client still gets the message
        assert_eq!(live.recv().await, Some(resize("ks", 1, 2)));
    }

    #[tokio::test(start_paused = true)]
    async fn should_apply_backpressure_at_channel_capacity() {
        // given - a full client channel
        let registry = ClientChannels::new();
        let mut rx = registry.add_client(&ks("ks"), &dc("dc"), &server("s1")).unwrap();
        for i in 0..CLIENT_CHANNEL_CAPACITY {
            registry
                .send_client(&ks("ks"), &dc("dc"), &server("s1"), resize("ks", i as u32, 9))
                .await
                .unwrap();
        }

        // when - one more send has to wait
        let (ks_name, dc_name, server_name) = (ks("ks"), dc("dc"), server("s1"));
        let blocked = registry.send_client(&ks_name, &dc_name, &server_name, resize("ks", 8, 9));
        let timed_out = tokio::time::timeout(Duration::from_millis(100), blocked).await;

        // then
        assert!(timed_out.is_err());

        // and when - draining one message frees a slot
        rx.recv().await.unwrap();
        registry
            .send_client(&ks("ks"), &dc("dc"), &server("s1"), resize("ks", 8, 9))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn should_not_block_registration_while_fanout_is_stalled() {
        // given - a full channel with a fanout blocked on it
        let registry = std::sync::Arc::new(ClientChannels::new());
        let _stalled_rx = registry.add_client(&ks("ks"), &dc("dc"), &server("s1")).unwrap();
        for _ in 0..CLIENT_CHANNEL_CAPACITY {
            registry
                .send_client(&ks("ks"), &dc("dc"), &server("s1"), resize("ks", 1, 2))
                .await
                .unwrap();
        }
        let fanout_registry = registry.clone();
        let fanout = tokio::spawn(async move {
            fanout_registry
                .notify_clients(&ks("ks"), &dc("dc"), resize("ks", 2, 3))
                .await
        });
        tokio::task::yield_now().await;

        // when - registry mutations while the fanout is parked
        let added = registry.add_client(&ks("ks"), &dc("dc"), &server("s2"));
        let removed = registry.remove_client(&ks("ks"), &dc("dc"), &server("s2"));

        // then
        assert!(added.is_ok());
        assert!(removed.is_ok());

        fanout.abort();
        let _ = fanout.await;
    }

    #[tokio::test]
    async fn should_deliver_resource_update_then_reject_send_after_removal() {
        // given
        let registry = ClientChannels::new();
        let mut rx = registry.add_client(&ks("ks"), &dc("dc"), &server("s1")).unwrap();

        // when - a node joins the scope
        let node = ClusterNode {
            server: server("s9"),
            shard_ids: vec![0],
        };
        registry
            .notify_store_resource_update(&ks("ks"), &dc("dc"), vec![node.clone()], false, false)
            .await
            .unwrap();

        // then - s1 observes the update
        match rx.recv().await {
            Some(ClientMessage::StoreResourceUpdate {
                keyspace,
                nodes,
                is_delete,
                is_promotion,
            }) => {
                assert_eq!(keyspace, ks("ks"));
                assert_eq!(nodes, vec![node]);
                assert!(!is_delete);
                assert!(!is_promotion);
            }
            other => panic!("expected StoreResourceUpdate, got {:?}", other),
        }

        // and when - the client disconnects
        registry.remove_client(&ks("ks"), &dc("dc"), &server("s1")).unwrap();
        let result = registry
            .send_client(&ks("ks"), &dc("dc"), &server("s1"), resize("ks", 1, 2))
            .await;

        // then
        assert_eq!(result, Err(Error::UnknownClient("ks:dc:s1".to_string())));
    }

    #[tokio::test]
    async fn should_push_cluster_snapshot_to_one_client() {
        // given
        let registry = ClientChannels::new();
        let mut rx = registry.add_client(&ks("ks"), &dc("dc"), &server("s1")).unwrap();

        let mut cluster = Cluster::new(ks("ks"), dc("dc"), 2);
        cluster.upsert_node(ClusterNode {
            server: server("s1"),
            shard_ids: vec![0],
        });

        // when
        registry
            .send_client_cluster(&ks("ks"), &dc("dc"), &server("s1"), &cluster)
            .await
            .unwrap();

        // then
        assert_eq!(rx.recv().await, Some(ClientMessage::Cluster(cluster.snapshot())));
    }
}
