//! A store node and its shards.
//!
//! The node owns one shard per partition, routes requests by key hash,
//! and wires each shard to its own write-ahead log file. Opening a node
//! over an existing log directory replays the logs before accepting
//! writes, which is the crash-recovery path.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use tracing::info;
use vireo_common::storage::in_memory::InMemoryStorage;
use vireo_common::Clock;

use crate::error::{Error, Result};
use crate::merge_operator::LastWriterWins;
use crate::metrics::WriteMetrics;
use crate::model::{MergeRequest, PutRequest, ShardId, WriteResponse};
use crate::shard::Shard;
use crate::wal::{read_log_entries, FileLogAppender, LogAppender};

/// Configuration for a store node.
#[derive(Debug, Clone)]
pub struct StoreNodeConfig {
    /// Number of shards hosted by this node.
    pub shard_count: u32,
    /// Directory for per-shard write-ahead logs; `None` disables logging.
    pub wal_dir: Option<PathBuf>,
}

impl Default for StoreNodeConfig {
    fn default() -> Self {
        Self {
            shard_count: 4,
            wal_dir: None,
        }
    }
}

fn hash_key(bytes: &[u8]) -> u64 {
    let mut hasher = DefaultHasher::new();
    bytes.hash(&mut hasher);
    hasher.finish()
}

/// One store process: a fixed set of shards over a shared clock.
pub struct StoreNode {
    shards: Vec<Arc<Shard>>,
    metrics: Arc<WriteMetrics>,
}

impl StoreNode {
    /// Opens a node, replaying any existing write-ahead logs.
    pub async fn open(config: &StoreNodeConfig) -> Result<Self> {
        if config.shard_count == 0 {
            return Err(Error::InvalidInput(
                "store node requires at least one shard".to_string(),
            ));
        }

        if let Some(dir) = &config.wal_dir {
            std::fs::create_dir_all(dir)?;
        }

        let clock = Arc::new(Clock::new());
        let metrics = Arc::new(WriteMetrics::new());

        let mut shards = Vec::with_capacity(config.shard_count as usize);
        for id in 0..config.shard_count {
            let storage = Arc::new(InMemoryStorage::with_merge_operator(Arc::new(
                LastWriterWins,
            )));

            let mut recovered = Vec::new();
            let wal: Option<Arc<dyn LogAppender>> = match &config.wal_dir {
                None => None,
                Some(dir) => {
                    let path = dir.join(format!("shard_{:05}.wal", id));
                    if path.exists() {
                        recovered = read_log_entries(&path)?;
                    }
                    Some(Arc::new(FileLogAppender::open(&path)?))
                }
            };

            let shard = Shard::new(id, storage, wal, clock.clone(), metrics.clone());
            if !recovered.is_empty() {
                let count = shard.replay(&recovered).await?;
                info!(shard = id, entries = count, "replayed write-ahead log");
            }
            shards.push(Arc::new(shard));
        }

        Ok(Self { shards, metrics })
    }

    pub fn shard_count(&self) -> u32 {
        self.shards.len() as u32
    }

    /// The shard hosting `key`.
    pub fn shard_for_key(&self, key: &[u8]) -> &Arc<Shard> {
        let index = (hash_key(key) as usize) % self.shards.len();
        &self.shards[index]
    }

    pub fn shard(&self, id: ShardId) -> Option<&Arc<Shard>> {
        self.shards.get(id as usize)
    }

    pub fn metrics(&self) -> &WriteMetrics {
        &self.metrics
    }

    pub async fn merge(&self, request: MergeRequest) -> WriteResponse {
        let shard = self.shard_for_key(&request.key).clone();
        shard.process_merge(request).await
    }

    pub async fn put(&self, request: PutRequest) -> WriteResponse {
        let shard = self.shard_for_key(&request.key).clone();
        shard.process_put(request).await
    }

    /// Applies puts in order, stopping at the first failure.
    pub async fn put_batch(&self, requests: Vec<PutRequest>) -> WriteResponse {
        for request in requests {
            let response = self.put(request).await;
            if !response.ok {
                return response;
            }
        }
        WriteResponse::ok()
    }

    pub async fn get(&self, key: Bytes) -> Result<Option<Bytes>> {
        let shard = self.shard_for_key(&key).clone();
        shard.get(key).await
    }
}
