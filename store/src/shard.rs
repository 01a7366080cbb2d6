//! One shard's write path.
//!
//! A shard exclusively owns its storage handle and (optionally) a log
//! appender. Applies are serialized per shard by an internal lock, which
//! together with the monotonic clock guarantees that two writes issued in
//! causal order on the same shard are stamped in that order and appear in
//! the log in that order. Concurrent shards are fully independent.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::Mutex;
use tracing::error;
use vireo_common::{Clock, Record, Storage, StorageRead};

use crate::codec::MergeEntry;
use crate::error::Result;
use crate::metrics::WriteMetrics;
use crate::model::{MergeRequest, PutRequest, ShardId, WriteResponse};
use crate::wal::{LogAppender, LogEntry, LogOp};

/// One partition of a keyspace, owned by a single store node at a time.
pub struct Shard {
    id: ShardId,
    storage: Arc<dyn Storage>,
    wal: Option<Arc<dyn LogAppender>>,
    clock: Arc<Clock>,
    metrics: Arc<WriteMetrics>,
    apply_lock: Mutex<()>,
}

impl Shard {
    pub fn new(
        id: ShardId,
        storage: Arc<dyn Storage>,
        wal: Option<Arc<dyn LogAppender>>,
        clock: Arc<Clock>,
        metrics: Arc<WriteMetrics>,
    ) -> Self {
        Self {
            id,
            storage,
            wal,
            clock,
            metrics,
            apply_lock: Mutex::new(()),
        }
    }

    pub fn id(&self) -> ShardId {
        self.id
    }

    /// Applies one merge request durably and deterministically.
    ///
    /// The request is stamped with the shard clock, applied through the
    /// engine's merge operator, and only on success appended to the log.
    /// A failed apply is surfaced in the response and never reaches the
    /// log; a failed log append after a successful apply is reported
    /// through metrics and logging but does not change the response --
    /// the apply has already happened and the caller must not be told
    /// otherwise.
    pub async fn process_merge(&self, request: MergeRequest) -> WriteResponse {
        let _guard = self.apply_lock.lock().await;

        let updated_at_ns = self.clock.now_nanos();
        let entry = MergeEntry::new(request.clone(), updated_at_ns);
        let record = Record {
            key: request.key.clone(),
            value: entry.encode(),
        };

        if let Err(err) = self.storage.merge(record).await {
            self.metrics.writes_rejected_total.inc();
            return WriteResponse::failed(err.to_string());
        }

        self.metrics.merges_applied_total.inc();
        self.log_entry(LogEntry {
            updated_at_ns,
            op: LogOp::Merge(request),
        });
        WriteResponse::ok()
    }

    /// Applies one put with the same apply-then-log sequence as
    /// [`process_merge`](Self::process_merge).
    pub async fn process_put(&self, request: PutRequest) -> WriteResponse {
        let _guard = self.apply_lock.lock().await;

        let updated_at_ns = self.clock.now_nanos();
        let entry = MergeEntry::new(
            MergeRequest {
                key: request.key.clone(),
                payload: request.value.clone(),
            },
            updated_at_ns,
        );
        let record = Record {
            key: request.key.clone(),
            value: entry.encode(),
        };

        if let Err(err) = self.storage.put(record).await {
            self.metrics.writes_rejected_total.inc();
            return WriteResponse::failed(err.to_string());
        }

        self.metrics.puts_applied_total.inc();
        self.log_entry(LogEntry {
            updated_at_ns,
            op: LogOp::Put(request),
        });
        WriteResponse::ok()
    }

    /// Reads the current value stored under `key`.
    pub async fn get(&self, key: Bytes) -> Result<Option<Bytes>> {
        match self.storage.get(key).await? {
            None => Ok(None),
            Some(record) => {
                let entry = MergeEntry::decode(&record.value)?;
                Ok(Some(entry.request.payload))
            }
        }
    }

    /// Re-applies log entries in append order, reusing each entry's
    /// original timestamp.
    ///
    /// Every entry -- put or merge -- is re-applied through the merge
    /// operator, so replaying over existing state cannot regress a key:
    /// the time-based tie-break resolves already-applied entries to a
    /// no-op. Nothing is appended to the log during replay.
    pub async fn replay(&self, entries: &[LogEntry]) -> Result<usize> {
        let _guard = self.apply_lock.lock().await;

        for entry in entries {
            let request = match &entry.op {
                LogOp::Merge(req) => req.clone(),
                LogOp::Put(req) => MergeRequest {
                    key: req.key.clone(),
                    payload: req.value.clone(),
                },
            };
            // Future writes must be stamped past everything replayed.
            self.clock.observe(entry.updated_at_ns);

            let encoded = MergeEntry::new(request.clone(), entry.updated_at_ns).encode();
            self.storage
                .merge(Record {
                    key: request.key,
                    value: encoded,
                })
                .await?;
        }

        Ok(entries.len())
    }

    fn log_entry(&self, entry: LogEntry) {
        let Some(wal) = &self.wal else {
            return;
        };
        if let Err(err) = wal.append_entry(&entry) {
            self.metrics.wal_append_failures_total.inc();
            error!(shard = self.id, error = %err, "failed to append log entry");
        }
    }
}
