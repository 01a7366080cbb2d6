//! In-memory storage engine.
//!
//! Backs tests, benchmarks, and wal-less configurations. Semantics match
//! what the core expects from a persistent engine: merges are resolved
//! through the configured [`MergeOperator`] at write time.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;

use super::{MergeOperator, Record, Storage, StorageError, StorageRead, StorageResult};

/// A storage engine keeping all records in an ordered in-memory map.
pub struct InMemoryStorage {
    records: Mutex<BTreeMap<Bytes, Bytes>>,
    merge_operator: Option<Arc<dyn MergeOperator>>,
}

impl InMemoryStorage {
    /// Creates an engine without merge support; `merge` will fail.
    pub fn new() -> Self {
        Self {
            records: Mutex::new(BTreeMap::new()),
            merge_operator: None,
        }
    }

    /// Creates an engine resolving merges through `op`.
    pub fn with_merge_operator(op: Arc<dyn MergeOperator>) -> Self {
        Self {
            records: Mutex::new(BTreeMap::new()),
            merge_operator: Some(op),
        }
    }

    fn lock(&self) -> StorageResult<std::sync::MutexGuard<'_, BTreeMap<Bytes, Bytes>>> {
        self.records
            .lock()
            .map_err(|_| StorageError::Internal("storage mutex poisoned".to_string()))
    }
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StorageRead for InMemoryStorage {
    async fn get(&self, key: Bytes) -> StorageResult<Option<Record>> {
        let records = self.lock()?;
        Ok(records.get(&key).map(|value| Record {
            key,
            value: value.clone(),
        }))
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn put(&self, record: Record) -> StorageResult<()> {
        let mut records = self.lock()?;
        records.insert(record.key, record.value);
        Ok(())
    }

    async fn merge(&self, record: Record) -> StorageResult<()> {
        let op = self.merge_operator.as_ref().ok_or_else(|| {
            StorageError::Storage("merge requires a merge operator".to_string())
        })?;

        let mut records = self.lock()?;
        let existing = records.get(&record.key).cloned();
        let merged = op.merge(&record.key, existing, record.value);
        records.insert(record.key, merged);
        Ok(())
    }

    async fn delete(&self, key: Bytes) -> StorageResult<()> {
        let mut records = self.lock()?;
        records.remove(&key);
        Ok(())
    }
}
