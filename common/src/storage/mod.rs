//! Storage engine traits shared by the master and store crates.
//!
//! The coordination core does not define an on-disk format; it consumes a
//! key-value engine through the traits below. The only semantic the core
//! relies on is [`Storage::merge`]: conflict resolution is delegated to
//! the engine's configured [`MergeOperator`], which must be deterministic
//! and idempotent under replay of the same encoded entry.

pub mod in_memory;

use async_trait::async_trait;
use bytes::Bytes;

/// Error type for storage operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// Errors from the underlying storage layer, such as I/O failures
    /// or corruption.
    Storage(String),

    /// Internal errors indicating bugs or invariant violations.
    Internal(String),
}

impl std::error::Error for StorageError {}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StorageError::Storage(msg) => write!(f, "Storage error: {}", msg),
            StorageError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

/// Result type alias for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// A key-value pair as stored by the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub key: Bytes,
    pub value: Bytes,
}

/// Conflict resolution for merge operations.
///
/// The engine invokes the operator whenever a merge lands on a key,
/// handing it the existing value (if any) and the incoming value, and
/// stores whatever the operator returns. Implementations must be
/// deterministic: merging the same pair of values always yields the same
/// winner, regardless of which replica performs the merge.
pub trait MergeOperator: Send + Sync {
    fn merge(&self, key: &Bytes, existing_value: Option<Bytes>, new_value: Bytes) -> Bytes;
}

/// Read operations on a storage engine.
#[async_trait]
pub trait StorageRead: Send + Sync {
    /// Returns the record stored under `key`, or `None` if absent.
    async fn get(&self, key: Bytes) -> StorageResult<Option<Record>>;
}

/// Full read-write access to a storage engine.
#[async_trait]
pub trait Storage: StorageRead {
    /// Stores `record`, replacing any existing value.
    async fn put(&self, record: Record) -> StorageResult<()>;

    /// Merges `record` into the existing value via the engine's
    /// [`MergeOperator`]. Fails if the engine has no operator configured.
    async fn merge(&self, record: Record) -> StorageResult<()>;

    /// Removes the record stored under `key`, if any.
    async fn delete(&self, key: Bytes) -> StorageResult<()>;
}
