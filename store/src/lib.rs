//! Store-side write path: shards, the merge-entry codec, last-writer-wins
//! conflict resolution, and the write-ahead log.
//!
//! A store node owns a set of shards. Each shard applies merge and put
//! requests to its storage handle with a timestamp assigned at apply time,
//! and appends the same logical event to a write-ahead log (when one is
//! configured) for crash recovery and replica catch-up. Conflict
//! resolution between concurrent entries for a key is delegated to the
//! engine's merge operator, keyed on the embedded timestamp.

pub mod codec;
pub mod error;
pub mod merge_operator;
pub mod metrics;
pub mod model;
pub mod node;
pub mod shard;
pub mod wal;

pub use codec::{EncodingError, MergeEntry};
pub use error::{Error, Result};
pub use merge_operator::LastWriterWins;
pub use metrics::WriteMetrics;
pub use model::{MergeRequest, PutRequest, ShardId, WriteResponse};
pub use node::{StoreNode, StoreNodeConfig};
pub use shard::Shard;
pub use wal::{FileLogAppender, LogAppender, LogEntry, LogOp, MemoryLogAppender};
