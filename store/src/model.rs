//! Request and response types for the store write path.

use bytes::Bytes;

/// Identifier of one shard within a store node.
pub type ShardId = u32;

/// A merge write: the payload is combined with the existing value by the
/// engine's merge operator rather than overwriting it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeRequest {
    pub key: Bytes,
    /// Payload whose meaning is defined by the merge operator (delta,
    /// counter increment, replacement candidate, ...).
    pub payload: Bytes,
}

/// A plain overwrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PutRequest {
    pub key: Bytes,
    pub value: Bytes,
}

/// Outcome of a write, surfaced to the requester.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteResponse {
    pub ok: bool,
    /// Empty on success; the engine's error text on failure.
    pub status: String,
}

impl WriteResponse {
    pub fn ok() -> Self {
        Self {
            ok: true,
            status: String::new(),
        }
    }

    pub fn failed(status: impl Into<String>) -> Self {
        Self {
            ok: false,
            status: status.into(),
        }
    }
}
