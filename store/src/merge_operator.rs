//! Last-writer-wins conflict resolution.
//!
//! Entries carry the timestamp assigned at first application, so merging
//! two concurrent entries for a key reduces to keeping the one with the
//! larger `updated_at_ns` regardless of the order they arrive in. The
//! policy lives behind [`MergeOperator`] so alternative resolutions
//! (vector clocks, sum-merge counters) can be swapped in without touching
//! the shard or the registry.

use bytes::Bytes;
use tracing::warn;
use vireo_common::MergeOperator;

use crate::codec::MergeEntry;

/// Merge operator keeping the entry with the larger embedded timestamp.
///
/// Equal timestamps break ties on payload bytes, so the outcome is
/// independent of arrival order. Re-merging an entry that already won is
/// a no-op, which makes log replay idempotent.
pub struct LastWriterWins;

impl LastWriterWins {
    fn incoming_wins(incoming: &MergeEntry, current: &MergeEntry) -> bool {
        match incoming.updated_at_ns.cmp(&current.updated_at_ns) {
            std::cmp::Ordering::Greater => true,
            std::cmp::Ordering::Less => false,
            std::cmp::Ordering::Equal => incoming.request.payload > current.request.payload,
        }
    }
}

impl MergeOperator for LastWriterWins {
    fn merge(&self, key: &Bytes, existing_value: Option<Bytes>, new_value: Bytes) -> Bytes {
        let Some(existing) = existing_value else {
            return new_value;
        };

        // The write path must never panic inside the engine; an
        // undecodable side loses to the decodable one, deterministically.
        match (MergeEntry::decode(&existing), MergeEntry::decode(&new_value)) {
            (Ok(current), Ok(incoming)) => {
                if Self::incoming_wins(&incoming, &current) {
                    new_value
                } else {
                    existing
                }
            }
            (Ok(_), Err(err)) => {
                warn!(key = ?key, error = %err, "dropping undecodable incoming merge entry");
                existing
            }
            (Err(err), Ok(_)) => {
                warn!(key = ?key, error = %err, "replacing undecodable existing merge entry");
                new_value
            }
            (Err(existing_err), Err(incoming_err)) => {
                warn!(
                    key = ?key,
                    existing_error = %existing_err,
                    incoming_error = %incoming_err,
                    "both merge entries undecodable, keeping incoming"
                );
                new_value
            }
        }
    }
}
