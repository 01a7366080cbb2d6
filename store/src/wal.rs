//! Write-ahead log for applied writes.
//!
//! Each shard may be configured with a [`LogAppender`]; every successfully
//! applied merge or put is appended as a [`LogEntry`] tagged with the same
//! `updated_at_ns` used for the live apply, so that replaying the log
//! reproduces the same conflict-resolution outcome as the original
//! application. Entries are replayed in append order during recovery and
//! replica catch-up.
//!
//! The file format here is an internal detail, not a contract: entries are
//! framed as `[payload_len u32][crc32 u32][payload]` with all integers
//! big-endian. A truncated tail (crash mid-append) is tolerated on
//! replay; a checksum mismatch on a complete frame is not.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use bytes::{BufMut, Bytes, BytesMut};
use tracing::warn;

use crate::codec::{read_bytes, read_u8, read_u64, EncodingError, ENTRY_VERSION};
use crate::error::{Error, Result};
use crate::model::{MergeRequest, PutRequest};

const OP_MERGE: u8 = 1;
const OP_PUT: u8 = 2;

/// Size of the `[payload_len][crc32]` frame header.
const FRAME_HEADER_LEN: usize = 8;

/// The operation recorded by a log entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOp {
    Merge(MergeRequest),
    Put(PutRequest),
}

/// One write-ahead log record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// The timestamp used for the live apply. Replay reuses it verbatim.
    pub updated_at_ns: u64,
    pub op: LogOp,
}

impl LogEntry {
    pub fn encode(&self) -> Bytes {
        let (op, key, value) = match &self.op {
            LogOp::Merge(req) => (OP_MERGE, &req.key, &req.payload),
            LogOp::Put(req) => (OP_PUT, &req.key, &req.value),
        };
        let mut buf = BytesMut::with_capacity(1 + 1 + 8 + 4 + key.len() + 4 + value.len());
        buf.put_u8(ENTRY_VERSION);
        buf.put_u8(op);
        buf.put_u64(self.updated_at_ns);
        buf.put_u32(key.len() as u32);
        buf.put_slice(key);
        buf.put_u32(value.len() as u32);
        buf.put_slice(value);
        buf.freeze()
    }

    pub fn decode(buf: &[u8]) -> std::result::Result<Self, EncodingError> {
        let mut offset = 0usize;

        let version = read_u8(buf, &mut offset)?;
        if version != ENTRY_VERSION {
            return Err(EncodingError {
                message: format!(
                    "invalid log entry version: expected {}, got {}",
                    ENTRY_VERSION, version
                ),
            });
        }

        let op = read_u8(buf, &mut offset)?;
        let updated_at_ns = read_u64(buf, &mut offset)?;
        let key = read_bytes(buf, &mut offset)?;
        let value = read_bytes(buf, &mut offset)?;

        if offset != buf.len() {
            return Err(EncodingError {
                message: format!(
                    "trailing bytes after log entry: expected {} bytes, got {}",
                    offset,
                    buf.len()
                ),
            });
        }

        let op = match op {
            OP_MERGE => LogOp::Merge(MergeRequest { key, payload: value }),
            OP_PUT => LogOp::Put(PutRequest { key, value }),
            other => {
                return Err(EncodingError {
                    message: format!("unknown log op tag: {}", other),
                })
            }
        };

        Ok(Self { updated_at_ns, op })
    }
}

/// Durable sink for applied writes.
///
/// Append failures never fail the in-flight request (the apply has already
/// succeeded); callers report them through logging and metrics instead.
pub trait LogAppender: Send + Sync {
    fn append_entry(&self, entry: &LogEntry) -> Result<()>;
}

/// In-memory appender for tests and wal-less configurations.
#[derive(Default)]
pub struct MemoryLogAppender {
    entries: Mutex<Vec<LogEntry>>,
}

impl MemoryLogAppender {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns all appended entries in append order.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl LogAppender for MemoryLogAppender {
    fn append_entry(&self, entry: &LogEntry) -> Result<()> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(entry.clone());
        Ok(())
    }
}

/// File-backed appender writing crc-framed entries.
///
/// Appends are flushed to the OS on every entry but not fsynced; call
/// [`sync`](Self::sync) at explicit durability points. Log durability is
/// for recovery and replication, never a precondition for acknowledging a
/// write.
pub struct FileLogAppender {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl FileLogAppender {
    /// Opens the log file at `path` for appending, creating it if absent.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Forces appended entries to stable storage.
    pub fn sync(&self) -> Result<()> {
        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writer.flush()?;
        writer.get_ref().sync_data()?;
        Ok(())
    }
}

impl LogAppender for FileLogAppender {
    fn append_entry(&self, entry: &LogEntry) -> Result<()> {
        let payload = entry.encode();
        let mut frame = BytesMut::with_capacity(FRAME_HEADER_LEN + payload.len());
        frame.put_u32(payload.len() as u32);
        frame.put_u32(crc32fast::hash(&payload));
        frame.put_slice(&payload);

        let mut writer = self.writer.lock().unwrap_or_else(PoisonError::into_inner);
        writer.write_all(&frame)?;
        writer.flush()?;
        Ok(())
    }
}

/// Reads every complete entry from a log file, in append order.
///
/// A truncated final frame is skipped with a warning so that recovery
/// after a crash mid-append still succeeds; a checksum mismatch on a
/// complete frame means the file is damaged and is an error.
pub fn read_log_entries(path: impl AsRef<Path>) -> Result<Vec<LogEntry>> {
    let path = path.as_ref();
    let data = std::fs::read(path)?;

    let mut entries = Vec::new();
    let mut offset = 0usize;
    while offset < data.len() {
        if data.len() - offset < FRAME_HEADER_LEN {
            warn!(path = %path.display(), offset, "dropping truncated log frame header");
            break;
        }
        let len = u32::from_be_bytes([
            data[offset],
            data[offset + 1],
            data[offset + 2],
            data[offset + 3],
        ]) as usize;
        let crc = u32::from_be_bytes([
            data[offset + 4],
            data[offset + 5],
            data[offset + 6],
            data[offset + 7],
        ]);

        let start = offset + FRAME_HEADER_LEN;
        let Some(payload) = data.get(start..start + len) else {
            warn!(path = %path.display(), offset, "dropping truncated log frame payload");
            break;
        };

        if crc32fast::hash(payload) != crc {
            return Err(Error::Wal(format!(
                "checksum mismatch in {} at offset {}",
                path.display(),
                offset
            )));
        }

        entries.push(LogEntry::decode(payload)?);
        offset = start + len;
    }

    Ok(entries)
}
