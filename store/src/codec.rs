//! Merge entry encoding.
//!
//! A merge request is stored as a self-describing byte entry carrying the
//! timestamp assigned at apply time. Self-describing matters: the merge
//! operator may be handed two independently encoded entries (e.g. from
//! divergent replicas) and must be able to extract both timestamps with
//! no external context.
//!
//! Layout (all integers big-endian):
//!
//! ```text
//! [version u8][updated_at_ns u64][key_len u32][key][payload_len u32][payload]
//! ```

use bytes::{BufMut, Bytes, BytesMut};

use crate::model::MergeRequest;

/// Version byte prefixed to every encoded entry.
pub const ENTRY_VERSION: u8 = 1;

/// Error type for entry encoding and decoding failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodingError {
    pub message: String,
}

impl std::error::Error for EncodingError {}

impl std::fmt::Display for EncodingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// A merge request plus the timestamp that orders it.
///
/// `updated_at_ns` is assigned exactly once, by the shard that first
/// applies the entry, and is never recomputed on replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeEntry {
    pub request: MergeRequest,
    pub updated_at_ns: u64,
}

impl MergeEntry {
    pub fn new(request: MergeRequest, updated_at_ns: u64) -> Self {
        Self {
            request,
            updated_at_ns,
        }
    }

    pub fn encode(&self) -> Bytes {
        let key = &self.request.key;
        let payload = &self.request.payload;
        let mut buf = BytesMut::with_capacity(1 + 8 + 4 + key.len() + 4 + payload.len());
        buf.put_u8(ENTRY_VERSION);
        buf.put_u64(self.updated_at_ns);
        buf.put_u32(key.len() as u32);
        buf.put_slice(key);
        buf.put_u32(payload.len() as u32);
        buf.put_slice(payload);
        buf.freeze()
    }

    /// Decodes an entry, requiring the buffer to contain exactly one
    /// well-formed entry and nothing else.
    pub fn decode(buf: &[u8]) -> Result<Self, EncodingError> {
        let mut offset = 0usize;

        let version = read_u8(buf, &mut offset)?;
        if version != ENTRY_VERSION {
            return Err(EncodingError {
                message: format!(
                    "invalid entry version: expected {}, got {}",
                    ENTRY_VERSION, version
                ),
            });
        }

        let updated_at_ns = read_u64(buf, &mut offset)?;
        let key = read_bytes(buf, &mut offset)?;
        let payload = read_bytes(buf, &mut offset)?;

        if offset != buf.len() {
            return Err(EncodingError {
                message: format!(
                    "trailing bytes after entry: expected {} bytes, got {}",
                    offset,
                    buf.len()
                ),
            });
        }

        Ok(Self {
            request: MergeRequest { key, payload },
            updated_at_ns,
        })
    }
}

pub(crate) fn read_u8(buf: &[u8], offset: &mut usize) -> Result<u8, EncodingError> {
    let Some(&byte) = buf.get(*offset) else {
        return Err(short_buffer(*offset + 1, buf.len()));
    };
    *offset += 1;
    Ok(byte)
}

pub(crate) fn read_u64(buf: &[u8], offset: &mut usize) -> Result<u64, EncodingError> {
    let end = *offset + 8;
    let Some(bytes) = buf.get(*offset..end) else {
        return Err(short_buffer(end, buf.len()));
    };
    let mut out = [0u8; 8];
    out.copy_from_slice(bytes);
    *offset = end;
    Ok(u64::from_be_bytes(out))
}

pub(crate) fn read_u32(buf: &[u8], offset: &mut usize) -> Result<u32, EncodingError> {
    let end = *offset + 4;
    let Some(bytes) = buf.get(*offset..end) else {
        return Err(short_buffer(end, buf.len()));
    };
    let mut out = [0u8; 4];
    out.copy_from_slice(bytes);
    *offset = end;
    Ok(u32::from_be_bytes(out))
}

pub(crate) fn read_bytes(buf: &[u8], offset: &mut usize) -> Result<Bytes, EncodingError> {
    let len = read_u32(buf, offset)? as usize;
    let end = *offset + len;
    let Some(bytes) = buf.get(*offset..end) else {
        return Err(short_buffer(end, buf.len()));
    };
    let out = Bytes::copy_from_slice(bytes);
    *offset = end;
    Ok(out)
}

pub(crate) fn short_buffer(expected: usize, got: usize) -> EncodingError {
    EncodingError {
        message: format!(
            "unexpected end of input: expected at least {} bytes, got {}",
            expected, got
        ),
    }
}
