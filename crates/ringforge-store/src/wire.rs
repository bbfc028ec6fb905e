//! The store wire protocol.
//!
//! Wire format: 4-byte big-endian length prefix, then the frame payload.
//! Every payload starts with a big-endian 64-bit request ID; responses echo
//! the ID of the request they answer. After the ID comes a one-byte opcode
//! and the opcode's fields. Strings and byte blobs are encoded as a 4-byte
//! big-endian length followed by the raw bytes.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{StoreError, StoreResult};

/// Frames larger than this are rejected as malformed.
pub const MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

const OP_PUT: u8 = 0x01;
const OP_GET: u8 = 0x02;
const OP_DELETE: u8 = 0x03;
const OP_LIST: u8 = 0x04;

const RE_ACK: u8 = 0x81;
const RE_DOCUMENT: u8 = 0x82;
const RE_NOT_FOUND: u8 = 0x83;
const RE_DELETED: u8 = 0x84;
const RE_KEYS: u8 = 0x85;
const RE_ERROR: u8 = 0x86;

/// A request from core to store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreRequest {
    /// Request ID; the response echoes it.
    pub id: u64,
    /// The operation.
    pub op: StoreOp,
}

/// Store operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreOp {
    /// Store a document.
    Put {
        /// Document key.
        key: String,
        /// Metadata bytes.
        meta: Vec<u8>,
        /// Body bytes.
        body: Vec<u8>,
    },
    /// Fetch a document.
    Get {
        /// Document key.
        key: String,
    },
    /// Delete a document.
    Delete {
        /// Document key.
        key: String,
    },
    /// List all keys.
    List,
}

/// A response from store to core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreResponse {
    /// Echoed request ID.
    pub id: u64,
    /// The reply body.
    pub reply: StoreReply,
}

/// Store reply variants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreReply {
    /// Write acknowledged.
    Ack,
    /// A fetched document.
    Document {
        /// Metadata bytes.
        meta: Vec<u8>,
        /// Body bytes.
        body: Vec<u8>,
    },
    /// The key does not exist.
    NotFound,
    /// Delete outcome: whether the key existed.
    Deleted(bool),
    /// Listing result.
    Keys(Vec<String>),
    /// The store rejected the request.
    Error(String),
}

fn put_blob(buf: &mut BytesMut, blob: &[u8]) {
    buf.put_u32(blob.len() as u32);
    buf.put_slice(blob);
}

fn put_str(buf: &mut BytesMut, s: &str) {
    put_blob(buf, s.as_bytes());
}

fn take_blob(buf: &mut Bytes) -> StoreResult<Vec<u8>> {
    if buf.remaining() < 4 {
        return Err(StoreError::Protocol("truncated length".to_owned()));
    }
    let len = buf.get_u32() as usize;
    if buf.remaining() < len {
        return Err(StoreError::Protocol(format!(
            "truncated blob: want {len}, have {}",
            buf.remaining()
        )));
    }
    Ok(buf.copy_to_bytes(len).to_vec())
}

fn take_str(buf: &mut Bytes) -> StoreResult<String> {
    let bytes = take_blob(buf)?;
    String::from_utf8(bytes).map_err(|_| StoreError::Protocol("invalid utf-8".to_owned()))
}

/// Encode a request payload (without the outer length prefix).
#[must_use]
pub fn encode_request(request: &StoreRequest) -> Bytes {
    let mut buf = BytesMut::new();
    buf.put_u64(request.id);
    match &request.op {
        StoreOp::Put { key, meta, body } => {
            buf.put_u8(OP_PUT);
            put_str(&mut buf, key);
            put_blob(&mut buf, meta);
            put_blob(&mut buf, body);
        }
        StoreOp::Get { key } => {
            buf.put_u8(OP_GET);
            put_str(&mut buf, key);
        }
        StoreOp::Delete { key } => {
            buf.put_u8(OP_DELETE);
            put_str(&mut buf, key);
        }
        StoreOp::List => buf.put_u8(OP_LIST),
    }
    buf.freeze()
}

/// Decode a request payload.
///
/// # Errors
///
/// Returns [`StoreError::Protocol`] on truncated or malformed input.
pub fn decode_request(mut payload: Bytes) -> StoreResult<StoreRequest> {
    if payload.remaining() < 9 {
        return Err(StoreError::Protocol("short request frame".to_owned()));
    }
    let id = payload.get_u64();
    let opcode = payload.get_u8();
    let op = match opcode {
        OP_PUT => StoreOp::Put {
            key: take_str(&mut payload)?,
            meta: take_blob(&mut payload)?,
            body: take_blob(&mut payload)?,
        },
        OP_GET => StoreOp::Get {
            key: take_str(&mut payload)?,
        },
        OP_DELETE => StoreOp::Delete {
            key: take_str(&mut payload)?,
        },
        OP_LIST => StoreOp::List,
        other => {
            return Err(StoreError::Protocol(format!("unknown opcode {other:#04x}")));
        }
    };
    if payload.has_remaining() {
        return Err(StoreError::Protocol("trailing bytes".to_owned()));
    }
    Ok(StoreRequest { id, op })
}

/// Encode a response payload (without the outer length prefix).
#[must_use]
pub fn encode_response(response: &StoreResponse) -> Bytes {
    let mut buf = BytesMut::new();
    buf.put_u64(response.id);
    match &response.reply {
        StoreReply::Ack => buf.put_u8(RE_ACK),
        StoreReply::Document { meta, body } => {
            buf.put_u8(RE_DOCUMENT);
            put_blob(&mut buf, meta);
            put_blob(&mut buf, body);
        }
        StoreReply::NotFound => buf.put_u8(RE_NOT_FOUND),
        StoreReply::Deleted(existed) => {
            buf.put_u8(RE_DELETED);
            buf.put_u8(u8::from(*existed));
        }
        StoreReply::Keys(keys) => {
            buf.put_u8(RE_KEYS);
            buf.put_u32(keys.len() as u32);
            for key in keys {
                put_str(&mut buf, key);
            }
        }
        StoreReply::Error(message) => {
            buf.put_u8(RE_ERROR);
            put_str(&mut buf, message);
        }
    }
    buf.freeze()
}

/// Decode a response payload.
///
/// # Errors
///
/// Returns [`StoreError::Protocol`] on truncated or malformed input.
pub fn decode_response(mut payload: Bytes) -> StoreResult<StoreResponse> {
    if payload.remaining() < 9 {
        return Err(StoreError::Protocol("short response frame".to_owned()));
    }
    let id = payload.get_u64();
    let opcode = payload.get_u8();
    let reply = match opcode {
        RE_ACK => StoreReply::Ack,
        RE_DOCUMENT => StoreReply::Document {
            meta: take_blob(&mut payload)?,
            body: take_blob(&mut payload)?,
        },
        RE_NOT_FOUND => StoreReply::NotFound,
        RE_DELETED => {
            if !payload.has_remaining() {
                return Err(StoreError::Protocol("truncated delete flag".to_owned()));
            }
            StoreReply::Deleted(payload.get_u8() != 0)
        }
        RE_KEYS => {
            if payload.remaining() < 4 {
                return Err(StoreError::Protocol("truncated key count".to_owned()));
            }
            let count = payload.get_u32() as usize;
            let mut keys = Vec::with_capacity(count.min(1024));
            for _ in 0..count {
                keys.push(take_str(&mut payload)?);
            }
            StoreReply::Keys(keys)
        }
        RE_ERROR => StoreReply::Error(take_str(&mut payload)?),
        other => {
            return Err(StoreError::Protocol(format!("unknown opcode {other:#04x}")));
        }
    };
    if payload.has_remaining() {
        return Err(StoreError::Protocol("trailing bytes".to_owned()));
    }
    Ok(StoreResponse { id, reply })
}

/// Write a length-prefixed frame.
///
/// # Errors
///
/// Returns [`StoreError::Io`] on write failure.
pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, payload: &[u8]) -> StoreResult<()> {
    if payload.len() > MAX_FRAME_BYTES {
        return Err(StoreError::Protocol(format!(
            "frame too large: {} bytes",
            payload.len()
        )));
    }
    writer
        .write_u32(payload.len() as u32)
        .await
        .map_err(|e| StoreError::Io(e.to_string()))?;
    writer
        .write_all(payload)
        .await
        .map_err(|e| StoreError::Io(e.to_string()))?;
    writer.flush().await.map_err(|e| StoreError::Io(e.to_string()))
}

/// Read one length-prefixed frame. Returns `None` on clean end of stream.
///
/// # Errors
///
/// Returns [`StoreError::Io`] on read failure and [`StoreError::Protocol`]
/// on an oversized frame.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> StoreResult<Option<Bytes>> {
    let len = match reader.read_u32().await {
        Ok(len) => len as usize,
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(StoreError::Io(e.to_string())),
    };
    if len > MAX_FRAME_BYTES {
        return Err(StoreError::Protocol(format!("frame too large: {len} bytes")));
    }
    let mut payload = vec![0u8; len];
    reader
        .read_exact(&mut payload)
        .await
        .map_err(|e| StoreError::Io(e.to_string()))?;
    Ok(Some(Bytes::from(payload)))
}
