// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Replication wire protocol
//!
//! Wire format: 4-byte length prefix (big-endian) + JSON payload
//!
//! Key lists and node values of any size are split across frames so every
//! frame stays well under [`MAX_MESSAGE_SIZE`].

use hb_core::NodeKey;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Version carried in the opening `Hello`
pub const PROTOCOL_VERSION: u32 = 1;

/// Largest frame accepted from a peer
pub const MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Keys per `Have` frame
pub const HAVE_BATCH: usize = 16 * 1024;

/// Value bytes per `Chunk` or `Node` frame, before hex encoding
pub const VALUE_CHUNK: usize = 1024 * 1024;

#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("message too large: {size} bytes (max {max})")]
    MessageTooLarge { size: usize, max: usize },
    #[error("connection closed")]
    ConnectionClosed,
    #[error("unsupported protocol version {0}")]
    Version(u32),
    #[error("unexpected frame: {0}")]
    Unexpected(&'static str),
}

/// Frames exchanged by a replication session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Frame {
    /// First frame on each side
    Hello { version: u32 },
    /// A batch of the node keys the sender holds
    Have { keys: Vec<NodeKey> },
    /// Every key of the sender has been listed
    Ready,
    /// Leading hex piece of the next node's value
    Chunk { value: String },
    /// One node; `value` is the hex of its last piece
    Node {
        key: NodeKey,
        parents: Vec<NodeKey>,
        value: String,
    },
    /// Sender has nothing more for this session
    Done,
}

impl Frame {
    pub fn kind(&self) -> &'static str {
        match self {
            Frame::Hello { .. } => "hello",
            Frame::Have { .. } => "have",
            Frame::Ready => "ready",
            Frame::Chunk { .. } => "chunk",
            Frame::Node { .. } => "node",
            Frame::Done => "done",
        }
    }
}

/// Encode a message to JSON bytes (without length prefix)
pub fn encode<T: Serialize>(msg: &T) -> Result<Vec<u8>, ProtocolError> {
    Ok(serde_json::to_vec(msg)?)
}

/// Decode a message from JSON bytes
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, ProtocolError> {
    Ok(serde_json::from_slice(bytes)?)
}

/// Read one length-prefixed message
///
/// A clean EOF before the length prefix is `ConnectionClosed`.
pub async fn read_message<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Vec<u8>, ProtocolError> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(ProtocolError::ConnectionClosed)
        }
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: len,
            max: MAX_MESSAGE_SIZE,
        });
    }

    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    Ok(buf)
}

/// Write one length-prefixed message
pub async fn write_message<W: AsyncWrite + Unpin>(
    writer: &mut W,
    data: &[u8],
) -> Result<(), ProtocolError> {
    if data.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: data.len(),
            max: MAX_MESSAGE_SIZE,
        });
    }
    let len = data.len() as u32;
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(data).await?;
    writer.flush().await?;
    Ok(())
}

pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Frame, ProtocolError> {
    decode(&read_message(reader).await?)
}

pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    frame: &Frame,
) -> Result<(), ProtocolError> {
    write_message(writer, &encode(frame)?).await
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
