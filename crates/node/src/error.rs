// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Node error types

use hb_core::{CodecError, LogError, StoreError};
use std::io;
use thiserror::Error;

/// Errors returned by `emit`
#[derive(Debug, Error)]
pub enum EmitError {
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("log error: {0}")]
    Log(#[from] LogError),
    #[error("emitter is closed")]
    Closed,
}

impl EmitError {
    /// True for an emit of a name with no registered codec
    pub fn is_unsupported(&self) -> bool {
        matches!(self, EmitError::Codec(CodecError::UnsupportedEvent(_)))
    }
}

/// Errors from listening and connecting
#[derive(Debug, Error)]
pub enum PeerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },
    #[error("failed to connect to {peer} after {attempts} attempts: {source}")]
    Connect {
        peer: String,
        attempts: u32,
        #[source]
        source: io::Error,
    },
    #[error("already listening on {0}")]
    AlreadyListening(std::net::SocketAddr),
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
    #[error("replication failed: {0}")]
    Replication(#[from] LogError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("peer manager is closed")]
    Closed,
}

/// Errors from node-level operations
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
    #[error("log error: {0}")]
    Log(#[from] LogError),
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("emit failed: {0}")]
    Emit(#[from] EmitError),
    #[error("peer error: {0}")]
    Peer(#[from] PeerError),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}
