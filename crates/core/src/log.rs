// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-log contract
//!
//! The node depends only on this contract: a content-addressed DAG of
//! immutable nodes, a tail position for live reads, and a duplex byte
//! channel that merges two logs when piped against each other.
//!
//! ```text
//! emit → add(frontier, envelope) ──► log ──► read_stream(since, live) → dispatcher
//!                                    ▲ │
//!                      replicate() ──┘ └── replicate() ⇄ socket ⇄ peer
//! ```

use crate::store::StoreError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tokio::io::DuplexStream;
use tokio::task::JoinHandle;

/// Content-derived identifier of a log node
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeKey(pub String);

impl NodeKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An immutable node of the log
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogNode {
    pub key: NodeKey,
    pub parents: Vec<NodeKey>,
    pub value: Vec<u8>,
}

/// A node together with its local position in the log
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    /// 1-based position in local insertion order
    pub seq: u64,
    pub node: LogNode,
}

/// Options for [`AppendLog::read_stream`]
#[derive(Debug, Clone, Copy, Default)]
pub struct ReadOptions {
    /// Yield changes strictly after this position; 0 replays everything
    pub since: u64,
    /// Keep waiting for new changes once the current tail is reached
    pub live: bool,
}

impl ReadOptions {
    pub fn live_since(since: u64) -> Self {
        Self { since, live: true }
    }
}

/// Options for [`AppendLog::replicate`]
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplicateOptions {
    /// Keep forwarding new nodes after the initial exchange
    pub live: bool,
}

/// Counters reported by a finished replication session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStats {
    pub sent: u64,
    pub received: u64,
}

/// A running replication session
///
/// Pipe `stream` bidirectionally against any reliable byte transport.
/// `session` resolves once the exchange finishes or the transport closes.
pub struct Replication {
    pub stream: DuplexStream,
    pub session: JoinHandle<Result<SyncStats, LogError>>,
}

#[derive(Debug, Error)]
pub enum LogError {
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
    #[error("unknown parent {parent} for node {key}")]
    MissingParent { key: NodeKey, parent: NodeKey },
    #[error("node key mismatch: announced {announced}, computed {computed}")]
    KeyMismatch { announced: NodeKey, computed: NodeKey },
    #[error("log is corrupt: {0}")]
    Corrupt(String),
    #[error("replication failed: {0}")]
    Replication(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("log is closed")]
    Closed,
}

/// A lazy, possibly infinite sequence of changes
#[async_trait]
pub trait LogReader: Send + 'static {
    /// Next change, or `None` once the sequence ends (non-live tail reached,
    /// or the log was closed)
    async fn next(&mut self) -> Option<Result<Change, LogError>>;
}

/// Content-addressed causal log
#[async_trait]
pub trait AppendLog: Clone + Send + Sync + 'static {
    type Reader: LogReader;

    /// Resolves once initial head discovery has completed
    async fn ready(&self) -> Result<(), LogError>;

    /// Nodes with no known successor
    async fn heads(&self) -> Result<Vec<NodeKey>, LogError>;

    /// Append `value` causally after `parents`
    async fn add(&self, parents: &[NodeKey], value: Vec<u8>) -> Result<Change, LogError>;

    /// Current tail position, usable as a `since` value
    fn changes(&self) -> u64;

    fn read_stream(&self, opts: ReadOptions) -> Self::Reader;

    fn replicate(&self, opts: ReplicateOptions) -> Replication;

    /// Ends live readers and replication sessions; does not close storage
    async fn close(&self) -> Result<(), LogError>;
}
