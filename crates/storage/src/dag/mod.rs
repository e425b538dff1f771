// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Content-addressed append log over a key/value store
//!
//! Records, all under the reserved log prefix:
//!
//! ```text
//! !!LOG!!node!<key>      {parents, value (hex), seq}
//! !!LOG!!change!<seq>    node key at that position (seq zero-padded)
//! !!LOG!!meta            {changes, heads}   commit point of each insert
//! ```
//!
//! A node record whose `seq` is beyond the committed `changes` belongs to an
//! insert that never committed and reads as absent.

mod protocol;
mod reader;
mod replicate;

pub use protocol::{Frame, ProtocolError, PROTOCOL_VERSION};
pub use reader::DagReader;

use crate::hex;
use async_trait::async_trait;
use hb_core::log::{
    AppendLog, Change, LogError, LogNode, NodeKey, ReadOptions, ReplicateOptions, Replication,
};
use hb_core::store::{self, KvStore, LOG_KEY_PREFIX};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::{watch, Mutex};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct LogMeta {
    changes: u64,
    heads: BTreeSet<NodeKey>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredNode {
    parents: Vec<NodeKey>,
    value: String,
    seq: u64,
}

struct DagInner<S> {
    store: S,
    /// Serializes inserts; holds the committed metadata
    meta: Mutex<LogMeta>,
    tail: watch::Sender<u64>,
    closed: watch::Sender<bool>,
}

/// DAG log persisted through any [`KvStore`]
///
/// Cheap to clone; clones share state.
pub struct DagLog<S> {
    inner: Arc<DagInner<S>>,
}

impl<S> Clone for DagLog<S> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Content key of a node: sha256 over its sorted parents and value
pub fn node_key(parents: &[NodeKey], value: &[u8]) -> NodeKey {
    let sorted: BTreeSet<&NodeKey> = parents.iter().collect();
    let mut hasher = Sha256::new();
    for parent in sorted {
        hasher.update(parent.as_str().as_bytes());
        hasher.update(b"\n");
    }
    hasher.update([0u8]);
    hasher.update(value);
    NodeKey(hex::encode(&hasher.finalize()[..]))
}

fn meta_key() -> String {
    format!("{}meta", LOG_KEY_PREFIX)
}

fn node_record_key(key: &NodeKey) -> String {
    format!("{}node!{}", LOG_KEY_PREFIX, key)
}

fn change_record_key(seq: u64) -> String {
    format!("{}change!{:020}", LOG_KEY_PREFIX, seq)
}

impl<S: KvStore> DagLog<S> {
    /// Open the log kept in `store`, loading its committed metadata
    pub async fn open(store: S) -> Result<Self, LogError> {
        let meta: LogMeta = store::get_json(&store, &meta_key())
            .await?
            .unwrap_or_default();
        tracing::debug!(changes = meta.changes, heads = meta.heads.len(), "log opened");

        let (tail, _) = watch::channel(meta.changes);
        let (closed, _) = watch::channel(false);

        Ok(Self {
            inner: Arc::new(DagInner {
                store,
                meta: Mutex::new(meta),
                tail,
                closed,
            }),
        })
    }

    pub fn store(&self) -> &S {
        &self.inner.store
    }

    pub fn is_closed(&self) -> bool {
        *self.inner.closed.borrow()
    }

    /// True if `key` is a committed node of this log
    pub async fn contains(&self, key: &NodeKey) -> Result<bool, LogError> {
        Ok(self.node(key, self.changes()).await?.is_some())
    }

    /// Node at position `seq`, if committed
    pub async fn change_at(&self, seq: u64) -> Result<Option<Change>, LogError> {
        if seq == 0 || seq > self.changes() {
            return Ok(None);
        }
        let record = change_record_key(seq);
        let key: NodeKey = store::get_json(&self.inner.store, &record)
            .await?
            .ok_or_else(|| LogError::Corrupt(format!("missing change record {}", seq)))?;
        let (_, node) = self.node(&key, seq).await?.ok_or_else(|| {
            LogError::Corrupt(format!("change {} points at missing node {}", seq, key))
        })?;
        Ok(Some(Change { seq, node }))
    }

    /// Insert a node received from elsewhere
    ///
    /// Returns `None` when the node is already present. The announced key is
    /// checked against the content.
    pub async fn insert(&self, node: LogNode) -> Result<Option<Change>, LogError> {
        let computed = node_key(&node.parents, &node.value);
        if computed != node.key {
            return Err(LogError::KeyMismatch {
                announced: node.key,
                computed,
            });
        }

        let mut meta = self.inner.meta.lock().await;
        self.ensure_open()?;
        if self.node(&node.key, meta.changes).await?.is_some() {
            return Ok(None);
        }
        for parent in &node.parents {
            if self.node(parent, meta.changes).await?.is_none() {
                return Err(LogError::MissingParent {
                    key: node.key.clone(),
                    parent: parent.clone(),
                });
            }
        }
        self.commit(&mut meta, node).await.map(Some)
    }

    /// Write node, change and metadata records; the metadata put commits
    async fn commit(&self, meta: &mut LogMeta, node: LogNode) -> Result<Change, LogError> {
        let seq = meta.changes + 1;
        let stored = StoredNode {
            parents: node.parents.clone(),
            value: hex::encode(&node.value),
            seq,
        };
        store::put_json(&self.inner.store, &node_record_key(&node.key), &stored).await?;
        store::put_json(&self.inner.store, &change_record_key(seq), &node.key).await?;

        let mut next = meta.clone();
        for parent in &node.parents {
            next.heads.remove(parent);
        }
        next.heads.insert(node.key.clone());
        next.changes = seq;
        store::put_json(&self.inner.store, &meta_key(), &next).await?;

        *meta = next;
        self.inner.tail.send_replace(seq);
        tracing::trace!(seq, key = %node.key, parents = node.parents.len(), "node committed");
        Ok(Change { seq, node })
    }

    async fn node(
        &self,
        key: &NodeKey,
        committed: u64,
    ) -> Result<Option<(u64, LogNode)>, LogError> {
        let stored: Option<StoredNode> =
            store::get_json(&self.inner.store, &node_record_key(key)).await?;
        let Some(stored) = stored else {
            return Ok(None);
        };
        if stored.seq > committed {
            return Ok(None);
        }
        let value = hex::decode(&stored.value)
            .ok_or_else(|| LogError::Corrupt(format!("node {} value is not hex", key)))?;
        Ok(Some((
            stored.seq,
            LogNode {
                key: key.clone(),
                parents: stored.parents,
                value,
            },
        )))
    }

    fn ensure_open(&self) -> Result<(), LogError> {
        if self.is_closed() {
            return Err(LogError::Closed);
        }
        Ok(())
    }

    pub(crate) fn subscribe_tail(&self) -> watch::Receiver<u64> {
        self.inner.tail.subscribe()
    }

    pub(crate) fn subscribe_closed(&self) -> watch::Receiver<bool> {
        self.inner.closed.subscribe()
    }
}

#[async_trait]
impl<S: KvStore> AppendLog for DagLog<S> {
    type Reader = DagReader<S>;

    async fn ready(&self) -> Result<(), LogError> {
        self.ensure_open()
    }

    async fn heads(&self) -> Result<Vec<NodeKey>, LogError> {
        let meta = self.inner.meta.lock().await;
        Ok(meta.heads.iter().cloned().collect())
    }

    async fn add(&self, parents: &[NodeKey], value: Vec<u8>) -> Result<Change, LogError> {
        let parents: Vec<NodeKey> = parents
            .iter()
            .cloned()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let key = node_key(&parents, &value);

        let mut meta = self.inner.meta.lock().await;
        self.ensure_open()?;
        for parent in &parents {
            if self.node(parent, meta.changes).await?.is_none() {
                return Err(LogError::MissingParent {
                    key: key.clone(),
                    parent: parent.clone(),
                });
            }
        }
        if let Some((seq, node)) = self.node(&key, meta.changes).await? {
            // Same content after the same parents is the same node
            return Ok(Change { seq, node });
        }

        self.commit(&mut meta, LogNode { key, parents, value }).await
    }

    fn changes(&self) -> u64 {
        *self.inner.tail.borrow()
    }

    fn read_stream(&self, opts: ReadOptions) -> DagReader<S> {
        DagReader::new(self.clone(), opts)
    }

    fn replicate(&self, opts: ReplicateOptions) -> Replication {
        replicate::start(self.clone(), opts)
    }

    async fn close(&self) -> Result<(), LogError> {
        if !self.inner.closed.send_replace(true) {
            tracing::debug!(changes = self.changes(), "log closed");
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "dag_tests.rs"]
mod tests;
