// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Replication sessions
//!
//! Each side opens with `Hello`, lists the keys it holds in `Have` batches
//! closed by `Ready`, then sends every local node the other side lacks in
//! local order, which is causal order. A value larger than one frame goes
//! out as `Chunk`s followed by its `Node`. Non-live sessions close with
//! `Done` in both directions. Live sessions keep forwarding new local
//! nodes, skipping those the peer sent.
//!
//! ```text
//!  A                          B
//!  Hello, Have..., Ready ──────►
//!                 ◄──────  Hello, Have..., Ready
//!  [Chunk...] Node ...   ──────►
//!                 ◄──────  [Chunk...] Node ...
//!  Done           ──────►               (non-live)
//!                 ◄──────  Done
//! ```

use super::protocol::{
    read_frame, write_frame, Frame, ProtocolError, HAVE_BATCH, PROTOCOL_VERSION, VALUE_CHUNK,
};
use super::DagLog;
use crate::hex;
use hb_core::log::{
    AppendLog, LogError, LogNode, LogReader, NodeKey, ReadOptions, ReplicateOptions, Replication,
    SyncStats,
};
use hb_core::KvStore;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncWriteExt, DuplexStream, ReadHalf, WriteHalf};
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Buffer size of the in-process pipe handed to callers
const PIPE_CAPACITY: usize = 64 * 1024;

/// Keys the peer is known to hold
type KnownKeys = Arc<Mutex<HashSet<NodeKey>>>;

impl From<ProtocolError> for LogError {
    fn from(e: ProtocolError) -> Self {
        LogError::Replication(Box::new(e))
    }
}

pub(super) fn start<S: KvStore>(log: DagLog<S>, opts: ReplicateOptions) -> Replication {
    let (stream, session_end) = tokio::io::duplex(PIPE_CAPACITY);
    let session = tokio::spawn(run(log, session_end, opts));
    Replication { stream, session }
}

async fn run<S: KvStore>(
    log: DagLog<S>,
    stream: DuplexStream,
    opts: ReplicateOptions,
) -> Result<SyncStats, LogError> {
    let (read_half, write_half) = tokio::io::split(stream);
    let known: KnownKeys = Arc::default();
    let (have_tx, have_rx) = oneshot::channel();

    let receiving = receive(log.clone(), read_half, Arc::clone(&known), have_tx, opts.live);
    let sending = send(log, write_half, known, have_rx, opts.live);

    let stats = if opts.live {
        // Either direction ending ends the session
        tokio::select! {
            received = receiving => SyncStats { sent: 0, received: received? },
            sent = sending => SyncStats { sent: sent?, received: 0 },
        }
    } else {
        let (received, sent) = tokio::try_join!(receiving, sending)?;
        SyncStats { sent, received }
    };

    debug!(sent = stats.sent, received = stats.received, live = opts.live, "replication finished");
    Ok(stats)
}

async fn send<S: KvStore>(
    log: DagLog<S>,
    mut writer: WriteHalf<DuplexStream>,
    known: KnownKeys,
    have_rx: oneshot::Receiver<Vec<NodeKey>>,
    live: bool,
) -> Result<u64, LogError> {
    let mut reader = log.read_stream(ReadOptions { since: 0, live });
    let tail = log.changes();
    let have = all_keys(&log, tail).await?;

    write_frame(
        &mut writer,
        &Frame::Hello {
            version: PROTOCOL_VERSION,
        },
    )
    .await?;
    for batch in have.chunks(HAVE_BATCH) {
        write_frame(
            &mut writer,
            &Frame::Have {
                keys: batch.to_vec(),
            },
        )
        .await?;
    }
    write_frame(&mut writer, &Frame::Ready).await?;

    let Ok(peer_have) = have_rx.await else {
        // Receiver failed before the peer's key list; its error wins
        return Ok(0);
    };
    known
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .extend(peer_have);

    let mut sent = 0u64;
    while let Some(change) = reader.next().await {
        let node = change?.node;
        let first_time = known
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(node.key.clone());
        if !first_time {
            continue;
        }
        write_node(&mut writer, node).await?;
        sent += 1;
    }

    if !live {
        write_frame(&mut writer, &Frame::Done).await?;
    }
    writer.shutdown().await.map_err(ProtocolError::from)?;
    Ok(sent)
}

async fn receive<S: KvStore>(
    log: DagLog<S>,
    mut reader: ReadHalf<DuplexStream>,
    known: KnownKeys,
    have_tx: oneshot::Sender<Vec<NodeKey>>,
    live: bool,
) -> Result<u64, LogError> {
    match read_frame(&mut reader).await? {
        Frame::Hello { version } if version != PROTOCOL_VERSION => {
            return Err(ProtocolError::Version(version).into());
        }
        Frame::Hello { .. } => {}
        other => return Err(ProtocolError::Unexpected(other.kind()).into()),
    }
    let mut have = Vec::new();
    loop {
        match read_frame(&mut reader).await? {
            Frame::Have { keys } => have.extend(keys),
            Frame::Ready => break,
            other => return Err(ProtocolError::Unexpected(other.kind()).into()),
        }
    }
    let _ = have_tx.send(have);

    let mut orphans = Orphans::default();
    let mut pending = Vec::new();
    let mut received = 0u64;
    loop {
        let frame = match read_frame(&mut reader).await {
            Ok(frame) => frame,
            Err(ProtocolError::ConnectionClosed) if live => break,
            Err(e) => return Err(e.into()),
        };

        match frame {
            Frame::Chunk { value } => {
                let piece = hex::decode(&value).ok_or_else(|| {
                    LogError::Corrupt("value chunk from peer is not hex".to_string())
                })?;
                pending.extend_from_slice(&piece);
            }
            Frame::Node {
                key,
                parents,
                value,
            } => {
                let last = hex::decode(&value).ok_or_else(|| {
                    LogError::Corrupt(format!("node {} from peer has non-hex value", key))
                })?;
                let mut value = std::mem::take(&mut pending);
                value.extend_from_slice(&last);
                known
                    .lock()
                    .unwrap_or_else(|e| e.into_inner())
                    .insert(key.clone());
                received += orphans.offer(&log, LogNode { key, parents, value }).await?;
            }
            Frame::Done if pending.is_empty() => break,
            Frame::Done => {
                return Err(LogError::Corrupt(
                    "peer finished in the middle of a node value".to_string(),
                ))
            }
            other => return Err(ProtocolError::Unexpected(other.kind()).into()),
        }
    }

    if !orphans.is_empty() {
        warn!(count = orphans.len(), "peer finished with nodes whose parents never arrived");
    }
    Ok(received)
}

/// Send `node`, splitting its value so no frame outgrows the limit
async fn write_node(writer: &mut WriteHalf<DuplexStream>, node: LogNode) -> Result<(), LogError> {
    let mut pieces: Vec<&[u8]> = node.value.chunks(VALUE_CHUNK).collect();
    let last = pieces.pop().unwrap_or_default();
    for piece in pieces {
        write_frame(
            writer,
            &Frame::Chunk {
                value: hex::encode(piece),
            },
        )
        .await?;
    }
    write_frame(
        writer,
        &Frame::Node {
            key: node.key,
            parents: node.parents,
            value: hex::encode(last),
        },
    )
    .await?;
    Ok(())
}

/// Nodes waiting for a parent that has not arrived yet
#[derive(Default)]
struct Orphans {
    waiting: HashMap<NodeKey, LogNode>,
}

impl Orphans {
    /// Insert `node` if its parents are present, then any orphans it unblocks
    async fn offer<S: KvStore>(&mut self, log: &DagLog<S>, node: LogNode) -> Result<u64, LogError> {
        if !self.ready(log, &node).await? {
            self.waiting.insert(node.key.clone(), node);
            return Ok(0);
        }

        let mut inserted = u64::from(log.insert(node).await?.is_some());
        loop {
            let mut unblocked = None;
            for (key, waiting) in &self.waiting {
                if self.ready(log, waiting).await? {
                    unblocked = Some(key.clone());
                    break;
                }
            }
            let Some(node) = unblocked.and_then(|key| self.waiting.remove(&key)) else {
                break;
            };
            inserted += u64::from(log.insert(node).await?.is_some());
        }
        Ok(inserted)
    }

    async fn ready<S: KvStore>(&self, log: &DagLog<S>, node: &LogNode) -> Result<bool, LogError> {
        for parent in &node.parents {
            if !log.contains(parent).await? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn len(&self) -> usize {
        self.waiting.len()
    }

    fn is_empty(&self) -> bool {
        self.waiting.is_empty()
    }
}

async fn all_keys<S: KvStore>(log: &DagLog<S>, tail: u64) -> Result<Vec<NodeKey>, LogError> {
    let mut keys = Vec::with_capacity(tail as usize);
    for seq in 1..=tail {
        if let Some(change) = log.change_at(seq).await? {
            keys.push(change.node.key);
        }
    }
    Ok(keys)
}

#[cfg(test)]
#[path = "replicate_tests.rs"]
mod tests;
