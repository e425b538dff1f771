// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stream mode of the `hbd` binary
//!
//! Each input line is a JSON object `{"name": ..., "payload": ...}` that is
//! emitted. Every stream item is written as one JSON line. At end of input
//! the items up to the tail observed at that moment are drained, then the
//! node closes.

use crate::config::DaemonConfig;
use crate::emitter::Emitter;
use crate::error::NodeError;
use crate::stream::{StartFrom, StreamItem, StreamOptions};
use hb_core::{CodecError, KvStore, SchemaCodec};
use hb_storage::{FileStore, MemoryStore, TracedStore, WalError};
use serde::Deserialize;
use serde_json::Value;
use std::future::Future;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

const ITEM_BUFFER: usize = 256;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("failed to open store: {0}")]
    Store(#[from] WalError),
    #[error(transparent)]
    Node(#[from] NodeError),
    #[error("invalid event schema: {0}")]
    Codec(#[from] CodecError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Deserialize)]
struct InputLine {
    name: String,
    #[serde(default)]
    payload: Value,
}

/// Run a node described by `config` until `input` ends or `shutdown` fires
pub async fn run<R, W>(
    config: DaemonConfig,
    input: R,
    output: W,
    shutdown: impl Future<Output = ()>,
) -> Result<(), DaemonError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    match &config.store {
        Some(dir) => {
            info!(dir = %dir.display(), "using file store");
            let store = TracedStore::new(FileStore::open(dir)?);
            serve(store, &config, input, output, shutdown).await
        }
        None => {
            info!("using memory store");
            let store = TracedStore::new(MemoryStore::new());
            serve(store, &config, input, output, shutdown).await
        }
    }
}

async fn serve<S, R, W>(
    store: S,
    config: &DaemonConfig,
    input: R,
    output: W,
    shutdown: impl Future<Output = ()>,
) -> Result<(), DaemonError>
where
    S: KvStore,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let emitter = Emitter::open(store, config.options.clone())
        .await
        .map_err(DaemonError::Node)?;
    let result = drive(&emitter, config, input, output, shutdown).await;
    let closed = emitter.close().await;
    result?;
    closed?;
    info!("node stopped");
    Ok(())
}

async fn drive<S, R, W>(
    emitter: &Emitter<S>,
    config: &DaemonConfig,
    input: R,
    mut output: W,
    shutdown: impl Future<Output = ()>,
) -> Result<(), DaemonError>
where
    S: KvStore,
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    for (name, fields) in &config.events {
        emitter.register_codec((name.clone(), SchemaCodec::new(name.clone(), fields.clone())))?;
    }

    let from = if config.from_beginning {
        StartFrom::Beginning
    } else {
        StartFrom::Tail
    };
    let stream = emitter.stream(StreamOptions { from });
    let mut written = stream.position();
    let (sink, mut source) = stream.into_split();

    if let Some(listen) = &config.listen {
        let addr = emitter.listen(listen.port, Some(listen.host.as_str())).await?;
        info!(%addr, "listening");
    }
    for peer in &config.peers {
        emitter
            .peers()
            .connect_background(peer.clone())
            .await
            .map_err(NodeError::from)?;
    }

    // Reads are not cancel-safe, so they run on their own task
    let (items_tx, mut items) = mpsc::channel::<(u64, StreamItem)>(ITEM_BUFFER);
    let reader = tokio::spawn(async move {
        while let Some(item) = source.next().await {
            if items_tx.send((source.position(), item)).await.is_err() {
                break;
            }
        }
    });

    let mut lines = input.lines();
    let mut drain_to: Option<u64> = None;
    tokio::pin!(shutdown);

    let result = loop {
        if drain_to.is_some_and(|tail| written >= tail) {
            break Ok(());
        }
        tokio::select! {
            _ = &mut shutdown => {
                info!("shutdown requested");
                break Ok(());
            }
            line = lines.next_line(), if drain_to.is_none() => match line {
                Ok(Some(line)) => {
                    let line = line.trim();
                    if line.is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<InputLine>(line) {
                        Ok(input) => {
                            if let Err(e) = sink.send(&input.name, &input.payload).await {
                                warn!(event = %input.name, error = %e, "emit failed");
                            }
                        }
                        Err(e) => warn!(error = %e, "ignoring malformed input line"),
                    }
                }
                Ok(None) => {
                    let tail = emitter.changes();
                    debug!(tail, "input ended, draining");
                    drain_to = Some(tail);
                }
                Err(e) => break Err(e.into()),
            },
            item = items.recv() => {
                let Some((position, item)) = item else {
                    break Ok(());
                };
                let mut line = serde_json::to_vec(&item)?;
                line.push(b'\n');
                if let Err(e) = output.write_all(&line).await {
                    break Err(e.into());
                }
                written = position;
            }
        }
    };

    reader.abort();
    output.flush().await?;
    result
}

#[cfg(test)]
#[path = "daemon_tests.rs"]
mod tests;
