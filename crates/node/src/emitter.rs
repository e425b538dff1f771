// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The event bus instance
//!
//! An [`Emitter`] ties one storage handle to its append log, the codec
//! registry, the listener table with its dispatcher, and the peer manager.
//! Emits become log nodes; log nodes, local or replicated, reach listeners
//! in log order.

use crate::announce;
use crate::config::NodeOptions;
use crate::error::{EmitError, NodeError, PeerError};
use crate::identity::{random_id, IdSource, StoreIdentity};
use crate::peer::PeerManager;
use crate::status::{StatusChannel, StatusEvent};
use crate::stream::{EventStream, StreamOptions};
use hb_core::{
    events, Announcement, AppendLog, Change, CodecError, CodecRegistry, CodecSet, Dispatcher,
    DispatcherHandle, Envelope, Frontier, Handler, KvStore, ListenerTable, PeerAddress, StoreError,
    ANNOUNCEMENT_EVENT,
};
use hb_storage::DagLog;
use serde_json::Value;
use std::net::SocketAddr;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tracing::{debug, info};

pub(crate) struct EmitterInner<S, L> {
    pub(crate) store: S,
    pub(crate) log: L,
    pub(crate) codecs: CodecRegistry,
    pub(crate) listeners: ListenerTable,
    pub(crate) frontier: Frontier,
    pub(crate) identity: StoreIdentity<S>,
    pub(crate) peers: PeerManager<S, L>,
    pub(crate) status: StatusChannel,
    pub(crate) dispatcher: std::sync::Mutex<Option<DispatcherHandle>>,
    pub(crate) position: watch::Receiver<u64>,
    pub(crate) closed: AtomicBool,
}

/// Replicated, schema-typed event bus over one storage handle
///
/// Cheap to clone; clones share state.
pub struct Emitter<S: KvStore, L: AppendLog = DagLog<S>> {
    pub(crate) inner: Arc<EmitterInner<S, L>>,
}

impl<S: KvStore, L: AppendLog> Clone for Emitter<S, L> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: KvStore> Emitter<S> {
    /// Open the bus kept in `store` using the built-in DAG log
    pub async fn open(store: S, options: NodeOptions) -> Result<Self, NodeError> {
        let log = DagLog::open(store.clone()).await?;
        Self::with_log(store, log, options).await
    }
}

impl<S: KvStore, L: AppendLog> Emitter<S, L> {
    pub async fn with_log(store: S, log: L, options: NodeOptions) -> Result<Self, NodeError> {
        Self::with_ids(store, log, options, Arc::new(random_id)).await
    }

    /// Like [`Emitter::with_log`], with the source of a fresh store identity
    pub async fn with_ids(
        store: S,
        log: L,
        options: NodeOptions,
        ids: IdSource,
    ) -> Result<Self, NodeError> {
        let status = StatusChannel::new();
        let identity = StoreIdentity::with_source(store.clone(), ids);
        let peers = PeerManager::new(store.clone(), log.clone(), options, status.clone());

        // Saved peers reconnect while the log is still discovering its heads
        announce::restore(&peers).await;

        let frontier = Frontier::new();
        let opened = async {
            log.ready().await?;
            frontier.refresh(&log).await
        };
        if let Err(e) = opened.await {
            peers.close().await;
            return Err(e.into());
        }

        let codecs = CodecRegistry::new();
        let listeners = ListenerTable::new();
        listeners.on(
            ANNOUNCEMENT_EVENT,
            announce::handler(identity.clone(), peers.clone()),
        );

        // Only entries appended after open reach listeners
        let since = log.changes();
        let dispatcher =
            Dispatcher::new(log.clone(), codecs.clone(), listeners.clone(), frontier.clone())
                .spawn(since);
        let position = dispatcher.subscribe();
        info!(since, "bus opened");

        Ok(Self {
            inner: Arc::new(EmitterInner {
                store,
                log,
                codecs,
                listeners,
                frontier,
                identity,
                peers,
                status,
                dispatcher: std::sync::Mutex::new(Some(dispatcher)),
                position,
                closed: AtomicBool::new(false),
            }),
        })
    }

    /// Append `name` with `payload` after this process's frontier
    ///
    /// Fails without touching the log when `name` has no codec.
    pub async fn emit(&self, name: &str, payload: &Value) -> Result<Change, EmitError> {
        if self.is_closed() {
            return Err(EmitError::Closed);
        }
        let encoded = self.inner.codecs.encode(name, payload)?;
        let envelope = Envelope::new(name, encoded).encode()?;
        let change = self.inner.frontier.append(&self.inner.log, envelope).await?;
        debug!(event = name, seq = change.seq, key = %change.node.key, "emitted");
        Ok(change)
    }

    /// Register `handler` for events named `name`
    ///
    /// Keep a clone of the handler to remove it later.
    pub fn on(&self, name: impl Into<String>, handler: Handler) {
        self.inner.listeners.on(name, handler);
    }

    /// Remove a handler registered with [`Emitter::on`]; false if unknown
    pub fn remove_listener(&self, name: &str, handler: &Handler) -> bool {
        self.inner.listeners.remove(name, handler)
    }

    pub fn register_codec(&self, codecs: impl Into<CodecSet>) -> Result<(), CodecError> {
        self.inner.codecs.register(codecs)
    }

    /// Persistent identity of the underlying store
    pub async fn id(&self) -> Result<String, StoreError> {
        self.inner.identity.get().await
    }

    /// Accept peers on `host:port` (all interfaces when `host` is `None`)
    ///
    /// Broadcasts an announcement unless an identical one was broadcast by
    /// this store before.
    pub async fn listen(&self, port: u16, host: Option<&str>) -> Result<SocketAddr, NodeError> {
        let id = self.id().await?;
        let host = host.unwrap_or("0.0.0.0");
        let addr = self.inner.peers.listen(host, port).await?;

        let announcement = Announcement {
            id,
            addresses: announce::reachable_addresses(host, addr.port()),
        };
        if announce::is_new(&self.inner.store, &announcement).await? {
            self.emit(ANNOUNCEMENT_EVENT, &serde_json::to_value(&announcement)?)
                .await?;
            announce::remember(&self.inner.store, &announcement).await?;
            info!(addresses = announcement.addresses.len(), "announced");
        } else {
            debug!("announcement unchanged");
        }
        Ok(addr)
    }

    /// Replicate with the node at `host:port`
    pub async fn connect(&self, port: u16, host: &str) -> Result<(), PeerError> {
        self.inner.peers.connect(PeerAddress::new(host, port)).await
    }

    pub fn stream(&self, opts: StreamOptions) -> EventStream<S, L> {
        EventStream::new(self.clone(), opts)
    }

    /// Subscribe to status notifications
    pub fn status(&self) -> broadcast::Receiver<StatusEvent> {
        self.inner.status.subscribe()
    }

    pub fn peers(&self) -> &PeerManager<S, L> {
        &self.inner.peers
    }

    pub fn log(&self) -> &L {
        &self.inner.log
    }

    pub fn codecs(&self) -> &CodecRegistry {
        &self.inner.codecs
    }

    /// Tail position of the log
    pub fn changes(&self) -> u64 {
        self.inner.log.changes()
    }

    /// Position of the last entry every listener completed
    pub fn position(&self) -> u64 {
        *self.inner.position.borrow()
    }

    /// Wait until the dispatcher has completed entry `seq`; false if it stopped
    pub async fn wait_dispatched(&self, seq: u64) -> bool {
        let mut position = self.inner.position.clone();
        events::wait_dispatched(&mut position, seq).await
    }
}

#[cfg(test)]
#[path = "emitter_tests.rs"]
mod tests;
