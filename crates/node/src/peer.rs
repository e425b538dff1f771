// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Peer connections
//!
//! Every TCP connection, inbound or outbound, carries one live replication
//! session of the log. Outbound peers are supervised per `"host:port"` key:
//!
//! ```text
//! absent ──connect──► connecting ──ok──► connected
//!                       ▲    │              │
//!                       │  error         closed/error
//!                       │    ▼              │
//!                       └── backoff ◄───────┘
//!                            │ attempts exhausted or node closed
//!                            ▼
//!                          absent
//! ```
//!
//! The entry stays in the map during backoff, so a second `connect` for the
//! same key joins the running supervisor instead of starting another.

use crate::config::NodeOptions;
use crate::error::PeerError;
use crate::status::{StatusChannel, StatusEvent};
use hb_core::store::{self, PEERS_KEY};
use hb_core::{AppendLog, KvStore, PeerAddress, ReplicateOptions, Replication, StoreError};
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{oneshot, watch, Mutex, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeerState {
    Connecting,
    Connected,
}

#[derive(Debug, Clone)]
struct Outbound {
    peer: PeerAddress,
    state: PeerState,
    /// Stays in the address book while reconnecting
    ever_connected: bool,
}

type Waiter = oneshot::Sender<Result<(), PeerError>>;

struct PeerInner<S, L> {
    store: S,
    log: L,
    options: NodeOptions,
    status: StatusChannel,
    /// Held across every read-modify-persist of the address book
    outbound: Mutex<BTreeMap<String, Outbound>>,
    clients: std::sync::Mutex<HashMap<u64, SocketAddr>>,
    next_client: AtomicU64,
    closed: AtomicBool,
    shutdown: watch::Sender<bool>,
    tasks: std::sync::Mutex<JoinSet<()>>,
    server: std::sync::Mutex<Option<(SocketAddr, JoinHandle<()>)>>,
    close_slots: Semaphore,
}

/// Owns the listening socket and every peer connection
pub struct PeerManager<S, L> {
    inner: Arc<PeerInner<S, L>>,
}

impl<S, L> Clone for PeerManager<S, L> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Resolves once `shutdown` is set, including when it already was
async fn shutdown_signal(shutdown: &mut watch::Receiver<bool>) {
    let _ = shutdown.wait_for(|closed| *closed).await;
}

impl<S: KvStore, L: AppendLog> PeerManager<S, L> {
    pub fn new(store: S, log: L, options: NodeOptions, status: StatusChannel) -> Self {
        let (shutdown, _) = watch::channel(false);
        let close_slots = Semaphore::new(options.close_concurrency.max(1));
        Self {
            inner: Arc::new(PeerInner {
                store,
                log,
                options,
                status,
                outbound: Mutex::new(BTreeMap::new()),
                clients: std::sync::Mutex::new(HashMap::new()),
                next_client: AtomicU64::new(1),
                closed: AtomicBool::new(false),
                shutdown,
                tasks: std::sync::Mutex::new(JoinSet::new()),
                server: std::sync::Mutex::new(None),
                close_slots,
            }),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Bind `host:port` and accept replication clients until close
    pub async fn listen(&self, host: &str, port: u16) -> Result<SocketAddr, PeerError> {
        if self.is_closed() {
            return Err(PeerError::Closed);
        }
        let running = self
            .inner
            .server
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .filter(|(_, task)| !task.is_finished())
            .map(|(addr, _)| *addr);
        if let Some(addr) = running {
            return Err(PeerError::AlreadyListening(addr));
        }

        let listener = TcpListener::bind((host, port))
            .await
            .map_err(|source| PeerError::Bind {
                addr: format!("{}:{}", host, port),
                source,
            })?;
        let addr = listener.local_addr()?;
        info!(%addr, "listening for peers");

        let handle = tokio::spawn(serve(self.clone(), listener));
        *self.inner.server.lock().unwrap_or_else(|e| e.into_inner()) = Some((addr, handle));
        self.inner.status.emit(StatusEvent::Listening { addr });
        Ok(addr)
    }

    /// Connect to `peer`, resolving once the first connection is up
    ///
    /// Resolves immediately when the peer is already known. Fails only when
    /// every attempt failed or the node closed first.
    pub async fn connect(&self, peer: PeerAddress) -> Result<(), PeerError> {
        match self.start(peer).await? {
            Some(waiter) => waiter.await.unwrap_or(Err(PeerError::Closed)),
            None => Ok(()),
        }
    }

    /// Start supervising `peer` without waiting for the outcome
    pub async fn connect_background(&self, peer: PeerAddress) -> Result<(), PeerError> {
        self.start(peer).await.map(|_| ())
    }

    async fn start(
        &self,
        peer: PeerAddress,
    ) -> Result<Option<oneshot::Receiver<Result<(), PeerError>>>, PeerError> {
        if self.is_closed() {
            return Err(PeerError::Closed);
        }
        let key = peer.key();
        {
            let mut outbound = self.inner.outbound.lock().await;
            if outbound.contains_key(&key) {
                debug!(peer = %key, "already connected or connecting");
                return Ok(None);
            }
            outbound.insert(
                key,
                Outbound {
                    peer: peer.clone(),
                    state: PeerState::Connecting,
                    ever_connected: false,
                },
            );
        }

        let (tx, rx) = oneshot::channel();
        if !self.spawn(supervise(self.clone(), peer.clone(), tx)) {
            self.inner.outbound.lock().await.remove(&peer.key());
            return Err(PeerError::Closed);
        }
        Ok(Some(rx))
    }

    /// Outbound peers by key with their state
    pub async fn peers(&self) -> BTreeMap<String, PeerState> {
        self.inner
            .outbound
            .lock()
            .await
            .iter()
            .map(|(key, entry)| (key.clone(), entry.state))
            .collect()
    }

    /// Address of the listening socket, if any
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.inner
            .server
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|(addr, _)| *addr)
    }

    /// Number of inbound clients currently attached
    pub fn client_count(&self) -> usize {
        self.inner
            .clients
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    /// Address book persisted by previous runs
    pub async fn saved_peers(&self) -> Result<Vec<PeerAddress>, StoreError> {
        Ok(store::get_json(&self.inner.store, PEERS_KEY)
            .await?
            .unwrap_or_default())
    }

    /// Stop reconnecting, then close connections and the server
    ///
    /// Connections get `close_grace` to shut down; stragglers are aborted.
    pub async fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        self.inner.shutdown.send_replace(true);

        let mut tasks = std::mem::take(&mut *self.inner.tasks.lock().unwrap_or_else(|e| e.into_inner()));
        let pending = tasks.len();
        let drained = tokio::time::timeout(self.inner.options.close_grace, async {
            while tasks.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            warn!(remaining = tasks.len(), "connections did not close in time, aborting");
            tasks.abort_all();
            while tasks.join_next().await.is_some() {}
        }

        let server = self.inner.server.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some((_, server)) = server {
            if let Err(e) = server.await {
                warn!(error = %e, "server task failed");
            }
        }
        info!(connections = pending, "peers closed");
    }

    /// Track `task` until close; false once closed
    fn spawn(&self, task: impl Future<Output = ()> + Send + 'static) -> bool {
        let mut tasks = self.inner.tasks.lock().unwrap_or_else(|e| e.into_inner());
        if self.is_closed() {
            return false;
        }
        while tasks.try_join_next().is_some() {}
        tasks.spawn(task);
        true
    }

    async fn set_state(&self, key: &str, state: PeerState) -> Result<(), StoreError> {
        let mut outbound = self.inner.outbound.lock().await;
        if let Some(entry) = outbound.get_mut(key) {
            entry.state = state;
            entry.ever_connected |= state == PeerState::Connected;
        }
        if state != PeerState::Connected {
            return Ok(());
        }
        let book: Vec<&PeerAddress> = outbound
            .values()
            .filter(|entry| entry.ever_connected)
            .map(|entry| &entry.peer)
            .collect();
        store::put_json(&self.inner.store, PEERS_KEY, &book).await
    }

    /// Carry a live replication session over `socket` until either side ends
    async fn pipe(&self, mut socket: TcpStream) -> Result<(), PeerError> {
        let mut shutdown = self.inner.shutdown.subscribe();
        let Replication {
            mut stream,
            session,
        } = self.inner.log.replicate(ReplicateOptions { live: true });

        let copied = tokio::select! {
            copied = tokio::io::copy_bidirectional(&mut socket, &mut stream) => Some(copied),
            _ = shutdown_signal(&mut shutdown) => None,
        };

        let Some(copied) = copied else {
            let _permit = self.inner.close_slots.acquire().await;
            let _ = tokio::time::timeout(self.inner.options.close_grace, socket.shutdown()).await;
            session.abort();
            return Ok(());
        };

        drop(stream);
        let stats = match tokio::time::timeout(self.inner.options.close_grace, session).await {
            Ok(Ok(stats)) => stats?,
            Ok(Err(e)) => {
                warn!(error = %e, "replication task failed");
                return Ok(());
            }
            Err(_) => {
                warn!("replication session did not finish after transport closed");
                return Ok(());
            }
        };
        let (bytes_in, bytes_out) = copied?;
        debug!(
            sent = stats.sent,
            received = stats.received,
            bytes_in,
            bytes_out,
            "connection finished"
        );
        Ok(())
    }
}

/// Reconnect loop of one outbound peer
async fn supervise<S: KvStore, L: AppendLog>(
    peers: PeerManager<S, L>,
    peer: PeerAddress,
    waiter: Waiter,
) {
    let inner = &peers.inner;
    let key = peer.key();
    let mut waiter = Some(waiter);
    let mut shutdown = inner.shutdown.subscribe();
    let mut attempt = 0u32;

    loop {
        attempt += 1;
        let connected = tokio::select! {
            _ = shutdown_signal(&mut shutdown) => break,
            connected = TcpStream::connect((peer.address.as_str(), peer.port)) => connected,
        };

        match connected {
            Ok(socket) => {
                attempt = 0;
                if let Err(e) = peers.set_state(&key, PeerState::Connected).await {
                    warn!(peer = %key, error = %e, "failed to persist address book");
                    inner.status.emit(StatusEvent::Error {
                        error: e.to_string(),
                    });
                }
                info!(peer = %key, "connected");
                inner.status.emit(StatusEvent::Connected { peer: key.clone() });
                if let Some(waiter) = waiter.take() {
                    let _ = waiter.send(Ok(()));
                }

                let result = peers.pipe(socket).await;
                if peers.is_closed() {
                    break;
                }
                match result {
                    Ok(()) => {
                        info!(peer = %key, "disconnected");
                        inner.status.emit(StatusEvent::Disconnected { peer: key.clone() });
                    }
                    Err(e) => {
                        warn!(peer = %key, error = %e, "connection failed");
                        inner.status.emit(StatusEvent::ConnectionError {
                            peer: key.clone(),
                            attempt,
                            error: e.to_string(),
                        });
                    }
                }
                let _ = peers.set_state(&key, PeerState::Connecting).await;
            }
            Err(e) => {
                warn!(peer = %key, attempt, error = %e, "connect failed");
                inner.status.emit(StatusEvent::ConnectionError {
                    peer: key.clone(),
                    attempt,
                    error: e.to_string(),
                });
                if attempt >= inner.options.max_attempts {
                    warn!(peer = %key, attempts = attempt, "giving up on peer");
                    inner.outbound.lock().await.remove(&key);
                    if let Some(waiter) = waiter.take() {
                        let _ = waiter.send(Err(PeerError::Connect {
                            peer: key,
                            attempts: attempt,
                            source: e,
                        }));
                    }
                    return;
                }
            }
        }

        tokio::select! {
            _ = shutdown_signal(&mut shutdown) => break,
            _ = tokio::time::sleep(inner.options.reconnect_timeout) => {}
        }
    }

    inner.outbound.lock().await.remove(&key);
    if let Some(waiter) = waiter.take() {
        let _ = waiter.send(Err(PeerError::Closed));
    }
}

/// Accept loop of the listening socket
async fn serve<S: KvStore, L: AppendLog>(peers: PeerManager<S, L>, listener: TcpListener) {
    let mut shutdown = peers.inner.shutdown.subscribe();
    loop {
        let accepted = tokio::select! {
            _ = shutdown_signal(&mut shutdown) => break,
            accepted = listener.accept() => accepted,
        };
        let (socket, remote) = match accepted {
            Ok(accepted) => accepted,
            Err(e) => {
                warn!(error = %e, "accept failed");
                peers.inner.status.emit(StatusEvent::Error {
                    error: e.to_string(),
                });
                continue;
            }
        };

        let id = peers.inner.next_client.fetch_add(1, Ordering::SeqCst);
        let client = peers.clone();
        let spawned = peers.spawn(async move {
            client
                .inner
                .clients
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .insert(id, remote);
            client
                .inner
                .status
                .emit(StatusEvent::ClientConnected { id, remote });
            debug!(id, %remote, "client connected");

            if let Err(e) = client.pipe(socket).await {
                warn!(id, error = %e, "client connection failed");
                client.inner.status.emit(StatusEvent::ClientError {
                    id,
                    error: e.to_string(),
                });
            }

            client
                .inner
                .clients
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .remove(&id);
            client
                .inner
                .status
                .emit(StatusEvent::ClientDisconnected { id });
        });
        if !spawned {
            break;
        }
    }
    debug!("server stopped");
}

#[cfg(test)]
#[path = "peer_tests.rs"]
mod tests;
