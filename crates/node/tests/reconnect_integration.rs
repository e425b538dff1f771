// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

//! Reconnect behaviour through a TCP relay that can drop its connections

use hb_core::{Handler, JsonCodec, Payload};
use hb_node::{Emitter, NodeOptions, StatusEvent};
use hb_storage::MemoryStore;
use serde_json::json;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Forwards every accepted connection to `target`
struct Relay {
    addr: SocketAddr,
    accepted: Arc<AtomicUsize>,
    links: Arc<Mutex<Vec<JoinHandle<()>>>>,
    server: JoinHandle<()>,
}

impl Relay {
    async fn start(target: SocketAddr) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let accepted = Arc::new(AtomicUsize::new(0));
        let links: Arc<Mutex<Vec<JoinHandle<()>>>> = Arc::default();

        let server = {
            let accepted = Arc::clone(&accepted);
            let links = Arc::clone(&links);
            tokio::spawn(async move {
                while let Ok((mut inbound, _)) = listener.accept().await {
                    accepted.fetch_add(1, Ordering::SeqCst);
                    let link = tokio::spawn(async move {
                        if let Ok(mut outbound) = TcpStream::connect(target).await {
                            let _ = tokio::io::copy_bidirectional(&mut inbound, &mut outbound).await;
                        }
                    });
                    links.lock().unwrap().push(link);
                }
            })
        };

        Self {
            addr,
            accepted,
            links,
            server,
        }
    }

    /// Drop every live connection
    fn cut(&self) {
        for link in self.links.lock().unwrap().drain(..) {
            link.abort();
        }
    }

    fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }
}

impl Drop for Relay {
    fn drop(&mut self) {
        self.cut();
        self.server.abort();
    }
}

fn options(reconnect_ms: u64) -> NodeOptions {
    NodeOptions {
        reconnect_timeout: Duration::from_millis(reconnect_ms),
        max_attempts: 5,
        close_grace: Duration::from_millis(500),
        ..NodeOptions::default()
    }
}

async fn node(reconnect_ms: u64) -> Emitter<MemoryStore> {
    let emitter = Emitter::open(MemoryStore::new(), options(reconnect_ms))
        .await
        .unwrap();
    emitter.register_codec(("Test1", JsonCodec)).unwrap();
    emitter
}

async fn wait_for_disconnect(status: &mut broadcast::Receiver<StatusEvent>) {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match status.recv().await {
                Ok(StatusEvent::Disconnected { .. } | StatusEvent::ConnectionError { .. }) => break,
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => panic!("status channel closed"),
            }
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn dropped_connection_is_reestablished() {
    let a = node(50).await;
    let b = node(50).await;
    let addr = a.listen(0, Some("127.0.0.1")).await.unwrap();
    let relay = Relay::start(addr).await;
    b.connect(relay.addr.port(), "127.0.0.1").await.unwrap();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    b.on(
        "Test1",
        Handler::immediate(move |payload| sink.lock().unwrap().push(payload.clone())),
    );

    let mut status = b.status();
    relay.cut();
    wait_for_disconnect(&mut status).await;
    a.emit("Test1", &json!({"while": "disconnected"}))
        .await
        .unwrap();

    let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
    while seen.lock().unwrap().is_empty() {
        assert!(tokio::time::Instant::now() < deadline, "event never arrived");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(relay.accepted() >= 2);
    assert_eq!(
        seen.lock().unwrap()[0],
        Payload::Value(json!({"while": "disconnected"}))
    );

    a.close().await.unwrap();
    b.close().await.unwrap();
}

#[tokio::test]
async fn close_cancels_scheduled_reconnect() {
    let a = node(200).await;
    let b = node(200).await;
    let addr = a.listen(0, Some("127.0.0.1")).await.unwrap();
    let relay = Relay::start(addr).await;
    b.connect(relay.addr.port(), "127.0.0.1").await.unwrap();
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(relay.accepted(), 1);

    let mut status = b.status();
    relay.cut();
    wait_for_disconnect(&mut status).await;
    b.close().await.unwrap();

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert_eq!(relay.accepted(), 1);

    a.close().await.unwrap();
}
