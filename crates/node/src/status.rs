// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Status notifications
//!
//! Faults that happen after setup, with no caller waiting on them, are
//! broadcast here. With no subscriber they are logged at error level.

use std::net::SocketAddr;
use tokio::sync::broadcast;

const STATUS_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusEvent {
    Listening { addr: SocketAddr },
    /// Outbound connection established
    Connected { peer: String },
    ConnectionError {
        peer: String,
        attempt: u32,
        error: String,
    },
    Disconnected { peer: String },
    ClientConnected { id: u64, remote: SocketAddr },
    ClientDisconnected { id: u64 },
    ClientError { id: u64, error: String },
    Error { error: String },
    Closed,
}

impl StatusEvent {
    fn is_fault(&self) -> bool {
        matches!(
            self,
            StatusEvent::ConnectionError { .. }
                | StatusEvent::ClientError { .. }
                | StatusEvent::Error { .. }
        )
    }
}

/// Broadcast channel of [`StatusEvent`]s
#[derive(Clone)]
pub struct StatusChannel {
    tx: broadcast::Sender<StatusEvent>,
}

impl StatusChannel {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(STATUS_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: StatusEvent) {
        if self.tx.receiver_count() == 0 {
            if event.is_fault() {
                tracing::error!(?event, "unhandled node fault");
            } else {
                tracing::debug!(?event, "status");
            }
            return;
        }
        tracing::debug!(?event, "status");
        let _ = self.tx.send(event);
    }
}

impl Default for StatusChannel {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribers_receive_events() {
        let status = StatusChannel::new();
        let mut rx = status.subscribe();

        status.emit(StatusEvent::Closed);
        status.emit(StatusEvent::Error {
            error: "boom".to_string(),
        });

        assert_eq!(rx.recv().await.unwrap(), StatusEvent::Closed);
        assert!(matches!(rx.recv().await.unwrap(), StatusEvent::Error { .. }));
    }

    #[test]
    fn emit_without_subscribers_does_not_fail() {
        let status = StatusChannel::new();
        status.emit(StatusEvent::ClientError {
            id: 1,
            error: "reset".to_string(),
        });
    }

    #[yare::parameterized(
        disconnected = { StatusEvent::Disconnected { peer: String::new() }, false },
        closed = { StatusEvent::Closed, false },
        client_error = { StatusEvent::ClientError { id: 1, error: String::new() }, true },
        error = { StatusEvent::Error { error: String::new() }, true },
    )]
    fn faults_are_classified(event: StatusEvent, fault: bool) {
        assert_eq!(event.is_fault(), fault);
    }
}
