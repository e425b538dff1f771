// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Ordered fan-out of log entries to listeners
//!
//! One entry at a time: every handler registered for the entry's name is
//! invoked, then the dispatcher waits for all of them to complete before
//! pulling the next change from the log.

use super::listener::{Completion, Handler, ListenerTable};
use crate::codec::{CodecRegistry, Payload};
use crate::envelope::Envelope;
use crate::frontier::Frontier;
use crate::log::{AppendLog, Change, LogReader, ReadOptions};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Drives a live read of the log into the listener table
pub struct Dispatcher<L: AppendLog> {
    log: L,
    codecs: CodecRegistry,
    listeners: ListenerTable,
    frontier: Frontier,
}

impl<L: AppendLog> Dispatcher<L> {
    pub fn new(log: L, codecs: CodecRegistry, listeners: ListenerTable, frontier: Frontier) -> Self {
        Self {
            log,
            codecs,
            listeners,
            frontier,
        }
    }

    /// Start dispatching changes strictly after `since`
    pub fn spawn(self, since: u64) -> DispatcherHandle {
        let (stop_tx, stop_rx) = watch::channel(false);
        let (position_tx, position_rx) = watch::channel(since);
        let reader = self.log.read_stream(ReadOptions::live_since(since));

        let task = tokio::spawn(self.run(reader, stop_rx, position_tx));

        DispatcherHandle {
            task,
            stop: stop_tx,
            position: position_rx,
        }
    }

    async fn run(
        self,
        mut reader: L::Reader,
        mut stop: watch::Receiver<bool>,
        position: watch::Sender<u64>,
    ) {
        loop {
            let next = tokio::select! {
                biased;
                _ = stop.changed() => break,
                next = reader.next() => next,
            };

            let change = match next {
                Some(Ok(change)) => change,
                Some(Err(e)) => {
                    warn!(error = %e, "failed to read log change");
                    continue;
                }
                None => break,
            };

            let seq = change.seq;
            tokio::select! {
                biased;
                _ = stop.changed() => break,
                _ = self.dispatch(change) => {}
            }

            if let Err(e) = self.frontier.refresh(&self.log).await {
                warn!(error = %e, seq, "failed to refresh frontier");
            }
            position.send_replace(seq);
        }
        debug!("dispatcher stopped");
    }

    async fn dispatch(&self, change: Change) {
        let seq = change.seq;
        let envelope = match Envelope::decode(&change.node.value) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(seq, key = %change.node.key, error = %e, "skipping undecodable log entry");
                return;
            }
        };

        let handlers = self.listeners.handlers(&envelope.name);
        if handlers.is_empty() {
            debug!(seq, event = %envelope.name, "no listeners");
            return;
        }

        let payload = match self.codecs.decode(&envelope.name, &envelope.payload) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(seq, event = %envelope.name, error = %e, "skipping payload that failed to decode");
                return;
            }
        };

        debug!(seq, event = %envelope.name, handlers = handlers.len(), "dispatching");
        let pending = invoke(&envelope.name, &handlers, payload);
        for rx in pending {
            // A dropped sender counts as completion
            let _ = rx.await;
        }
    }
}

fn invoke(name: &str, handlers: &[Handler], payload: Payload) -> Vec<oneshot::Receiver<()>> {
    let mut pending = Vec::new();
    for handler in handlers {
        match handler {
            Handler::Immediate(f) => f(&payload),
            Handler::Acknowledged(f) => {
                let (completion, rx) = Completion::new(name);
                f(payload.clone(), completion);
                pending.push(rx);
            }
        }
    }
    pending
}

/// Control handle of a running dispatcher
pub struct DispatcherHandle {
    task: JoinHandle<()>,
    stop: watch::Sender<bool>,
    position: watch::Receiver<u64>,
}

impl DispatcherHandle {
    /// Position of the last fully dispatched change
    pub fn position(&self) -> u64 {
        *self.position.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.position.clone()
    }

    /// Stop dispatching and wait for the task to exit
    ///
    /// Completions still pending for the in-flight entry are abandoned.
    pub async fn stop(self) {
        let _ = self.stop.send(true);
        if let Err(e) = self.task.await {
            warn!(error = %e, "dispatcher task failed");
        }
    }
}

/// Wait until `position` reaches `seq`; false if the dispatcher is gone
pub async fn wait_dispatched(position: &mut watch::Receiver<u64>, seq: u64) -> bool {
    position.wait_for(|p| *p >= seq).await.is_ok()
}

#[cfg(test)]
#[path = "dispatcher_tests.rs"]
mod tests;
