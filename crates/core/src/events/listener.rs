// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Listener registration

use crate::codec::Payload;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tokio::sync::oneshot;

type ImmediateFn = dyn Fn(&Payload) + Send + Sync;
type AcknowledgedFn = dyn Fn(Payload, Completion) + Send + Sync;

/// An event handler
///
/// The kind is fixed at construction. `Immediate` handlers count as complete
/// as soon as they return; `Acknowledged` handlers hold up the dispatcher
/// until their [`Completion`] is signalled.
///
/// Clones compare equal to the original, so keep a clone around to remove
/// the handler later.
#[derive(Clone)]
pub enum Handler {
    Immediate(Arc<ImmediateFn>),
    Acknowledged(Arc<AcknowledgedFn>),
}

impl Handler {
    pub fn immediate(f: impl Fn(&Payload) + Send + Sync + 'static) -> Self {
        Handler::Immediate(Arc::new(f))
    }

    pub fn acknowledged(f: impl Fn(Payload, Completion) + Send + Sync + 'static) -> Self {
        Handler::Acknowledged(Arc::new(f))
    }

    /// True if both refer to the same registered function
    pub fn same(&self, other: &Handler) -> bool {
        self.addr() == other.addr()
    }

    fn addr(&self) -> *const () {
        match self {
            Handler::Immediate(f) => Arc::as_ptr(f) as *const (),
            Handler::Acknowledged(f) => Arc::as_ptr(f) as *const (),
        }
    }
}

impl std::fmt::Debug for Handler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Handler::Immediate(_) => write!(f, "Handler::Immediate({:p})", self.addr()),
            Handler::Acknowledged(_) => write!(f, "Handler::Acknowledged({:p})", self.addr()),
        }
    }
}

/// Completion signal handed to acknowledged handlers
///
/// Dropping it without calling [`Completion::done`] also releases the
/// dispatcher.
#[derive(Debug)]
pub struct Completion {
    tx: Option<oneshot::Sender<()>>,
    event: String,
}

impl Completion {
    pub(crate) fn new(event: &str) -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                tx: Some(tx),
                event: event.to_string(),
            },
            rx,
        )
    }

    pub fn done(mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if self.tx.is_some() {
            tracing::warn!(event = %self.event, "handler dropped its completion without signalling");
        }
    }
}

/// Name → handlers table shared by the node and its dispatcher
#[derive(Clone, Default)]
pub struct ListenerTable {
    handlers: Arc<RwLock<HashMap<String, Vec<Handler>>>>,
}

impl ListenerTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on(&self, name: impl Into<String>, handler: Handler) {
        let mut handlers = self.handlers.write().unwrap_or_else(|e| e.into_inner());
        handlers.entry(name.into()).or_default().push(handler);
    }

    /// Remove one registration of `handler` under `name`
    ///
    /// Returns false when it was not registered.
    pub fn remove(&self, name: &str, handler: &Handler) -> bool {
        let mut handlers = self.handlers.write().unwrap_or_else(|e| e.into_inner());
        let Some(list) = handlers.get_mut(name) else {
            return false;
        };
        let Some(index) = list.iter().position(|h| h.same(handler)) else {
            return false;
        };
        list.remove(index);
        if list.is_empty() {
            handlers.remove(name);
        }
        true
    }

    /// Snapshot of the handlers registered under `name`
    pub fn handlers(&self, name: &str) -> Vec<Handler> {
        self.handlers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    pub fn count(&self, name: &str) -> usize {
        self.handlers
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(name)
            .map_or(0, Vec::len)
    }
}

#[cfg(test)]
#[path = "listener_tests.rs"]
mod tests;
