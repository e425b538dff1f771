// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Orderly shutdown of an emitter

use crate::emitter::Emitter;
use crate::error::NodeError;
use crate::status::StatusEvent;
use hb_core::{AppendLog, KvStore};
use std::sync::atomic::Ordering;
use tracing::{info, warn};

impl<S: KvStore, L: AppendLog> Emitter<S, L> {
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Close the bus
    ///
    /// Stops the dispatcher, then peer connections and the server, then the
    /// log and the store. Every step runs even if an earlier one failed; the
    /// first failure is returned. Closing twice is a no-op.
    pub async fn close(&self) -> Result<(), NodeError> {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        info!(changes = self.changes(), "closing");

        let dispatcher = self
            .inner
            .dispatcher
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();
        if let Some(dispatcher) = dispatcher {
            dispatcher.stop().await;
        }

        self.inner.peers.close().await;

        let mut first_error: Option<NodeError> = None;
        if let Err(e) = self.inner.log.close().await {
            warn!(error = %e, "failed to close log");
            first_error = Some(e.into());
        }
        if let Err(e) = self.inner.store.close().await {
            warn!(error = %e, "failed to close store");
            if first_error.is_none() {
                first_error = Some(e.into());
            }
        }

        self.inner.status.emit(StatusEvent::Closed);
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
