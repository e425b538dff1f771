// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Change readers over a [`DagLog`]

use super::DagLog;
use async_trait::async_trait;
use hb_core::log::{Change, LogError, LogReader, ReadOptions};
use hb_core::KvStore;
use tokio::sync::watch;

/// Reads changes strictly after a position
///
/// Non-live readers stop at the tail observed when they were created; live
/// readers wait for new changes until the log is closed.
pub struct DagReader<S> {
    log: DagLog<S>,
    last: u64,
    end: Option<u64>,
    tail: watch::Receiver<u64>,
    closed: watch::Receiver<bool>,
}

impl<S: KvStore> DagReader<S> {
    pub(super) fn new(log: DagLog<S>, opts: ReadOptions) -> Self {
        let tail = log.subscribe_tail();
        let closed = log.subscribe_closed();
        let end = (!opts.live).then(|| *tail.borrow());
        Self {
            log,
            last: opts.since,
            end,
            tail,
            closed,
        }
    }

    /// Position of the last change returned
    pub fn position(&self) -> u64 {
        self.last
    }
}

#[async_trait]
impl<S: KvStore> LogReader for DagReader<S> {
    async fn next(&mut self) -> Option<Result<Change, LogError>> {
        loop {
            if *self.closed.borrow() {
                return None;
            }
            let wanted = self.last + 1;
            if self.end.is_some_and(|end| wanted > end) {
                return None;
            }

            let tail = *self.tail.borrow_and_update();
            if wanted <= tail {
                self.last = wanted;
                return match self.log.change_at(wanted).await {
                    Ok(Some(change)) => Some(Ok(change)),
                    Ok(None) => Some(Err(LogError::Corrupt(format!(
                        "change {} vanished below tail {}",
                        wanted, tail
                    )))),
                    Err(e) => Some(Err(e)),
                };
            }

            tokio::select! {
                changed = self.tail.changed() => {
                    if changed.is_err() {
                        return None;
                    }
                }
                _ = self.closed.changed() => {}
            }
        }
    }
}
