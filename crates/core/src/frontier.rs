// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Causal frontier: the parent set of the next local node

use crate::log::{AppendLog, Change, LogError, NodeKey};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Heads of the log as last observed by this process
///
/// Every read-append-update sequence holds the same async lock, so two
/// concurrent emits never share a parent set.
#[derive(Clone, Default)]
pub struct Frontier {
    heads: Arc<Mutex<Vec<NodeKey>>>,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn current(&self) -> Vec<NodeKey> {
        self.heads.lock().await.clone()
    }

    /// Append `value` after the current frontier and advance it
    pub async fn append<L: AppendLog>(&self, log: &L, value: Vec<u8>) -> Result<Change, LogError> {
        let mut heads = self.heads.lock().await;
        let change = log.add(&heads, value).await?;
        *heads = log.heads().await?;
        Ok(change)
    }

    /// Reset the frontier to the log's current heads
    pub async fn refresh<L: AppendLog>(&self, log: &L) -> Result<(), LogError> {
        let mut heads = self.heads.lock().await;
        *heads = log.heads().await?;
        Ok(())
    }
}
