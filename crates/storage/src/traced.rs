// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced storage wrapper for consistent observability

use async_trait::async_trait;
use hb_core::{KvStore, StoreError};
use tracing::Instrument;

/// Wrapper that adds tracing to any KvStore
#[derive(Clone)]
pub struct TracedStore<S> {
    inner: S,
}

impl<S> TracedStore<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: KvStore> KvStore for TracedStore<S> {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let span = tracing::debug_span!("store.get", key);
        async {
            let start = std::time::Instant::now();
            let result = self.inner.get(key).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;

            match &result {
                Ok(Some(value)) => tracing::trace!(len = value.len(), elapsed_ms, "hit"),
                Ok(None) => tracing::trace!(elapsed_ms, "miss"),
                Err(e) => tracing::error!(elapsed_ms, error = %e, "get failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        let span = tracing::debug_span!("store.put", key, len = value.len());
        async {
            let start = std::time::Instant::now();
            let result = self.inner.put(key, value).await;
            let elapsed_ms = start.elapsed().as_millis() as u64;

            match &result {
                Ok(()) => tracing::trace!(elapsed_ms, "stored"),
                Err(e) => tracing::error!(elapsed_ms, error = %e, "put failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn close(&self) -> Result<(), StoreError> {
        let span = tracing::info_span!("store.close");
        async {
            let result = self.inner.close().await;
            match &result {
                Ok(()) => tracing::info!("closed"),
                Err(e) => tracing::warn!(error = %e, "close failed"),
            }
            result
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
