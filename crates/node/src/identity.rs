// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Store identity: a random id persisted once per storage instance

use hb_core::store::STORE_ID_KEY;
use hb_core::{KvStore, StoreError};
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Produces the id given to a store that has none yet
pub type IdSource = Arc<dyn Fn() -> String + Send + Sync>;

/// 32 hex digits, no hyphens
pub fn random_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

#[derive(Clone)]
pub struct StoreIdentity<S> {
    store: S,
    fresh: IdSource,
    cached: Arc<OnceCell<String>>,
}

impl<S: KvStore> StoreIdentity<S> {
    pub fn new(store: S) -> Self {
        Self::with_source(store, Arc::new(random_id))
    }

    pub fn with_source(store: S, fresh: IdSource) -> Self {
        Self {
            store,
            fresh,
            cached: Arc::new(OnceCell::new()),
        }
    }

    /// Load the persisted id, creating it on first use
    pub async fn get(&self) -> Result<String, StoreError> {
        let id = self
            .cached
            .get_or_try_init(|| async {
                if let Some(bytes) = self.store.get(STORE_ID_KEY).await? {
                    return String::from_utf8(bytes).map_err(|e| StoreError::Corrupt {
                        key: STORE_ID_KEY.to_string(),
                        reason: e.to_string(),
                    });
                }
                let id = (self.fresh)();
                self.store.put(STORE_ID_KEY, id.as_bytes().to_vec()).await?;
                tracing::info!(id = %id, "created store identity");
                Ok::<_, StoreError>(id)
            })
            .await?;
        Ok(id.clone())
    }
}

/// `<prefix>-1`, `<prefix>-2`, ... shared by every clone
#[cfg(test)]
pub(crate) fn sequential_ids(prefix: &str) -> IdSource {
    use std::sync::atomic::{AtomicU64, Ordering};

    let prefix = prefix.to_string();
    let counter = AtomicU64::new(1);
    Arc::new(move || format!("{}-{}", prefix, counter.fetch_add(1, Ordering::SeqCst)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hb_storage::MemoryStore;

    #[tokio::test]
    async fn identity_is_created_once() {
        let store = MemoryStore::new();
        let identity = StoreIdentity::with_source(store.clone(), sequential_ids("node"));

        let first = identity.get().await.unwrap();
        let second = identity.get().await.unwrap();
        assert_eq!(first, "node-1");
        assert_eq!(second, first);
        assert_eq!(store.get(STORE_ID_KEY).await.unwrap().unwrap(), b"node-1");
    }

    #[tokio::test]
    async fn persisted_identity_wins_over_generator() {
        let store = MemoryStore::new();
        store.put(STORE_ID_KEY, b"existing".to_vec()).await.unwrap();

        let identity = StoreIdentity::with_source(store, sequential_ids("node"));
        assert_eq!(identity.get().await.unwrap(), "existing");
    }

    #[tokio::test]
    async fn random_identity_is_persisted() {
        let store = MemoryStore::new();
        let id = StoreIdentity::new(store.clone()).get().await.unwrap();

        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(StoreIdentity::new(store).get().await.unwrap(), id);
    }

    #[tokio::test]
    async fn store_failure_is_returned() {
        let store = MemoryStore::new();
        store.close().await.unwrap();

        let identity = StoreIdentity::with_source(store, sequential_ids("node"));
        assert!(matches!(identity.get().await, Err(StoreError::Closed)));
    }
}
