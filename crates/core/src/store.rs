// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Key/value storage handle shared by the log and the node

use async_trait::async_trait;
use thiserror::Error;

/// Key holding the random identity of a storage instance
pub const STORE_ID_KEY: &str = "!!STOREID!!";
/// Key holding the JSON address book of outbound peers
pub const PEERS_KEY: &str = "!!PEERS!!";
/// Key holding the last announcement this node broadcast about itself
pub const SELF_ANNOUNCEMENT_KEY: &str = "!!MYEVENTPEER!!";
/// Prefix under which the append log keeps its records
pub const LOG_KEY_PREFIX: &str = "!!LOG!!";

/// Returns true if `key` is owned by the runtime rather than by users
pub fn is_reserved_key(key: &str) -> bool {
    key.starts_with("!!")
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("store is closed")]
    Closed,
    #[error("corrupt value under {key}: {reason}")]
    Corrupt { key: String, reason: String },
}

/// Opaque key/value handle
///
/// Absent keys read as `Ok(None)`. After `close` every call fails with
/// [`StoreError::Closed`]; closing twice is not an error.
#[async_trait]
pub trait KvStore: Clone + Send + Sync + 'static {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError>;

    async fn close(&self) -> Result<(), StoreError>;
}

/// Read a JSON value stored under `key`
pub async fn get_json<S, T>(store: &S, key: &str) -> Result<Option<T>, StoreError>
where
    S: KvStore,
    T: serde::de::DeserializeOwned,
{
    match store.get(key).await? {
        Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        None => Ok(None),
    }
}

/// Store `value` as JSON under `key`
pub async fn put_json<S, T>(store: &S, key: &str, value: &T) -> Result<(), StoreError>
where
    S: KvStore,
    T: serde::Serialize + ?Sized,
{
    store.put(key, serde_json::to_vec(value)?).await
}
