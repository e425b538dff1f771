// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable storage handle backed by the write-ahead log

use crate::wal::{Wal, WalError};
use async_trait::async_trait;
use hb_core::{KvStore, StoreError};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Name of the log file inside the store directory
pub const STORE_FILE: &str = "store.jsonl";

struct FileState {
    wal: Option<Wal>,
    entries: HashMap<String, Vec<u8>>,
}

/// Key/value store persisted to `<dir>/store.jsonl`
///
/// Reads are served from memory; every `put` is appended and synced before
/// it returns.
#[derive(Clone)]
pub struct FileStore {
    dir: PathBuf,
    state: Arc<Mutex<FileState>>,
}

impl FileStore {
    pub fn open(dir: &Path) -> Result<Self, WalError> {
        std::fs::create_dir_all(dir)?;
        let (wal, replay) = Wal::open(&dir.join(STORE_FILE))?;

        if replay.truncated > 0 {
            tracing::warn!(
                dir = %dir.display(),
                truncated = replay.truncated,
                "recovered store with torn tail"
            );
        }
        tracing::debug!(entries = replay.entries.len(), sequence = wal.sequence(), "store opened");

        Ok(Self {
            dir: dir.to_path_buf(),
            state: Arc::new(Mutex::new(FileState {
                wal: Some(wal),
                entries: replay.entries,
            })),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl KvStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        if state.wal.is_none() {
            return Err(StoreError::Closed);
        }
        Ok(state.entries.get(key).cloned())
    }

    async fn put(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap_or_else(|e| e.into_inner());
        let wal = state.wal.as_mut().ok_or(StoreError::Closed)?;
        wal.append(key, &value)?;
        state.entries.insert(key.to_string(), value);
        Ok(())
    }

    async fn close(&self) -> Result<(), StoreError> {
        let wal = self
            .state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .wal
            .take();
        if let Some(wal) = wal {
            wal.sync()?;
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "file_tests.rs"]
mod tests;
