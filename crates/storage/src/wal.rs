// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Write-ahead log for durable key/value storage
//!
//! One JSON object per line: `{"seq", "key", "value" (hex), "checksum"}`.
//! On open the log is replayed up to the first torn or corrupt line, and
//! everything after that point is truncated away.

use crate::hex;
use hb_core::StoreError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that can occur in WAL operations
#[derive(Debug, Error)]
pub enum WalError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("corrupted entry at line {line}: {reason}")]
    Corrupted { line: u64, reason: String },
    #[error("checksum mismatch at line {line}")]
    ChecksumMismatch { line: u64 },
}

impl From<WalError> for StoreError {
    fn from(e: WalError) -> Self {
        match e {
            WalError::Io(e) => StoreError::Io(e),
            WalError::Json(e) => StoreError::Json(e),
            other => StoreError::Corrupt {
                key: "wal".to_string(),
                reason: other.to_string(),
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct WalEntry {
    seq: u64,
    key: String,
    value: String,
    checksum: u32,
}

impl WalEntry {
    fn new(seq: u64, key: &str, value: &[u8]) -> Self {
        let value = hex::encode(value);
        let checksum = Self::calculate_checksum(seq, key, &value);
        Self {
            seq,
            key: key.to_string(),
            value,
            checksum,
        }
    }

    fn calculate_checksum(seq: u64, key: &str, value: &str) -> u32 {
        let mut hasher = crc32fast::Hasher::new();
        hasher.update(&seq.to_be_bytes());
        hasher.update(key.as_bytes());
        hasher.update(&[0]);
        hasher.update(value.as_bytes());
        hasher.finalize()
    }

    fn verify(&self) -> bool {
        self.checksum == Self::calculate_checksum(self.seq, &self.key, &self.value)
    }
}

/// State recovered from an existing log file
#[derive(Debug, Default)]
pub struct Replay {
    pub entries: HashMap<String, Vec<u8>>,
    /// Sequence number of the last valid entry
    pub sequence: u64,
    /// Bytes cut from the end of the file
    pub truncated: u64,
}

/// Append-only writer over a log file
pub struct Wal {
    file: File,
    path: PathBuf,
    sequence: u64,
}

impl Wal {
    /// Open or create the log at `path`, replaying its valid prefix
    pub fn open(path: &Path) -> Result<(Self, Replay), WalError> {
        let replay = Self::replay(path)?;

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok((
            Self {
                file,
                path: path.to_path_buf(),
                sequence: replay.sequence,
            },
            replay,
        ))
    }

    /// Append a `key = value` record and sync it to disk
    pub fn append(&mut self, key: &str, value: &[u8]) -> Result<u64, WalError> {
        let entry = WalEntry::new(self.sequence + 1, key, value);
        let line = serde_json::to_string(&entry)?;
        writeln!(self.file, "{}", line)?;
        self.file.sync_data()?;
        self.sequence = entry.seq;
        Ok(self.sequence)
    }

    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn sync(&self) -> Result<(), WalError> {
        self.file.sync_all()?;
        Ok(())
    }

    fn replay(path: &Path) -> Result<Replay, WalError> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Replay::default()),
            Err(e) => return Err(e.into()),
        };
        let size = file.metadata()?.len();

        let mut reader = BufReader::new(file);
        let mut replay = Replay::default();
        let mut last_valid_position = 0u64;
        let mut line_number = 0u64;

        loop {
            let mut line = String::new();
            let bytes_read = match reader.read_line(&mut line) {
                Ok(0) => break,
                Ok(n) => n as u64,
                Err(e) if e.kind() == io::ErrorKind::InvalidData => {
                    tracing::warn!(line = line_number + 1, "stopping WAL replay at non-utf8 line");
                    break;
                }
                Err(e) => return Err(e.into()),
            };
            line_number += 1;

            if !line.ends_with('\n') {
                tracing::warn!(line = line_number, "stopping WAL replay at torn write");
                break;
            }
            if line.trim().is_empty() {
                last_valid_position += bytes_read;
                continue;
            }

            match Self::parse_line(line.trim(), line_number) {
                Ok((key, value, seq)) => {
                    replay.entries.insert(key, value);
                    replay.sequence = seq;
                    last_valid_position += bytes_read;
                }
                Err(e) => {
                    tracing::warn!(error = %e, "stopping WAL replay due to read error");
                    break;
                }
            }
        }

        if last_valid_position < size {
            Self::truncate(path, last_valid_position)?;
            replay.truncated = size - last_valid_position;
        }

        Ok(replay)
    }

    fn parse_line(line: &str, line_number: u64) -> Result<(String, Vec<u8>, u64), WalError> {
        let entry: WalEntry = serde_json::from_str(line).map_err(|e| WalError::Corrupted {
            line: line_number,
            reason: e.to_string(),
        })?;
        if !entry.verify() {
            return Err(WalError::ChecksumMismatch { line: line_number });
        }
        let value = hex::decode(&entry.value).ok_or_else(|| WalError::Corrupted {
            line: line_number,
            reason: "value is not hex".to_string(),
        })?;
        Ok((entry.key, value, entry.seq))
    }

    fn truncate(path: &Path, position: u64) -> Result<(), WalError> {
        let file = OpenOptions::new().write(true).open(path)?;
        file.set_len(position)?;
        file.sync_all()?;
        tracing::info!(position, path = %path.display(), "WAL truncated at corruption point");
        Ok(())
    }
}

#[cfg(test)]
#[path = "wal_tests.rs"]
mod tests;
