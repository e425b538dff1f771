// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Node options and daemon configuration

use hb_core::{FieldType, PeerAddress};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

fn parse_duration_ms(var: &str) -> Option<Duration> {
    std::env::var(var)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_millis)
}

/// Tunables of the peer manager and lifecycle
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct NodeOptions {
    /// Delay between reconnect attempts
    #[serde(with = "humantime_serde")]
    pub reconnect_timeout: Duration,
    /// Consecutive failed attempts before a peer is given up
    pub max_attempts: u32,
    /// Time connections get to finish on close before they are aborted
    #[serde(with = "humantime_serde")]
    pub close_grace: Duration,
    pub close_concurrency: usize,
}

impl Default for NodeOptions {
    fn default() -> Self {
        Self {
            reconnect_timeout: Duration::from_secs(1),
            max_attempts: 10,
            close_grace: Duration::from_secs(2),
            close_concurrency: 8,
        }
    }
}

impl NodeOptions {
    /// Defaults overridden by `HB_RECONNECT_TIMEOUT_MS`, `HB_MAX_ATTEMPTS`
    /// and `HB_CLOSE_GRACE_MS`
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            reconnect_timeout: parse_duration_ms("HB_RECONNECT_TIMEOUT_MS")
                .unwrap_or(defaults.reconnect_timeout),
            max_attempts: std::env::var("HB_MAX_ATTEMPTS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_attempts),
            close_grace: parse_duration_ms("HB_CLOSE_GRACE_MS").unwrap_or(defaults.close_grace),
            ..defaults
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ListenConfig {
    pub port: u16,
    /// Interface to bind; announcements list every non-loopback address when
    /// this is unspecified
    pub host: String,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            port: 0,
            host: "0.0.0.0".to_string(),
        }
    }
}

/// `hbd` configuration file
///
/// ```toml
/// store = "/var/lib/hbd"
/// from_beginning = false
///
/// [listen]
/// port = 7400
///
/// [[peers]]
/// address = "10.0.0.2"
/// port = 7400
///
/// [events.Test1]
/// foo = "string"
/// num = "int"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Directory of the file store; memory store when absent
    pub store: Option<PathBuf>,
    pub listen: Option<ListenConfig>,
    pub peers: Vec<PeerAddress>,
    /// Stream the whole history instead of starting at the tail
    pub from_beginning: bool,
    pub log_file: Option<PathBuf>,
    pub options: NodeOptions,
    /// Event name to field schema
    pub events: BTreeMap<String, BTreeMap<String, FieldType>>,
}

impl DaemonConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
