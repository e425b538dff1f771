// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Peer announcement records

use serde::{Deserialize, Serialize};
use std::fmt;

/// System event name of a peer announcement
pub const ANNOUNCEMENT_EVENT: &str = "EventPeer";

/// `{id, addresses}` broadcast by a node when it starts listening
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Announcement {
    pub id: String,
    pub addresses: Vec<AnnouncedAddress>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnouncedAddress {
    pub ip: String,
    pub port: u16,
}

/// Entry of the persisted address book
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PeerAddress {
    pub address: String,
    pub port: u16,
}

impl PeerAddress {
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self {
            address: address.into(),
            port,
        }
    }

    /// Connection-map key, `"address:port"`
    pub fn key(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for PeerAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}
