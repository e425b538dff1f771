// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! hb-core: replication and dispatch engine of the hyperbus event bus
//!
//! This crate provides:
//! - Contracts for the storage handle and the content-addressed append log
//! - The envelope wire format and the codec registry
//! - Causal frontier bookkeeping for local appends
//! - Listener registration and the ordered dispatcher

pub mod announce;
pub mod codec;
pub mod envelope;
pub mod events;
pub mod frontier;
pub mod log;
pub mod store;

pub use announce::{AnnouncedAddress, Announcement, PeerAddress, ANNOUNCEMENT_EVENT};
pub use codec::{
    Codec, CodecEntry, CodecError, CodecRegistry, CodecSet, FieldType, JsonCodec, Payload,
    SchemaCodec, TypedCodec,
};
pub use envelope::{Envelope, ENVELOPE_EVENT};
pub use events::{Completion, Dispatcher, DispatcherHandle, Handler, ListenerTable};
pub use frontier::Frontier;
pub use log::{
    AppendLog, Change, LogError, LogNode, LogReader, NodeKey, ReadOptions, ReplicateOptions,
    Replication, SyncStats,
};
pub use store::{KvStore, StoreError};
