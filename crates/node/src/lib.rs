// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! hb-node: a hyperbus node
//!
//! An [`Emitter`] over a storage handle: emits, listeners, peers over TCP,
//! duplex event streams and orderly close. The `hbd` binary runs one node
//! in stream mode.

pub mod announce;
pub mod config;
pub mod daemon;
mod emitter;
pub mod error;
mod identity;
mod lifecycle;
pub mod peer;
pub mod status;
pub mod stream;

pub use config::{ConfigError, DaemonConfig, ListenConfig, NodeOptions};
pub use daemon::DaemonError;
pub use emitter::Emitter;
pub use error::{EmitError, NodeError, PeerError};
pub use identity::StoreIdentity;
pub use peer::{PeerManager, PeerState};
pub use status::{StatusChannel, StatusEvent};
pub use stream::{EventSink, EventSource, EventStream, StartFrom, StreamItem, StreamOptions};
