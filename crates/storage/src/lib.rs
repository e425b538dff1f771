// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Storage handles and the content-addressed append log

pub mod dag;
mod file;
mod hex;
mod memory;
pub mod traced;
pub mod wal;

pub use dag::{DagLog, DagReader};
pub use file::FileStore;
pub use memory::MemoryStore;
pub use traced::TracedStore;
pub use wal::WalError;
