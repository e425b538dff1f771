// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event delivery
//!
//! This module provides:
//! - `ListenerTable` - handlers registered per event name
//! - `Handler` - immediate or acknowledged handler kinds
//! - `Dispatcher` - ordered, completion-gated fan-out of log entries

mod dispatcher;
mod listener;

pub use dispatcher::{wait_dispatched, Dispatcher, DispatcherHandle};
pub use listener::{Completion, Handler, ListenerTable};
