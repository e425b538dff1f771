// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Duplex event stream over an emitter
//!
//! Writes are emits. Reads are every log entry, local or replicated, decoded
//! through the codec registry, starting at the tail or at the beginning of
//! history. Reads never end while the log is open.

use crate::emitter::Emitter;
use crate::error::EmitError;
use hb_core::{
    AppendLog, Change, CodecRegistry, Envelope, KvStore, LogReader, Payload, ReadOptions,
};
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StartFrom {
    /// Only entries appended after the stream opened
    #[default]
    Tail,
    /// The whole history, then live entries
    Beginning,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StreamOptions {
    pub from: StartFrom,
}

impl StreamOptions {
    pub fn from_beginning() -> Self {
        Self {
            from: StartFrom::Beginning,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamItem {
    pub name: String,
    pub payload: Payload,
}

/// Writing half of an [`EventStream`]
pub struct EventSink<S: KvStore, L: AppendLog> {
    emitter: Emitter<S, L>,
}

impl<S: KvStore, L: AppendLog> EventSink<S, L> {
    /// Emit `{name, payload}`; the result is the emit's result
    pub async fn send(&self, name: &str, payload: &Value) -> Result<Change, EmitError> {
        self.emitter.emit(name, payload).await
    }
}

/// Reading half of an [`EventStream`]
pub struct EventSource<L: AppendLog> {
    reader: L::Reader,
    codecs: CodecRegistry,
    position: u64,
}

impl<L: AppendLog> EventSource<L> {
    /// Next decodable entry; `None` once the log closes
    pub async fn next(&mut self) -> Option<StreamItem> {
        loop {
            let change = match self.reader.next().await? {
                Ok(change) => change,
                Err(e) => {
                    warn!(error = %e, "stream failed to read change");
                    continue;
                }
            };
            self.position = change.seq;

            let envelope = match Envelope::decode(&change.node.value) {
                Ok(envelope) => envelope,
                Err(e) => {
                    warn!(seq = change.seq, error = %e, "stream skipping undecodable entry");
                    continue;
                }
            };
            match self.codecs.decode(&envelope.name, &envelope.payload) {
                Ok(payload) => {
                    return Some(StreamItem {
                        name: envelope.name,
                        payload,
                    });
                }
                Err(e) => {
                    warn!(seq = change.seq, event = %envelope.name, error = %e, "stream skipping payload");
                }
            }
        }
    }

    /// Log position of the last entry read
    pub fn position(&self) -> u64 {
        self.position
    }
}

pub struct EventStream<S: KvStore, L: AppendLog> {
    sink: EventSink<S, L>,
    source: EventSource<L>,
}

impl<S: KvStore, L: AppendLog> EventStream<S, L> {
    pub(crate) fn new(emitter: Emitter<S, L>, opts: StreamOptions) -> Self {
        let since = match opts.from {
            StartFrom::Tail => emitter.changes(),
            StartFrom::Beginning => 0,
        };
        let source = EventSource {
            reader: emitter.log().read_stream(ReadOptions::live_since(since)),
            codecs: emitter.codecs().clone(),
            position: since,
        };
        Self {
            sink: EventSink { emitter },
            source,
        }
    }

    pub async fn send(&self, name: &str, payload: &Value) -> Result<Change, EmitError> {
        self.sink.send(name, payload).await
    }

    pub async fn next(&mut self) -> Option<StreamItem> {
        self.source.next().await
    }

    pub fn position(&self) -> u64 {
        self.source.position()
    }

    /// Split into halves usable from different tasks
    pub fn into_split(self) -> (EventSink<S, L>, EventSource<L>) {
        (self.sink, self.source)
    }
}
