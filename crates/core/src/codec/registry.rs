// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Name → codec table

use super::{Codec, CodecError, Payload, TypedCodec};
use crate::announce::{Announcement, ANNOUNCEMENT_EVENT};
use crate::envelope::{Envelope, ENVELOPE_EVENT};
use crate::store::is_reserved_key;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

/// Codec exposing the envelope as `{name, payload}` with byte-array payload
struct EnvelopeCodec;

#[derive(Serialize, Deserialize)]
struct EnvelopeValue {
    name: String,
    payload: Vec<u8>,
}

impl Codec for EnvelopeCodec {
    fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
        let value: EnvelopeValue = serde_json::from_value(value.clone())?;
        Envelope::new(value.name, value.payload).encode()
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError> {
        let envelope = Envelope::decode(bytes)?;
        Ok(serde_json::to_value(EnvelopeValue {
            name: envelope.name,
            payload: envelope.payload,
        })?)
    }
}

type CodecTable = HashMap<String, Arc<dyn Codec>>;

fn system_codecs() -> &'static CodecTable {
    static SYSTEM: OnceLock<CodecTable> = OnceLock::new();
    SYSTEM.get_or_init(|| {
        let mut table: CodecTable = HashMap::new();
        table.insert(ENVELOPE_EVENT.to_string(), Arc::new(EnvelopeCodec));
        table.insert(
            ANNOUNCEMENT_EVENT.to_string(),
            Arc::new(TypedCodec::<Announcement>::new(ANNOUNCEMENT_EVENT)),
        );
        table
    })
}

/// Names of the codecs every registry carries
pub fn system_codec_names() -> Vec<&'static str> {
    vec![ENVELOPE_EVENT, ANNOUNCEMENT_EVENT]
}

/// One `{name, codec}` registration
#[derive(Clone)]
pub struct CodecEntry {
    pub name: String,
    pub codec: Arc<dyn Codec>,
}

impl CodecEntry {
    pub fn new(name: impl Into<String>, codec: impl Codec + 'static) -> Self {
        Self {
            name: name.into(),
            codec: Arc::new(codec),
        }
    }
}

/// Batch of registrations accepted by [`CodecRegistry::register`]
pub struct CodecSet(Vec<CodecEntry>);

impl<N: Into<String>, C: Codec + 'static> From<(N, C)> for CodecSet {
    fn from((name, codec): (N, C)) -> Self {
        CodecSet(vec![CodecEntry::new(name, codec)])
    }
}

impl From<CodecEntry> for CodecSet {
    fn from(entry: CodecEntry) -> Self {
        CodecSet(vec![entry])
    }
}

impl From<Vec<CodecEntry>> for CodecSet {
    fn from(entries: Vec<CodecEntry>) -> Self {
        CodecSet(entries)
    }
}

impl From<HashMap<String, Arc<dyn Codec>>> for CodecSet {
    fn from(map: HashMap<String, Arc<dyn Codec>>) -> Self {
        CodecSet(
            map.into_iter()
                .map(|(name, codec)| CodecEntry { name, codec })
                .collect(),
        )
    }
}

/// Per-instance codec table layered over the system codecs
///
/// Cheap to clone; clones share the same user table.
#[derive(Clone, Default)]
pub struct CodecRegistry {
    user: Arc<RwLock<CodecTable>>,
}

impl CodecRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace user codecs
    ///
    /// The whole batch is rejected if any name is reserved.
    pub fn register(&self, codecs: impl Into<CodecSet>) -> Result<(), CodecError> {
        let CodecSet(entries) = codecs.into();
        if let Some(entry) = entries.iter().find(|e| is_reserved_name(&e.name)) {
            return Err(CodecError::ReservedName(entry.name.clone()));
        }

        let mut user = self.user.write().unwrap_or_else(|e| e.into_inner());
        for entry in entries {
            user.insert(entry.name, entry.codec);
        }
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// Registered user codec names, sorted
    pub fn names(&self) -> Vec<String> {
        let user = self.user.read().unwrap_or_else(|e| e.into_inner());
        let mut names: Vec<String> = user.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn encode(&self, name: &str, value: &Value) -> Result<Vec<u8>, CodecError> {
        let codec = self
            .lookup(name)
            .ok_or_else(|| CodecError::UnsupportedEvent(name.to_string()))?;
        codec.encode(value)
    }

    /// Decode `bytes`; names without a codec come back as opaque bytes
    pub fn decode(&self, name: &str, bytes: &[u8]) -> Result<Payload, CodecError> {
        match self.lookup(name) {
            Some(codec) => codec.decode(bytes).map(Payload::Value),
            None => Ok(Payload::Opaque(bytes.to_vec())),
        }
    }

    fn lookup(&self, name: &str) -> Option<Arc<dyn Codec>> {
        if let Some(codec) = system_codecs().get(name) {
            return Some(Arc::clone(codec));
        }
        let user = self.user.read().unwrap_or_else(|e| e.into_inner());
        user.get(name).cloned()
    }
}

fn is_reserved_name(name: &str) -> bool {
    system_codecs().contains_key(name) || is_reserved_key(name)
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
