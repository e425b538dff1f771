// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event codecs
//!
//! This module provides:
//! - `Codec` - serializer/deserializer pair bound to an event name
//! - `CodecRegistry` - system codecs layered under per-instance user codecs
//! - `SchemaCodec` - field table validated on every encode/decode

mod registry;
mod schema;

pub use registry::{system_codec_names, CodecEntry, CodecRegistry, CodecSet};
pub use schema::{FieldType, SchemaCodec};

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use std::marker::PhantomData;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("non supported event: {0}")]
    UnsupportedEvent(String),
    #[error("event name is reserved: {0}")]
    ReservedName(String),
    #[error("payload does not match schema for {name}: {reason}")]
    Schema { name: String, reason: String },
    #[error("malformed envelope: {0}")]
    Envelope(String),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Serializer/deserializer pair for one event name
pub trait Codec: Send + Sync {
    fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError>;

    fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError>;
}

/// A decoded event payload
///
/// `Opaque` carries the raw bytes of events this node has no codec for, so
/// they can still be observed and relayed.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Payload {
    Value(Value),
    Opaque(Vec<u8>),
}

impl Payload {
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Payload::Value(v) => Some(v),
            Payload::Opaque(_) => None,
        }
    }

    pub fn into_value(self) -> Option<Value> {
        match self {
            Payload::Value(v) => Some(v),
            Payload::Opaque(_) => None,
        }
    }

    /// Deserialize a decoded payload into a concrete type
    pub fn parse<T: DeserializeOwned>(&self) -> Option<T> {
        self.as_value()
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

/// Schemaless codec: any JSON value, stored as JSON text
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
        Ok(serde_json::to_vec(value)?)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Codec whose schema is a serde type
///
/// Values that do not deserialize into `T` are rejected on encode.
pub struct TypedCodec<T> {
    name: &'static str,
    _marker: PhantomData<fn() -> T>,
}

impl<T> TypedCodec<T> {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            _marker: PhantomData,
        }
    }
}

impl<T: Serialize + DeserializeOwned> Codec for TypedCodec<T> {
    fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
        let typed: T = serde_json::from_value(value.clone()).map_err(|e| CodecError::Schema {
            name: self.name.to_string(),
            reason: e.to_string(),
        })?;
        Ok(serde_json::to_vec(&typed)?)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError> {
        let typed: T = serde_json::from_slice(bytes).map_err(|e| CodecError::Schema {
            name: self.name.to_string(),
            reason: e.to_string(),
        })?;
        Ok(serde_json::to_value(&typed)?)
    }
}
