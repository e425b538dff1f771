// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Field-table schemas declared at runtime

use super::{Codec, CodecError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Type of a single schema field
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    String,
    Int,
    Float,
    Bool,
    Bytes,
    Object,
    Any,
}

impl FieldType {
    fn accepts(self, value: &Value) -> bool {
        match self {
            FieldType::String => value.is_string(),
            FieldType::Int => value.is_i64() || value.is_u64(),
            FieldType::Float => value.is_number(),
            FieldType::Bool => value.is_boolean(),
            FieldType::Bytes => value
                .as_array()
                .is_some_and(|items| items.iter().all(|b| b.as_u64().is_some_and(|n| n <= 255))),
            FieldType::Object => value.is_object(),
            FieldType::Any => true,
        }
    }
}

/// Schema codec for object payloads
///
/// Every field is optional; undeclared fields and mistyped values are
/// rejected. Absent fields stay absent after a decode.
#[derive(Debug, Clone)]
pub struct SchemaCodec {
    name: String,
    fields: BTreeMap<String, FieldType>,
}

impl SchemaCodec {
    pub fn new(name: impl Into<String>, fields: BTreeMap<String, FieldType>) -> Self {
        Self {
            name: name.into(),
            fields,
        }
    }

    pub fn fields(&self) -> &BTreeMap<String, FieldType> {
        &self.fields
    }

    fn validate<'a>(&self, value: &'a Value) -> Result<&'a Map<String, Value>, CodecError> {
        let object = value.as_object().ok_or_else(|| self.error("payload is not an object"))?;

        for (field, field_value) in object {
            let expected = self
                .fields
                .get(field)
                .ok_or_else(|| self.error(format!("unknown field `{}`", field)))?;
            if !expected.accepts(field_value) {
                return Err(self.error(format!(
                    "field `{}` expected {:?}, got {}",
                    field, expected, field_value
                )));
            }
        }

        Ok(object)
    }

    fn error(&self, reason: impl Into<String>) -> CodecError {
        CodecError::Schema {
            name: self.name.clone(),
            reason: reason.into(),
        }
    }
}

impl Codec for SchemaCodec {
    fn encode(&self, value: &Value) -> Result<Vec<u8>, CodecError> {
        let object = self.validate(value)?;
        Ok(serde_json::to_vec(object)?)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Value, CodecError> {
        let value: Value = serde_json::from_slice(bytes)?;
        self.validate(&value)?;
        Ok(value)
    }
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;
