// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Envelope wrapping every log value
//!
//! Wire layout, all lengths big-endian `u32`:
//!
//! ```text
//! [name_len][name bytes (utf-8)][payload_len][payload bytes]
//! ```

use crate::codec::CodecError;

/// System event name of the envelope itself
pub const ENVELOPE_EVENT: &str = "Event";

/// `{name, payload}` wrapper common to all log entries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub name: String,
    pub payload: Vec<u8>,
}

impl Envelope {
    pub fn new(name: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            payload,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        let name_len = frame_len(self.name.len())?;
        let payload_len = frame_len(self.payload.len())?;

        let mut buf = Vec::with_capacity(8 + self.name.len() + self.payload.len());
        buf.extend_from_slice(&name_len.to_be_bytes());
        buf.extend_from_slice(self.name.as_bytes());
        buf.extend_from_slice(&payload_len.to_be_bytes());
        buf.extend_from_slice(&self.payload);
        Ok(buf)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self, CodecError> {
        let (name, rest) = read_frame(bytes, "name")?;
        let (payload, rest) = read_frame(rest, "payload")?;
        if !rest.is_empty() {
            return Err(CodecError::Envelope(format!(
                "{} trailing bytes after payload",
                rest.len()
            )));
        }

        let name = std::str::from_utf8(name)
            .map_err(|e| CodecError::Envelope(format!("name is not utf-8: {}", e)))?;

        Ok(Self {
            name: name.to_string(),
            payload: payload.to_vec(),
        })
    }
}

fn frame_len(len: usize) -> Result<u32, CodecError> {
    u32::try_from(len).map_err(|_| CodecError::Envelope(format!("field too large: {} bytes", len)))
}

fn read_frame<'a>(bytes: &'a [u8], field: &str) -> Result<(&'a [u8], &'a [u8]), CodecError> {
    if bytes.len() < 4 {
        return Err(CodecError::Envelope(format!("truncated {} length", field)));
    }
    let (len_bytes, rest) = bytes.split_at(4);
    let len = u32::from_be_bytes([len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]]) as usize;
    if rest.len() < len {
        return Err(CodecError::Envelope(format!(
            "truncated {}: expected {} bytes, found {}",
            field,
            len,
            rest.len()
        )));
    }
    Ok(rest.split_at(len))
}

#[cfg(test)]
#[path = "envelope_tests.rs"]
mod tests;
