//! Application-layer payload serialization
//!
//! Stores that only hold bytes (Redis, the cache table) get values encoded
//! here instead of through any store-side serializer. Integers always end
//! up as plain decimal text, which is what native `INCRBY`/`DECRBY` need.

use crate::errors::{CacheError, CacheResult};
use config::Serializer;
use serde_json::Value;

/// Encoder/decoder for stored payloads
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PayloadCodec {
    serializer: Serializer,
}

impl PayloadCodec {
    pub fn new(serializer: Serializer) -> Self {
        Self { serializer }
    }

    pub fn serializer(&self) -> Serializer {
        self.serializer
    }

    pub fn encode(&self, value: &Value) -> CacheResult<String> {
        match self.serializer {
            Serializer::Json => Ok(serde_json::to_string(value)?),
            Serializer::Raw => match value {
                Value::String(s) => Ok(s.clone()),
                Value::Number(n) => Ok(n.to_string()),
                Value::Bool(b) => Ok(b.to_string()),
                Value::Null | Value::Array(_) | Value::Object(_) => {
                    Err(CacheError::UnsupportedValue(
                        "raw serializer only stores strings, numbers and booleans".to_string(),
                    ))
                }
            },
        }
    }

    pub fn decode(&self, payload: &str) -> CacheResult<Value> {
        match self.serializer {
            Serializer::Json => Ok(serde_json::from_str(payload)?),
            Serializer::Raw => Ok(match payload.parse::<i64>() {
                Ok(n) => Value::from(n),
                Err(_) => Value::String(payload.to_string()),
            }),
        }
    }
}

/// Integer carried by a stored value, if any
pub fn as_counter(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
