//! The weather record itself: an opaque field -> value mapping with one
//! mandatory key, `id`. This crate never interprets the record's schema
//! beyond that — it is encoded/decoded as a plain JSON object and unknown
//! fields round-trip verbatim.

use crate::errors::{AggregationError, AggregationResult};
use serde_json::{Map, Value};

pub type StationId = String;

/// One station's observation, backed directly by a `serde_json::Map` so
/// that fields this crate never looks at still survive a parse/serialize
/// round-trip unchanged.
#[derive(Debug, Clone, PartialEq)]
pub struct Observation(Map<String, Value>);

impl Observation {
    /// Parse a JSON object body into an observation. Any non-object JSON
    /// value, or a syntax error, is a [`AggregationError::Parse`] failure.
    pub fn from_json_bytes(bytes: &[u8]) -> AggregationResult<Self> {
        let value: Value = serde_json::from_slice(bytes)
            .map_err(|e| AggregationError::parse(format!("invalid JSON body: {e}")))?;
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(AggregationError::parse(format!(
                "expected a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }

    /// Extract and validate the mandatory `id` field. Missing or empty
    /// `id` is a semantic validation failure, not a parse failure.
    pub fn id(&self) -> AggregationResult<StationId> {
        match self.0.get("id") {
            Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
            Some(Value::String(_)) => Err(AggregationError::semantic("'id' must not be empty")),
            Some(_) => Err(AggregationError::semantic("'id' must be a string")),
            None => Err(AggregationError::semantic("missing required field 'id'")),
        }
    }

    pub fn as_json(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn into_json(self) -> Map<String, Value> {
        self.0
    }

    pub fn to_json_vec(&self) -> AggregationResult<Vec<u8>> {
        Ok(serde_json::to_vec(&Value::Object(self.0.clone()))?)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }
}

impl From<Map<String, Value>> for Observation {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
