//! Raw transport records and the canonical normalized record.
//!
//! [`RawRecord`] is whatever the transport returned, held as a JSON
//! object. [`NormalizedRecord`] is the flat, deterministic field map that
//! the emitter receives. Conversion between the two lives in the engine.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::ExtractError;

/// Field every normalized record must carry.
pub const ID_FIELD: &str = "id";

/// Unmodified object returned by the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord(serde_json::Value);

impl RawRecord {
    #[must_use]
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    #[must_use]
    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }

    /// Look up a top-level attribute by its transport-side name.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&serde_json::Value> {
        self.0.get(name)
    }
}

impl From<serde_json::Value> for RawRecord {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}

/// One item of a standardized-values fetch (periodic measurement data).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataValue {
    pub standardized_data_id: i64,
    pub data_item_id: i64,
    #[serde(default)]
    pub scenario_id: Option<i64>,
    pub period_end: String,
    pub reported_date: String,
    #[serde(default)]
    pub entities_path: Vec<i64>,
    #[serde(default)]
    pub data_value_type: Option<String>,
    /// Measured value: number, date text, string, or null.
    #[serde(default)]
    pub value: serde_json::Value,
}

/// Scalar cell of a normalized record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScalarValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

impl ScalarValue {
    /// Text form used in log lines and for date parsing.
    #[must_use]
    pub fn to_text(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Bool(v) => v.to_string(),
            Self::Int(v) => v.to_string(),
            Self::Float(v) => v.to_string(),
            Self::Text(v) => v.clone(),
        }
    }

    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

impl From<&str> for ScalarValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ScalarValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for ScalarValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<bool> for ScalarValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Flat mapping of field name to scalar value. Always contains `id`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct NormalizedRecord {
    fields: BTreeMap<String, ScalarValue>,
}

impl NormalizedRecord {
    /// Wrap a field map, rejecting it when `id` is absent or null.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::Transform`] when the map has no usable `id`.
    pub fn new(fields: BTreeMap<String, ScalarValue>) -> Result<Self, ExtractError> {
        match fields.get(ID_FIELD) {
            Some(id) if !id.is_null() => Ok(Self { fields }),
            _ => Err(ExtractError::transform(
                None,
                format!("normalized record has no '{ID_FIELD}' field"),
            )),
        }
    }

    /// The record's `id` value.
    #[must_use]
    pub fn id(&self) -> &ScalarValue {
        // Presence is checked in `new`.
        &self.fields[ID_FIELD]
    }

    #[must_use]
    pub fn get(&self, field: &str) -> Option<&ScalarValue> {
        self.fields.get(field)
    }

    #[must_use]
    pub fn fields(&self) -> &BTreeMap<String, ScalarValue> {
        &self.fields
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
