//! Raw-to-canonical record conversion and watermark filtering.
//!
//! [`normalize`] turns a transport object into a flat, snake_case field map.
//! [`normalize_data_value`] does the same for periodic measurement items.
//! [`RecordFilter`] decides whether a normalized record is newer than a cutoff.

use std::collections::BTreeMap;

use ilevel_types::datetime::{format_naive, parse_naive_datetime};
use ilevel_types::error::ExtractError;
use ilevel_types::record::{DataValue, NormalizedRecord, RawRecord, ScalarValue, ID_FIELD};
use ilevel_types::state::Watermark;
use serde_json::Value;

/// Convert a `CamelCase` attribute name to `snake_case`.
///
/// Acronym runs stay together: `XIRRValue` becomes `xirr_value`.
#[must_use]
pub fn to_snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);
    for (i, &c) in chars.iter().enumerate() {
        if c.is_uppercase() {
            let prev = i.checked_sub(1).map(|p| chars[p]);
            let next = chars.get(i + 1).copied();
            let boundary = match prev {
                Some(p) if p.is_lowercase() || p.is_ascii_digit() => true,
                Some(p) if p.is_uppercase() => next.is_some_and(char::is_lowercase),
                _ => false,
            };
            if boundary && !out.ends_with('_') {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Best-effort identifier of a raw record, for log context.
fn raw_record_id(raw: &RawRecord) -> Option<String> {
    ["Id", "id", "ID"]
        .iter()
        .find_map(|key| raw.attribute(key))
        .filter(|v| !v.is_null())
        .map(|v| match v {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        })
}

fn scalar_from_json(value: &Value) -> ScalarValue {
    match value {
        Value::Null => ScalarValue::Null,
        Value::Bool(b) => ScalarValue::Bool(*b),
        Value::Number(n) => n
            .as_i64()
            .map(ScalarValue::Int)
            .or_else(|| n.as_f64().map(ScalarValue::Float))
            .unwrap_or_else(|| ScalarValue::Text(n.to_string())),
        Value::String(s) => {
            if s.eq_ignore_ascii_case("true") {
                ScalarValue::Bool(true)
            } else if s.eq_ignore_ascii_case("false") {
                ScalarValue::Bool(false)
            } else {
                ScalarValue::Text(s.clone())
            }
        }
        // Arrays are kept as their compact JSON text.
        Value::Array(_) | Value::Object(_) => ScalarValue::Text(value.to_string()),
    }
}

fn flatten_into(
    prefix: Option<&str>,
    object: &serde_json::Map<String, Value>,
    out: &mut BTreeMap<String, ScalarValue>,
) {
    for (key, value) in object {
        let key = to_snake_case(key);
        let name = match prefix {
            Some(p) => format!("{p}_{key}"),
            None => key,
        };
        match value {
            Value::Object(nested) => flatten_into(Some(&name), nested, out),
            other => {
                out.insert(name, scalar_from_json(other));
            }
        }
    }
}

/// Normalize a raw transport record into a flat field map.
///
/// Deterministic: the same input always yields the same record.
///
/// # Errors
///
/// Returns [`ExtractError::Transform`] when the input is not an object or
/// carries no `id`.
pub fn normalize(raw: &RawRecord) -> Result<NormalizedRecord, ExtractError> {
    let Value::Object(object) = raw.as_value() else {
        return Err(ExtractError::transform(
            None,
            format!("expected an object, got {}", json_kind(raw.as_value())),
        ));
    };

    let mut fields = BTreeMap::new();
    flatten_into(None, object, &mut fields);
    NormalizedRecord::new(fields).map_err(|_| {
        ExtractError::transform(
            raw_record_id(raw),
            format!("record has no '{ID_FIELD}' attribute"),
        )
    })
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

/// Parse a date-like value and render it at midnight in the canonical form.
fn canonical_date(field: &str, raw: &str, record_id: i64) -> Result<ScalarValue, ExtractError> {
    parse_naive_datetime(raw)
        .map(|dt| ScalarValue::Text(format_naive(dt.date().and_time(chrono::NaiveTime::MIN))))
        .ok_or_else(|| {
            ExtractError::transform(
                Some(record_id.to_string()),
                format!("{field} '{raw}' is not a recognised date"),
            )
        })
}

fn is_date_type(data_value_type: Option<&str>) -> bool {
    data_value_type
        .is_some_and(|t| t.eq_ignore_ascii_case("date") || t.eq_ignore_ascii_case("datetime"))
}

/// Convert one periodic value item into its canonical record.
///
/// Numeric values become text, date values are rendered as
/// `YYYY-MM-DDTHH:MM:SS`, anything else passes through.
///
/// # Errors
///
/// Returns [`ExtractError::Transform`] when a date field cannot be parsed.
pub fn normalize_data_value(item: &DataValue) -> Result<NormalizedRecord, ExtractError> {
    let id = item.standardized_data_id;

    let value = match &item.value {
        Value::Number(n) => ScalarValue::Text(n.to_string()),
        Value::String(s) if is_date_type(item.data_value_type.as_deref()) => {
            canonical_date("value", s, id)?
        }
        Value::String(s) => ScalarValue::Text(s.clone()),
        Value::Bool(b) => ScalarValue::Bool(*b),
        Value::Null => ScalarValue::Null,
        other => ScalarValue::Text(other.to_string()),
    };

    let entities_path = serde_json::to_string(&item.entities_path)
        .map_err(|e| ExtractError::transform(Some(id.to_string()), e.to_string()))?;

    let mut fields = BTreeMap::new();
    fields.insert(ID_FIELD.to_string(), ScalarValue::Int(id));
    fields.insert("standardized_data_id".to_string(), ScalarValue::Int(id));
    fields.insert("data_item_id".to_string(), ScalarValue::Int(item.data_item_id));
    fields.insert(
        "scenario_id".to_string(),
        item.scenario_id.map_or(ScalarValue::Null, ScalarValue::Int),
    );
    fields.insert("period_end".to_string(), canonical_date("period_end", &item.period_end, id)?);
    fields.insert(
        "reported_date".to_string(),
        canonical_date("reported_date", &item.reported_date, id)?,
    );
    fields.insert("entities_path".to_string(), ScalarValue::Text(entities_path));
    fields.insert(
        "data_value_type".to_string(),
        item.data_value_type
            .clone()
            .map_or(ScalarValue::Null, ScalarValue::Text),
    );
    fields.insert("value".to_string(), value);
    NormalizedRecord::new(fields)
}

/// Strictly-newer-than-cutoff test on a replication key.
///
/// Remembers the latest key value it let through, so a window can be
/// checkpointed past records stamped after its end-day midnight.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordFilter {
    field: String,
    cutoff: Watermark,
    newest: Option<Watermark>,
}

impl RecordFilter {
    #[must_use]
    pub fn new(field: impl Into<String>, cutoff: Watermark) -> Self {
        Self {
            field: field.into(),
            cutoff,
            newest: None,
        }
    }

    /// Latest replication-key value accepted so far.
    #[must_use]
    pub fn newest(&self) -> Option<Watermark> {
        self.newest
    }

    /// Whether `record`'s replication key is strictly later than the cutoff.
    ///
    /// Offsets in the stored value are dropped before comparing.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError::Transform`] when the key is missing or not a date.
    pub fn accepts(&mut self, record: &NormalizedRecord) -> Result<bool, ExtractError> {
        let record_id = || Some(record.id().to_text());
        let value = match record.get(&self.field) {
            Some(ScalarValue::Text(text)) => text,
            Some(ScalarValue::Null) | None => {
                return Err(ExtractError::transform(
                    record_id(),
                    format!("replication key '{}' is missing", self.field),
                ))
            }
            Some(other) => {
                return Err(ExtractError::transform(
                    record_id(),
                    format!("replication key '{}' is not a date: {}", self.field, other.to_text()),
                ))
            }
        };
        let parsed = Watermark::parse(value).ok_or_else(|| {
            ExtractError::transform(
                record_id(),
                format!("replication key '{}' value '{value}' is not a date", self.field),
            )
        })?;
        if parsed <= self.cutoff {
            return Ok(false);
        }
        self.newest = self.newest.max(Some(parsed));
        Ok(true)
    }
}
