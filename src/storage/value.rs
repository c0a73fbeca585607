//! Firestore value codec.
//!
//! Firestore's REST API wraps every field in a single-key object naming its type
//! (`{"stringValue": "x"}`, `{"integerValue": "42"}`, ...). Reads are decoded
//! straight into plain JSON for the HTTP responses; writes go through the typed
//! `FieldValue` so timestamps and integers keep their store-side types.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{json, Map, Number, Value as JsonValue};

use super::{Fields, StoreError, StoreResult};

#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Bool(bool),
    Integer(i64),
    Double(f64),
    String(String),
    Timestamp(DateTime<Utc>),
    Array(Vec<FieldValue>),
    Map(BTreeMap<String, FieldValue>),
}

fn rfc3339(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn f64_to_json(d: f64) -> JsonValue {
    // NaN and the infinities have no JSON number form.
    match Number::from_f64(d) {
        Some(n) => JsonValue::Number(n),
        None => JsonValue::String(d.to_string()),
    }
}

impl FieldValue {
    /// Encode as a Firestore REST `Value` object.
    pub fn to_firestore(&self) -> JsonValue {
        match self {
            FieldValue::Null => json!({ "nullValue": null }),
            FieldValue::Bool(b) => json!({ "booleanValue": b }),
            FieldValue::Integer(i) => json!({ "integerValue": i.to_string() }),
            FieldValue::Double(d) => json!({ "doubleValue": f64_to_json(*d) }),
            FieldValue::String(s) => json!({ "stringValue": s }),
            FieldValue::Timestamp(ts) => json!({ "timestampValue": rfc3339(ts) }),
            FieldValue::Array(items) => {
                let values: Vec<JsonValue> = items.iter().map(|v| v.to_firestore()).collect();
                json!({ "arrayValue": { "values": values } })
            }
            FieldValue::Map(fields) => json!({ "mapValue": { "fields": encode_fields(fields) } }),
        }
    }

    /// Plain JSON rendering, matching what `decode_value` yields for the same stored value.
    pub fn to_json(&self) -> JsonValue {
        match self {
            FieldValue::Null => JsonValue::Null,
            FieldValue::Bool(b) => JsonValue::Bool(*b),
            FieldValue::Integer(i) => JsonValue::from(*i),
            FieldValue::Double(d) => f64_to_json(*d),
            FieldValue::String(s) => JsonValue::String(s.clone()),
            FieldValue::Timestamp(ts) => JsonValue::String(rfc3339(ts)),
            FieldValue::Array(items) => JsonValue::Array(items.iter().map(|v| v.to_json()).collect()),
            FieldValue::Map(fields) => {
                JsonValue::Object(fields.iter().map(|(k, v)| (k.clone(), v.to_json())).collect())
            }
        }
    }
}

impl From<JsonValue> for FieldValue {
    fn from(v: JsonValue) -> Self {
        match v {
            JsonValue::Null => FieldValue::Null,
            JsonValue::Bool(b) => FieldValue::Bool(b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => FieldValue::Integer(i),
                None => FieldValue::Double(n.as_f64().unwrap_or(f64::NAN)),
            },
            JsonValue::String(s) => FieldValue::String(s),
            JsonValue::Array(items) => FieldValue::Array(items.into_iter().map(FieldValue::from).collect()),
            JsonValue::Object(map) => {
                FieldValue::Map(map.into_iter().map(|(k, v)| (k, FieldValue::from(v))).collect())
            }
        }
    }
}

impl From<&str> for FieldValue {
    fn from(s: &str) -> Self { FieldValue::String(s.to_string()) }
}

impl From<String> for FieldValue {
    fn from(s: String) -> Self { FieldValue::String(s) }
}

impl From<DateTime<Utc>> for FieldValue {
    fn from(ts: DateTime<Utc>) -> Self { FieldValue::Timestamp(ts) }
}

/// Encode a field map as the `fields` object of a Firestore document.
pub fn encode_fields<'a, I>(fields: I) -> JsonValue
where
    I: IntoIterator<Item = (&'a String, &'a FieldValue)>,
{
    let mut out = Map::new();
    for (k, v) in fields {
        out.insert(k.clone(), v.to_firestore());
    }
    JsonValue::Object(out)
}

/// Decode a Firestore `fields` object into plain JSON.
pub fn decode_fields(fields: &JsonValue) -> StoreResult<Fields> {
    let obj = fields
        .as_object()
        .ok_or_else(|| StoreError::Decode("document fields is not an object".to_string()))?;
    let mut out = Map::with_capacity(obj.len());
    for (k, v) in obj {
        out.insert(k.clone(), decode_value(v)?);
    }
    Ok(out)
}

/// Decode one Firestore `Value` object into plain JSON.
pub fn decode_value(v: &JsonValue) -> StoreResult<JsonValue> {
    let obj = v
        .as_object()
        .ok_or_else(|| StoreError::Decode(format!("value is not an object: {v}")))?;
    let (kind, inner) = obj
        .iter()
        .next()
        .ok_or_else(|| StoreError::Decode("empty value object".to_string()))?;
    match kind.as_str() {
        "nullValue" => Ok(JsonValue::Null),
        "booleanValue" => inner
            .as_bool()
            .map(JsonValue::Bool)
            .ok_or_else(|| StoreError::Decode(format!("bad booleanValue: {inner}"))),
        // int64 travels as a decimal string
        "integerValue" => match inner {
            JsonValue::String(s) => s
                .parse::<i64>()
                .map(JsonValue::from)
                .map_err(|e| StoreError::Decode(format!("bad integerValue {s:?}: {e}"))),
            JsonValue::Number(n) => Ok(JsonValue::Number(n.clone())),
            other => Err(StoreError::Decode(format!("bad integerValue: {other}"))),
        },
        "doubleValue" => match inner {
            JsonValue::Number(n) => Ok(JsonValue::Number(n.clone())),
            JsonValue::String(s) => Ok(JsonValue::String(s.clone())),
            other => Err(StoreError::Decode(format!("bad doubleValue: {other}"))),
        },
        "stringValue" | "timestampValue" | "referenceValue" | "bytesValue" => inner
            .as_str()
            .map(|s| JsonValue::String(s.to_string()))
            .ok_or_else(|| StoreError::Decode(format!("bad {kind}: {inner}"))),
        "geoPointValue" => {
            let point = inner
                .as_object()
                .ok_or_else(|| StoreError::Decode(format!("bad geoPointValue: {inner}")))?;
            // a zero coordinate is omitted on the wire
            let coord = |name: &str| match point.get(name) {
                None => Ok(0.0),
                Some(x) => x
                    .as_f64()
                    .ok_or_else(|| StoreError::Decode(format!("bad geoPointValue {name}: {x}"))),
            };
            Ok(json!({ "latitude": coord("latitude")?, "longitude": coord("longitude")? }))
        }
        "arrayValue" => {
            let values = match inner.get("values") {
                Some(JsonValue::Array(items)) => items.iter().map(decode_value).collect::<StoreResult<Vec<_>>>()?,
                Some(other) => return Err(StoreError::Decode(format!("bad arrayValue: {other}"))),
                // an empty array omits `values`
                None => Vec::new(),
            };
            Ok(JsonValue::Array(values))
        }
        "mapValue" => match inner.get("fields") {
            Some(fields) => decode_fields(fields).map(JsonValue::Object),
            None => Ok(JsonValue::Object(Map::new())),
        },
        other => Err(StoreError::Decode(format!("unsupported value type {other}"))),
    }
}

#[cfg(test)]
#[path = "value_tests.rs"]
mod value_tests;
