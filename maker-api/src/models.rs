//! Wire types for Maker API responses and event pushes.
//!
//! Hubs are not strict about types: ids arrive as strings or numbers,
//! attribute values as strings, numbers or null, and capability lists mix
//! plain names with objects. Everything here deserializes leniently and
//! leaves interpretation to the caller.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// One entry of `GET devices`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DeviceSummary {
    #[serde(deserialize_with = "lenient_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub label: String,
    #[serde(default, rename = "type")]
    pub device_type: Option<String>,
}

/// One attribute of a device detail.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AttributeInfo {
    pub name: String,
    #[serde(default, rename = "dataType")]
    pub data_type: Option<String>,
    #[serde(default, rename = "currentValue")]
    pub current_value: Value,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub unit: Option<String>,
    #[serde(default, deserialize_with = "strings_only_opt")]
    pub values: Option<Vec<String>>,
}

/// Response of `GET devices/{id}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DeviceDetail {
    #[serde(deserialize_with = "lenient_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub label: String,
    #[serde(default, rename = "type")]
    pub device_type: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub manufacturer: Option<String>,
    #[serde(default)]
    pub room: Option<String>,
    #[serde(default)]
    pub attributes: Vec<AttributeInfo>,
    /// Capability names; non-string entries are dropped
    #[serde(default, deserialize_with = "strings_only")]
    pub capabilities: Vec<String>,
    /// Command names; non-string entries are dropped
    #[serde(default, deserialize_with = "strings_only")]
    pub commands: Vec<String>,
}

/// One entry of `GET modes`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ModeInfo {
    #[serde(default, deserialize_with = "lenient_opt_id")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub active: bool,
}

/// Response of `GET hsm` and `GET hsm/{command}`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct HsmStatus {
    pub hsm: String,
}

/// The `content` object of an event POSTed by the hub.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EventContent {
    #[serde(default, rename = "deviceId", deserialize_with = "lenient_opt_id")]
    pub device_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub value: Value,
    #[serde(default, rename = "displayName")]
    pub display_name: Option<String>,
    #[serde(default, rename = "descriptionText")]
    pub description_text: Option<String>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub unit: Option<String>,
    #[serde(default, rename = "type")]
    pub event_type: Option<String>,
    #[serde(default)]
    pub data: Value,
}

impl EventContent {
    /// Pull the `content` envelope out of a pushed body.
    ///
    /// Returns `None` when there is no envelope at all, and the decode error
    /// when the envelope is there but does not have the expected shape.
    pub fn from_body(body: &Value) -> Option<serde_json::Result<Self>> {
        body.get("content")
            .map(|content| EventContent::deserialize(content))
    }
}

/// Whether a response body carries a truthy `error` field.
pub fn error_field(body: &Value) -> Option<&Value> {
    body.get("error").filter(|error| is_truthy(error))
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn id_from_value(value: Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn lenient_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    id_from_value(value.clone())
        .ok_or_else(|| serde::de::Error::custom(format!("invalid id: {value}")))
}

fn lenient_opt_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(id_from_value(Value::deserialize(deserializer)?))
}

fn lenient_opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    })
}

fn strings_only<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(strings_only_opt(deserializer)?.unwrap_or_default())
}

fn strings_only_opt<'de, D>(deserializer: D) -> Result<Option<Vec<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => Some(
            items
                .into_iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s),
                    _ => None,
                })
                .collect(),
        ),
        _ => None,
    })
}
