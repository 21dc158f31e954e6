//! Device model
//!
//! A [`Device`] mirrors one device on the hub. Its attribute set is fixed
//! when its detail is loaded; pushed events may only change the value and
//! unit of attributes it already has.

use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use maker_api::{AttributeInfo, DeviceDetail};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Hub-assigned device identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DeviceId(String);

impl DeviceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for DeviceId {
    fn from(s: &str) -> Self {
        DeviceId::new(s)
    }
}

impl From<String> for DeviceId {
    fn from(s: String) -> Self {
        DeviceId::new(s)
    }
}

impl Borrow<str> for DeviceId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// Current value of an attribute.
///
/// Hubs report values as strings, numbers or null regardless of the
/// declared [`DataType`]; coercions are explicit and fallible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Null,
    Number(f64),
    String(String),
}

impl AttributeValue {
    /// Convert a JSON value reported by the hub.
    ///
    /// Booleans, arrays and objects are kept in their JSON text form.
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => AttributeValue::Null,
            Value::Number(n) => n
                .as_f64()
                .map_or_else(|| AttributeValue::String(n.to_string()), AttributeValue::Number),
            Value::String(s) => AttributeValue::String(s.clone()),
            other => AttributeValue::String(other.to_string()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric value, parsing strings like `"72.5"`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttributeValue::Number(n) => Some(*n),
            AttributeValue::String(s) => s.trim().parse().ok(),
            AttributeValue::Null => None,
        }
    }

    /// Integer value; fails for numbers with a fractional part.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttributeValue::String(s) => s.trim().parse().ok().or_else(|| {
                self.as_f64().and_then(integral)
            }),
            _ => self.as_f64().and_then(integral),
        }
    }
}

fn integral(n: f64) -> Option<i64> {
    (n.fract() == 0.0 && n.is_finite() && n.abs() < i64::MAX as f64).then_some(n as i64)
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Null => write!(f, "null"),
            AttributeValue::Number(n) => match integral(*n) {
                Some(i) => write!(f, "{i}"),
                None => write!(f, "{n}"),
            },
            AttributeValue::String(s) => write!(f, "{s}"),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(s: &str) -> Self {
        AttributeValue::String(s.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(s: String) -> Self {
        AttributeValue::String(s)
    }
}

impl From<f64> for AttributeValue {
    fn from(n: f64) -> Self {
        AttributeValue::Number(n)
    }
}

impl From<i64> for AttributeValue {
    fn from(n: i64) -> Self {
        AttributeValue::Number(n as f64)
    }
}

impl PartialEq<str> for AttributeValue {
    fn eq(&self, other: &str) -> bool {
        self.as_str() == Some(other)
    }
}

impl PartialEq<&str> for AttributeValue {
    fn eq(&self, other: &&str) -> bool {
        self.as_str() == Some(*other)
    }
}

/// Declared data type of an attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataType {
    Number,
    String,
    Enum,
    Json,
    /// A type tag this crate does not interpret, e.g. `DATE` or `VECTOR3`
    Other(String),
}

impl DataType {
    pub fn parse(tag: &str) -> Self {
        match tag.to_ascii_uppercase().as_str() {
            "NUMBER" | "INTEGER" | "DECIMAL" => DataType::Number,
            "STRING" => DataType::String,
            "ENUM" => DataType::Enum,
            "JSON_OBJECT" | "JSON" => DataType::Json,
            _ => DataType::Other(tag.to_string()),
        }
    }
}

/// One attribute of a device
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub data_type: DataType,
    pub value: AttributeValue,
    pub unit: Option<String>,
    /// Legal values of an enum attribute
    pub values: Option<Vec<String>>,
}

impl From<AttributeInfo> for Attribute {
    fn from(info: AttributeInfo) -> Self {
        Self {
            data_type: info
                .data_type
                .as_deref()
                .map_or(DataType::Other(String::new()), DataType::parse),
            value: AttributeValue::from_json(&info.current_value),
            unit: info.unit,
            values: info.values,
            name: info.name,
        }
    }
}

/// A device on the hub
#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    id: DeviceId,
    name: String,
    label: String,
    device_type: Option<String>,
    model: Option<String>,
    manufacturer: Option<String>,
    room: Option<String>,
    attributes: BTreeMap<String, Attribute>,
    capabilities: Vec<String>,
    commands: Vec<String>,
    last_update: DateTime<Utc>,
}

impl Device {
    /// Build a device from its detail, keyed by `id`.
    pub fn new(id: DeviceId, detail: DeviceDetail) -> Self {
        let mut device = Self {
            id,
            name: String::new(),
            label: String::new(),
            device_type: None,
            model: None,
            manufacturer: None,
            room: None,
            attributes: BTreeMap::new(),
            capabilities: Vec::new(),
            commands: Vec::new(),
            last_update: Utc::now(),
        };
        device.replace(detail);
        device
    }

    pub fn id(&self) -> &DeviceId {
        &self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// User-assigned name
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Driver type name
    pub fn device_type(&self) -> Option<&str> {
        self.device_type.as_deref()
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    pub fn manufacturer(&self) -> Option<&str> {
        self.manufacturer.as_deref()
    }

    pub fn room(&self) -> Option<&str> {
        self.room.as_deref()
    }

    pub fn attributes(&self) -> &BTreeMap<String, Attribute> {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    /// Current value of an attribute, `None` when the device has no such attribute.
    pub fn get_attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name).map(|attr| &attr.value)
    }

    pub fn capabilities(&self) -> &[String] {
        &self.capabilities
    }

    pub fn commands(&self) -> &[String] {
        &self.commands
    }

    pub fn has_capability(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|c| c == capability)
    }

    pub fn has_command(&self, command: &str) -> bool {
        self.commands.iter().any(|c| c == command)
    }

    /// When the device last changed, for diagnostics only.
    pub fn last_update(&self) -> DateTime<Utc> {
        self.last_update
    }

    /// Set the value (and unit, when given) of an existing attribute.
    ///
    /// Updates to attributes the device does not have are dropped and
    /// logged. Returns whether the update was applied.
    pub fn update_attribute(
        &mut self,
        name: &str,
        value: AttributeValue,
        unit: Option<String>,
    ) -> bool {
        let Some(attr) = self.attributes.get_mut(name) else {
            tracing::warn!("Tried to update unknown attribute {} of device {}", name, self.id);
            return false;
        };

        attr.value = value;
        if unit.is_some() {
            attr.unit = unit;
        }
        self.last_update = Utc::now();
        true
    }

    /// Swap in a freshly loaded detail, replacing attributes, capabilities and commands.
    pub fn replace(&mut self, detail: DeviceDetail) {
        self.name = detail.name;
        self.label = detail.label;
        self.device_type = detail.device_type;
        self.model = detail.model;
        self.manufacturer = detail.manufacturer;
        self.room = detail.room;
        self.attributes = detail
            .attributes
            .into_iter()
            .map(|info| (info.name.clone(), Attribute::from(info)))
            .collect();
        self.capabilities = detail.capabilities;
        self.commands = detail.commands;
        self.last_update = Utc::now();
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.label, self.id)
    }
}
