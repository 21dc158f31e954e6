use maker_api::EventContent;
use serde_json::Value;

use crate::device::{AttributeValue, DeviceId};

/// A change pushed by the hub, as delivered to listeners.
///
/// `device_id` is `None` for hub-wide events (mode and HSM changes).
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub device_id: Option<DeviceId>,
    pub device_name: Option<String>,
    /// Name of the attribute that changed (`mode` and `hsmStatus` for hub-wide events)
    pub attribute: String,
    pub value: AttributeValue,
    pub unit: Option<String>,
    pub description: Option<String>,
    pub event_type: Option<String>,
    /// Extra payload attached by the hub, `Null` when absent
    pub data: Value,
}

impl From<EventContent> for Event {
    fn from(content: EventContent) -> Self {
        Self {
            device_id: content.device_id.map(DeviceId::new),
            device_name: content.display_name,
            value: AttributeValue::from_json(&content.value),
            attribute: content.name,
            unit: content.unit,
            description: content.description_text,
            event_type: content.event_type,
            data: content.data,
        }
    }
}
