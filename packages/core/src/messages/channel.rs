//! Named events pushed to real-time channel subscribers.
//!
//! Every frame is a JSON text message `{"event": name, "data": payload}`.
//! Event and field names are load-bearing: deployed frontends subscribe
//! to them by exact string, including the Spanish-named legacy events.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::now_iso;

/// Raw decoded bus message, re-emitted for debugging subscribers.
pub const MQTT_RAW: &str = "mqtt_raw";
/// Raw undecodable bus message (text form).
pub const MQTT_RAW_TEXT: &str = "mqtt_raw_text";
/// Full payload of a message on a tag-hinted topic.
pub const TAG_DATA: &str = "tag_data";
/// Generic tag-detected event, one per candidate identifier.
pub const RFID_TAG_DETECTED: &str = "rfidTagDetected";
/// A resolved read: the record merged with its `rfid`.
pub const EPC_DETECTADO: &str = "epcDetectado";
/// An unresolved read.
pub const EPC_NO_IDENTIFICADO: &str = "epcNoIdentificado";

/// Per-reader status event name.
#[must_use]
pub fn reader_status_event(reader_id: &str) -> String {
    format!("lector/{reader_id}/status")
}

/// Per-reader status-error event name.
#[must_use]
pub fn reader_status_error_event(reader_id: &str) -> String {
    format!("lector/{reader_id}/statusError")
}

/// Channel-compatible inventory event name, mirroring the bus topic.
#[must_use]
pub fn reader_inventory_event(reader_id: &str) -> String {
    format!("readers/{reader_id}/inventory")
}

/// One frame on the real-time channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChannelFrame {
    pub event: String,
    pub data: Value,
}

impl ChannelFrame {
    #[must_use]
    pub fn new(event: impl Into<String>, data: Value) -> Self {
        Self {
            event: event.into(),
            data,
        }
    }

    /// The JSON text form sent over the wire.
    ///
    /// # Errors
    ///
    /// Returns the underlying serialization error; `Value` payloads make
    /// this effectively infallible.
    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Payload of [`MQTT_RAW`] and [`TAG_DATA`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawMessageEvent {
    pub topic: String,
    pub data: Value,
    pub timestamp: String,
}

impl RawMessageEvent {
    #[must_use]
    pub fn new(topic: &str, data: Value) -> Self {
        Self {
            topic: topic.to_string(),
            data,
            timestamp: now_iso(),
        }
    }
}

/// Payload of [`MQTT_RAW_TEXT`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawTextEvent {
    pub topic: String,
    pub text: String,
    pub timestamp: String,
}

impl RawTextEvent {
    #[must_use]
    pub fn new(topic: &str, text: &str) -> Self {
        Self {
            topic: topic.to_string(),
            text: text.to_string(),
            timestamp: now_iso(),
        }
    }
}

/// Payload of [`RFID_TAG_DETECTED`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagDetectedEvent {
    pub epc: String,
    pub valid: bool,
    pub timestamp: String,
}

impl TagDetectedEvent {
    #[must_use]
    pub fn new(epc: &str) -> Self {
        Self {
            epc: epc.to_string(),
            valid: true,
            timestamp: now_iso(),
        }
    }
}

/// Payload of [`EPC_NO_IDENTIFICADO`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnknownEpcEvent {
    pub epc: String,
    pub timestamp: String,
}

impl UnknownEpcEvent {
    #[must_use]
    pub fn new(epc: &str) -> Self {
        Self {
            epc: epc.to_string(),
            timestamp: now_iso(),
        }
    }
}

/// Payload of the per-reader status-error event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusErrorEvent {
    pub error: String,
    pub details: String,
}

impl StatusErrorEvent {
    #[must_use]
    pub fn new(details: &str) -> Self {
        Self {
            error: "status query failed".to_string(),
            details: details.to_string(),
        }
    }
}
