//! JSON envelopes published to the message bus.
//!
//! Every envelope carries a `type` discriminator and a `timestamp`;
//! constructors stamp the current time so call sites cannot forget it.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::now_iso;
use crate::catalog::InventoryRecord;
use crate::messages::device::GpoState;

/// Published to a reader's status topic when the backend connects or
/// disconnects from the bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendStatusEnvelope {
    #[serde(rename = "type")]
    pub event_type: String,
    pub status: String,
    pub timestamp: String,
    pub backend_id: String,
}

impl BackendStatusEnvelope {
    #[must_use]
    pub fn new(status: &str, backend_id: &str) -> Self {
        Self {
            event_type: "backend_status".to_string(),
            status: status.to_string(),
            timestamp: now_iso(),
            backend_id: backend_id.to_string(),
        }
    }
}

/// Republished device status, one per poll tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReaderStatusEnvelope {
    #[serde(rename = "type")]
    pub event_type: String,
    pub status: Value,
    pub timestamp: String,
}

impl ReaderStatusEnvelope {
    #[must_use]
    pub fn new(status: Value) -> Self {
        Self {
            event_type: "reader_status".to_string(),
            status,
            timestamp: now_iso(),
        }
    }
}

/// A processed tag read, republished to the owning reader's inventory
/// topic. Resolved record fields are flattened into the envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryEnvelope {
    #[serde(rename = "type")]
    pub event_type: String,
    pub epc: String,
    pub valid: bool,
    pub timestamp: String,
    #[serde(flatten)]
    pub record: Option<InventoryRecord>,
}

impl InventoryEnvelope {
    #[must_use]
    pub fn new(epc: &str, valid: bool, record: Option<InventoryRecord>) -> Self {
        Self {
            event_type: "epc_read".to_string(),
            epc: epc.to_string(),
            valid,
            timestamp: now_iso(),
            record,
        }
    }
}

/// One digital-output line transition that reached the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GpoEventEnvelope {
    #[serde(rename = "type")]
    pub event_type: String,
    pub gpo: u8,
    pub state: GpoState,
    pub timestamp: String,
}

impl GpoEventEnvelope {
    #[must_use]
    pub fn new(gpo: u8, state: GpoState) -> Self {
        Self {
            event_type: "gpo_state_change".to_string(),
            gpo,
            state,
            timestamp: now_iso(),
        }
    }
}

/// A control operation performed against a reader (reading started,
/// stopped, ...). Arbitrary detail fields are flattened alongside.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationEnvelope {
    #[serde(rename = "type")]
    pub event_type: String,
    pub timestamp: String,
    #[serde(flatten)]
    pub details: serde_json::Map<String, Value>,
}

impl OperationEnvelope {
    #[must_use]
    pub fn new(operation: &str, details: serde_json::Map<String, Value>) -> Self {
        Self {
            event_type: operation.to_string(),
            timestamp: now_iso(),
            details,
        }
    }
}

/// An observable failure (polling query, message processing), published
/// to the reader's errors topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    #[serde(rename = "type")]
    pub event_type: String,
    pub message: String,
    pub timestamp: String,
}

impl ErrorEnvelope {
    #[must_use]
    pub fn new(error_type: &str, message: &str) -> Self {
        Self {
            event_type: error_type.to_string(),
            message: message.to_string(),
            timestamp: now_iso(),
        }
    }
}
