//! Event fan-out to the real-time channel and the message bus.
//!
//! Every emission is best-effort: a slow channel subscriber or a
//! disconnected bus drops the event with a log line and a counter, never
//! an error. Ingestion must keep flowing whatever the consumers do.

use std::sync::Arc;

use metrics::counter;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use tagbridge_core::catalog::Resolution;
use tagbridge_core::messages::bus::{
    BackendStatusEnvelope, ErrorEnvelope, GpoEventEnvelope, InventoryEnvelope,
    OperationEnvelope, ReaderStatusEnvelope,
};
use tagbridge_core::messages::channel::{
    self, ChannelFrame, RawMessageEvent, RawTextEvent, StatusErrorEvent, TagDetectedEvent,
    UnknownEpcEvent,
};
use tagbridge_core::messages::device::GpoState;
use tagbridge_core::topic::{self, TopicKind};

use crate::bus::BusSink;
use crate::network::ChannelRegistry;

/// Fans normalized events out to channel subscribers and the bus.
pub struct EventPublisher {
    channel: Arc<ChannelRegistry>,
    bus: Arc<dyn BusSink>,
    /// Reader attributed to tag reads whose topic names no reader.
    default_reader: String,
}

impl EventPublisher {
    #[must_use]
    pub fn new(channel: Arc<ChannelRegistry>, bus: Arc<dyn BusSink>, default_reader: &str) -> Self {
        Self {
            channel,
            bus,
            default_reader: default_reader.to_string(),
        }
    }

    /// Emits a named event on the real-time channel.
    pub fn emit(&self, event: &str, data: &impl Serialize) {
        match serde_json::to_value(data) {
            Ok(value) => match ChannelFrame::new(event, value).to_text() {
                Ok(text) => self.channel.broadcast_text(&text),
                Err(err) => warn!(event, %err, "failed to encode channel frame"),
            },
            Err(err) => warn!(event, %err, "failed to encode channel event payload"),
        }
    }

    /// Publishes an envelope to a reader topic on the bus.
    pub fn publish(&self, kind: TopicKind, reader_id: &str, envelope: &impl Serialize) {
        match serde_json::to_vec(envelope) {
            Ok(payload) => {
                let bus_topic = topic::reader_topic(kind, reader_id);
                if !self.bus.try_publish(&bus_topic, payload) {
                    debug!(topic = %bus_topic, "bus publish dropped");
                    counter!("tagbridge_bus_dropped_publishes_total").increment(1);
                }
            }
            Err(err) => warn!(%err, "failed to encode bus envelope"),
        }
    }

    /// Re-emits a decoded inbound message for debugging subscribers.
    pub fn mqtt_raw(&self, msg_topic: &str, data: Value) {
        self.emit(channel::MQTT_RAW, &RawMessageEvent::new(msg_topic, data));
    }

    /// Re-emits an undecodable inbound message as text.
    pub fn mqtt_raw_text(&self, msg_topic: &str, text: &str) {
        self.emit(channel::MQTT_RAW_TEXT, &RawTextEvent::new(msg_topic, text));
    }

    /// Emits the full payload of a message on a tag-hinted topic.
    pub fn tag_data(&self, msg_topic: &str, data: Value) {
        self.emit(channel::TAG_DATA, &RawMessageEvent::new(msg_topic, data));
    }

    /// Publishes the full event set for one processed tag read:
    /// the generic detection event, the channel-compatible inventory
    /// event, resolved/unresolved, and the bus inventory envelope.
    pub fn tag_read(&self, msg_topic: &str, epc: &str, resolution: &Resolution) {
        let reader_id = topic::reader_id_from_topic(msg_topic).unwrap_or(&self.default_reader);

        self.emit(channel::RFID_TAG_DETECTED, &TagDetectedEvent::new(epc));

        let envelope =
            InventoryEnvelope::new(epc, resolution.is_resolved(), resolution.record().cloned());
        self.emit(&channel::reader_inventory_event(reader_id), &envelope);
        self.publish(TopicKind::Inventory, reader_id, &envelope);

        match resolution.record() {
            Some(record) => {
                counter!("tagbridge_tag_reads_resolved_total").increment(1);
                self.emit(channel::EPC_DETECTADO, record);
            }
            None => {
                counter!("tagbridge_tag_reads_unresolved_total").increment(1);
                self.emit(channel::EPC_NO_IDENTIFICADO, &UnknownEpcEvent::new(epc));
            }
        }
    }

    /// Publishes one GPO line transition that reached the device.
    pub fn gpo_event(&self, reader_id: &str, gpo: u8, state: GpoState) {
        self.publish(TopicKind::Gpos, reader_id, &GpoEventEnvelope::new(gpo, state));
    }

    /// Republishes a polled device status on both surfaces.
    pub fn reader_status(&self, reader_id: &str, status: Value) {
        self.emit(&channel::reader_status_event(reader_id), &status);
        self.publish(
            TopicKind::Status,
            reader_id,
            &ReaderStatusEnvelope::new(status),
        );
    }

    /// Publishes a status-poll failure on both surfaces; polling goes on.
    pub fn status_error(&self, reader_id: &str, details: &str) {
        self.emit(
            &channel::reader_status_error_event(reader_id),
            &StatusErrorEvent::new(details),
        );
        self.publish(
            TopicKind::Errors,
            reader_id,
            &ErrorEnvelope::new("status_polling_error", details),
        );
    }

    /// Publishes a control operation envelope.
    pub fn operation(&self, reader_id: &str, operation: &str, details: serde_json::Map<String, Value>) {
        self.publish(
            TopicKind::Operations,
            reader_id,
            &OperationEnvelope::new(operation, details),
        );
    }

    /// Publishes a processing error envelope.
    pub fn error(&self, reader_id: &str, error_type: &str, message: &str) {
        self.publish(
            TopicKind::Errors,
            reader_id,
            &ErrorEnvelope::new(error_type, message),
        );
    }

    /// Publishes the backend's own bus presence.
    pub fn backend_status(&self, reader_id: &str, status: &str, backend_id: &str) {
        self.publish(
            TopicKind::Status,
            reader_id,
            &BackendStatusEnvelope::new(status, backend_id),
        );
    }
}
