//! The message ingestion pipeline: decode, extract, resolve, publish.
//!
//! One call per inbound bus message, run to completion before the next
//! message is dispatched. Nothing in here returns an error to the bus
//! loop — every failure degrades to a heuristic path or an observable
//! error event.

use std::sync::Arc;

use metrics::counter;
use parking_lot::RwLock;
use rand::Rng;
use tracing::{debug, info};

use tagbridge_core::catalog::TagCatalog;
use tagbridge_core::extract::{extract, Payload};
use tagbridge_core::topic::is_tag_topic;

use crate::publisher::EventPublisher;

/// Length of generated test identifiers, matching real 96-bit-plus EPCs.
const TEST_EPC_LEN: usize = 24;

/// Decodes inbound messages and pushes every discovered tag read through
/// resolution and fan-out.
pub struct IngestPipeline {
    catalog: Arc<RwLock<TagCatalog>>,
    publisher: Arc<EventPublisher>,
}

impl IngestPipeline {
    #[must_use]
    pub fn new(catalog: Arc<RwLock<TagCatalog>>, publisher: Arc<EventPublisher>) -> Self {
        Self { catalog, publisher }
    }

    /// Processes one inbound bus message.
    pub fn process(&self, msg_topic: &str, raw: &[u8]) {
        counter!("tagbridge_ingest_messages_total").increment(1);

        let extraction = extract(msg_topic, raw);
        match &extraction.payload {
            Payload::Json(value) => self.publisher.mqtt_raw(msg_topic, value.clone()),
            Payload::Text(text) => self.publisher.mqtt_raw_text(msg_topic, text),
        }

        if is_tag_topic(msg_topic) {
            self.publisher
                .tag_data(msg_topic, extraction.payload.to_value());
        }

        if extraction.candidates.is_empty() {
            debug!(topic = msg_topic, "no tag candidates in message");
            return;
        }
        for epc in &extraction.candidates {
            self.process_epc(msg_topic, epc);
        }
    }

    /// Resolves one candidate identifier and publishes its event set.
    pub fn process_epc(&self, msg_topic: &str, epc: &str) {
        counter!("tagbridge_ingest_tag_reads_total").increment(1);
        info!(epc, topic = msg_topic, "tag read");
        let resolution = self.catalog.read().resolve(epc);
        self.publisher.tag_read(msg_topic, epc, &resolution);
    }

    /// Pushes a random identifier through the full publish path. Debug
    /// aid behind `GET /api/test-epc`; returns the generated identifier.
    pub fn inject_test_read(&self, reader_id: &str) -> String {
        const HEX: &[u8; 16] = b"0123456789ABCDEF";
        let mut rng = rand::rng();
        let epc: String = (0..TEST_EPC_LEN)
            .map(|_| HEX[rng.random_range(0..HEX.len())] as char)
            .collect();
        let synthetic_topic = format!("readers/{reader_id}/inventory");
        self.process_epc(&synthetic_topic, &epc);
        epc
    }
}
