//! Telemetry extraction: finding tag reads in arbitrary bus payloads.
//!
//! Reader firmware, gateway shims, and legacy integrations each publish
//! tag reads in a different JSON shape. Extraction first attempts the
//! known shapes as a tagged decode in priority order; when none matches
//! it falls back to a bounded recursive scan of the decoded value. The
//! scan is deliberately low-precision and high-recall: a false candidate
//! costs one spurious event downstream, a missed read costs a pallet.
//!
//! Payloads that are not valid JSON are still scanned as raw text for
//! identifier-shaped hex runs; malformed input never aborts ingestion.

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, trace};

use crate::epc::{is_hex, MIN_CANDIDATE_LEN};

/// Event-type marker of the canonical reader inventory shape.
pub const INVENTORY_EVENT_TYPE: &str = "tagInventory";

/// Maximum recursion depth for the structural scan. Bounds work on
/// adversarially deep or cyclic-looking input.
pub const MAX_SCAN_DEPTH: usize = 8;

/// Case-insensitive field-name fragments that mark a string value as a
/// candidate identifier regardless of its format.
const IDENTIFIER_KEYWORDS: [&str; 4] = ["tag", "epc", "rfid", "tid"];

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EpcCarrier {
    epc_hex: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CanonicalInventoryEvent {
    event_type: String,
    tag_inventory_event: EpcCarrier,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FlatRead {
    epc_hex: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WrappedTagEvent {
    tag_event: EpcCarrier,
}

/// The known structured message shapes, in decode priority order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagShape {
    /// `{"eventType": "tagInventory", "tagInventoryEvent": {"epcHex": ..}}`
    Canonical { epc: String },
    /// `{"epcHex": ..}` at the top level.
    Flat { epc: String },
    /// `{"tagEvent": {"epcHex": ..}}`
    Wrapped { epc: String },
}

impl TagShape {
    /// Attempts each known shape in priority order; first match wins.
    #[must_use]
    pub fn decode(value: &Value) -> Option<Self> {
        if let Ok(event) = CanonicalInventoryEvent::deserialize(value) {
            if event.event_type == INVENTORY_EVENT_TYPE {
                return Some(Self::Canonical {
                    epc: event.tag_inventory_event.epc_hex,
                });
            }
        }
        if let Ok(flat) = FlatRead::deserialize(value) {
            return Some(Self::Flat { epc: flat.epc_hex });
        }
        if let Ok(wrapped) = WrappedTagEvent::deserialize(value) {
            return Some(Self::Wrapped {
                epc: wrapped.tag_event.epc_hex,
            });
        }
        None
    }

    /// The carried identifier.
    #[must_use]
    pub fn into_epc(self) -> String {
        match self {
            Self::Canonical { epc } | Self::Flat { epc } | Self::Wrapped { epc } => epc,
        }
    }
}

/// The decoded form of an inbound payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Payload decoded as JSON.
    Json(Value),
    /// Payload was not valid JSON; kept as text for the raw-scan path.
    Text(String),
}

impl Payload {
    /// A JSON view of the payload for re-emission. Undecodable text is
    /// wrapped in a `rawMessage` object, matching the wire form consumers
    /// already handle.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Json(value) => value.clone(),
            Self::Text(text) => serde_json::json!({ "rawMessage": text }),
        }
    }
}

/// Result of extracting one bus message: the decoded payload plus every
/// candidate identifier discovered in it, produced fresh per call.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub payload: Payload,
    pub candidates: Vec<String>,
}

/// Decodes a raw payload and collects candidate identifiers.
///
/// JSON payloads try the known [`TagShape`]s first (first match wins and
/// yields exactly one candidate); otherwise the recursive structural scan
/// runs. Non-JSON payloads degrade to a raw-text hex-run scan.
#[must_use]
pub fn extract(topic: &str, raw: &[u8]) -> Extraction {
    match serde_json::from_slice::<Value>(raw) {
        Ok(value) => {
            let candidates = match TagShape::decode(&value) {
                Some(shape) => {
                    trace!(topic, ?shape, "payload matched a known tag shape");
                    vec![shape.into_epc()]
                }
                None => {
                    let mut found = Vec::new();
                    scan_value(&value, 0, &mut found);
                    trace!(topic, count = found.len(), "structural scan finished");
                    found
                }
            };
            Extraction {
                payload: Payload::Json(value),
                candidates,
            }
        }
        Err(err) => {
            let text = String::from_utf8_lossy(raw).into_owned();
            debug!(topic, %err, "payload is not JSON, scanning as raw text");
            let candidates = scan_text(&text);
            Extraction {
                payload: Payload::Text(text),
                candidates,
            }
        }
    }
}

/// `true` when a field name suggests its value is a tag identifier.
fn field_name_hints_identifier(key: &str) -> bool {
    let lowered = key.to_ascii_lowercase();
    IDENTIFIER_KEYWORDS.iter().any(|kw| lowered.contains(kw))
}

/// Depth-first scan of a decoded value. One candidate is emitted per
/// qualifying string field; a field qualifying on both the hex rule and
/// the keyword rule is still emitted once. Duplicates across distinct
/// fields are intentionally kept.
fn scan_value(value: &Value, depth: usize, out: &mut Vec<String>) {
    if depth > MAX_SCAN_DEPTH {
        return;
    }
    match value {
        Value::Array(items) => {
            for item in items {
                if item.is_object() || item.is_array() {
                    scan_value(item, depth + 1, out);
                }
            }
        }
        Value::Object(map) => {
            for (key, field) in map {
                if let Value::String(s) = field {
                    let hex_shaped = s.len() >= MIN_CANDIDATE_LEN && is_hex(s);
                    if hex_shaped || field_name_hints_identifier(key) {
                        trace!(key, value = %s, "candidate identifier field");
                        out.push(s.clone());
                    }
                }
                if field.is_object() || field.is_array() {
                    scan_value(field, depth + 1, out);
                }
            }
        }
        _ => {}
    }
}

/// Scans free text for identifier-shaped substrings: maximal hex runs of
/// at least [`MIN_CANDIDATE_LEN`] characters.
fn scan_text(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_ascii_hexdigit())
        .filter(|run| run.len() >= MIN_CANDIDATE_LEN)
        .map(str::to_string)
        .collect()
}
