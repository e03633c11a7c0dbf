//! Inventory catalog and identifier resolution.
//!
//! The catalog maps every normalized spelling of a tag identifier (see
//! [`crate::epc::variant_keys`]) to its [`InventoryRecord`]. Resolution is
//! read-heavy and mutation-free; `add`/`remove` are the only writers and
//! maintain the invariant that a record's full variant key set is either
//! entirely present or entirely absent.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::epc::variant_keys;

/// Product code prefix for records fabricated in permissive mode.
pub const GENERATED_CODE_PREFIX: &str = "AUTO-";

/// An immutable catalog entry for a tagged pallet.
///
/// Field renames keep the JSON wire form used by existing frontends and
/// bus consumers; the Rust names describe the fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryRecord {
    #[serde(rename = "claveProducto")]
    pub product_code: String,
    #[serde(rename = "nombreProducto")]
    pub product_name: String,
    #[serde(rename = "pesoBruto")]
    pub gross_weight: f64,
    #[serde(rename = "pesoNeto")]
    pub net_weight: f64,
    #[serde(rename = "piezas")]
    pub pieces: u32,
    #[serde(rename = "orden")]
    pub order_ref: String,
    #[serde(rename = "claveUnidad")]
    pub unit_code: String,
    #[serde(rename = "trazabilidad")]
    pub trace_code: String,
    /// Canonical tag identifier, hexadecimal digits.
    pub rfid: String,
    /// For generated records, the identifier as observed on the wire.
    #[serde(
        rename = "rfidOriginal",
        skip_serializing_if = "Option::is_none",
        default
    )]
    pub observed_rfid: Option<String>,
}

/// Outcome of resolving an observed identifier against the catalog.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    /// The identifier matched a catalog entry (under any variant key).
    Known(InventoryRecord),
    /// No match, but permissive mode fabricated a plausible record.
    Generated(InventoryRecord),
    /// No match and permissive mode is disabled.
    Unknown,
}

impl Resolution {
    /// The resolved or fabricated record, if any.
    #[must_use]
    pub fn record(&self) -> Option<&InventoryRecord> {
        match self {
            Self::Known(r) | Self::Generated(r) => Some(r),
            Self::Unknown => None,
        }
    }

    /// `true` when a record is available, matched or fabricated.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        !matches!(self, Self::Unknown)
    }

    /// `true` only for permissive-mode fabrications.
    #[must_use]
    pub fn is_generated(&self) -> bool {
        matches!(self, Self::Generated(_))
    }
}

/// Catalog mutation failures, surfaced to the caller and never retried.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("identifier {0} already exists in the catalog")]
    DuplicateIdentifier(String),
    #[error("identifier {0} does not match any catalog entry")]
    NotFound(String),
}

/// The identifier lookup table plus the record sequence it indexes.
#[derive(Debug)]
pub struct TagCatalog {
    records: Vec<InventoryRecord>,
    by_key: HashMap<String, InventoryRecord>,
    /// Template for permissive-mode fabrication; the first seeded record.
    template: Option<InventoryRecord>,
    permissive: bool,
}

impl TagCatalog {
    /// Builds a catalog from the given records, indexing every variant key.
    ///
    /// Two records colliding on a derived key (e.g. sharing a stripped
    /// leading-zero form) is a known ambiguity: the later record wins for
    /// that key. This is preserved, not validated against.
    #[must_use]
    pub fn new(records: Vec<InventoryRecord>, permissive: bool) -> Self {
        let mut catalog = Self {
            records: Vec::new(),
            by_key: HashMap::new(),
            template: records.first().cloned(),
            permissive,
        };
        for record in records {
            catalog.insert_unchecked(record);
        }
        catalog
    }

    /// Resolves an observed identifier to a [`Resolution`].
    ///
    /// Lookup is a single exact match against the variant key table. On a
    /// miss in permissive mode, a record is fabricated from the template:
    /// the product code becomes `AUTO-` plus the first six characters of
    /// the identifier, and the identifier fields carry the observed value.
    #[must_use]
    pub fn resolve(&self, epc: &str) -> Resolution {
        if let Some(record) = self.by_key.get(epc) {
            debug!(epc, rfid = %record.rfid, "identifier resolved");
            return Resolution::Known(record.clone());
        }
        if self.permissive {
            if let Some(template) = &self.template {
                debug!(epc, "identifier unknown, fabricating permissive record");
                return Resolution::Generated(synthesize(template, epc));
            }
        }
        debug!(epc, "identifier unknown");
        Resolution::Unknown
    }

    /// Adds a record and indexes all of its variant keys.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::DuplicateIdentifier`] if the canonical
    /// identifier is already indexed.
    pub fn add(&mut self, record: InventoryRecord) -> Result<(), CatalogError> {
        if self.by_key.contains_key(&record.rfid) {
            return Err(CatalogError::DuplicateIdentifier(record.rfid));
        }
        self.insert_unchecked(record);
        Ok(())
    }

    /// Removes the record owning the given identifier and all of its
    /// variant keys, returning the removed record.
    ///
    /// Any variant spelling of the identifier is accepted; the owning
    /// record's canonical identifier drives the key removal so the exact
    /// set inserted is the set removed.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::NotFound`] if no variant key matches.
    pub fn remove(&mut self, epc: &str) -> Result<InventoryRecord, CatalogError> {
        let record = self
            .by_key
            .get(epc)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(epc.to_string()))?;
        for key in variant_keys(&record.rfid) {
            self.by_key.remove(&key);
        }
        self.records.retain(|r| r.rfid != record.rfid);
        Ok(record)
    }

    /// All catalog records in insertion order.
    #[must_use]
    pub fn records(&self) -> &[InventoryRecord] {
        &self.records
    }

    /// Whether a specific lookup key is present. Exposed for invariant
    /// checks; resolution should go through [`Self::resolve`].
    #[must_use]
    pub fn has_key(&self, key: &str) -> bool {
        self.by_key.contains_key(key)
    }

    fn insert_unchecked(&mut self, record: InventoryRecord) {
        for key in variant_keys(&record.rfid) {
            // Last-write-wins on derived-key collisions.
            self.by_key.insert(key, record.clone());
        }
        self.records.push(record);
    }
}

/// Fabricates a permissive-mode record for an unrecognized identifier.
fn synthesize(template: &InventoryRecord, epc: &str) -> InventoryRecord {
    let code_stub: String = epc.chars().take(6).collect();
    InventoryRecord {
        product_code: format!("{GENERATED_CODE_PREFIX}{code_stub}"),
        rfid: epc.to_string(),
        observed_rfid: Some(epc.to_string()),
        ..template.clone()
    }
}

/// The fixed seed catalog loaded at process start. The first entry doubles
/// as the permissive-mode template.
#[must_use]
pub fn seed_catalog() -> Vec<InventoryRecord> {
    let base = InventoryRecord {
        product_code: "PT00161".to_string(),
        product_name: "VASO PLASTICO OK PASTELERÍA 12EU".to_string(),
        gross_weight: 0.0,
        net_weight: 0.0,
        pieces: 20,
        order_ref: "23221".to_string(),
        unit_code: "XBX".to_string(),
        trace_code: String::new(),
        rfid: String::new(),
        observed_rfid: None,
    };
    vec![
        InventoryRecord {
            trace_code: "2601014737010".to_string(),
            rfid: "0002601014737010".to_string(),
            ..base.clone()
        },
        InventoryRecord {
            trace_code: "2601014737009".to_string(),
            rfid: "0002601014737009".to_string(),
            ..base.clone()
        },
        InventoryRecord {
            trace_code: "24010000140030".to_string(),
            rfid: "00024010000140030".to_string(),
            ..base
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::epc::variant_keys;

    fn record(rfid: &str) -> InventoryRecord {
        InventoryRecord {
            product_code: "PT-TEST".to_string(),
            product_name: "Test pallet".to_string(),
            gross_weight: 1.5,
            net_weight: 1.0,
            pieces: 10,
            order_ref: "900".to_string(),
            unit_code: "XBX".to_string(),
            trace_code: rfid.trim_start_matches('0').to_string(),
            rfid: rfid.to_string(),
            observed_rfid: None,
        }
    }

    #[test]
    fn every_variant_resolves_to_the_same_record() {
        let catalog = TagCatalog::new(seed_catalog(), true);
        let canonical = catalog.resolve("0002601014737010");
        let Resolution::Known(expected) = canonical else {
            panic!("canonical form must resolve");
        };
        for key in variant_keys("0002601014737010") {
            match catalog.resolve(&key) {
                Resolution::Known(r) => assert_eq!(r, expected, "variant {key}"),
                other => panic!("variant {key} did not resolve: {other:?}"),
            }
        }
    }

    #[test]
    fn stripped_zeros_resolve_to_canonical_record() {
        let catalog = TagCatalog::new(seed_catalog(), true);
        let a = catalog.resolve("2601014737010");
        let b = catalog.resolve("0002601014737010");
        assert_eq!(a.record(), b.record());
        assert!(matches!(a, Resolution::Known(_)));
    }

    #[test]
    fn permissive_miss_generates_auto_record() {
        let catalog = TagCatalog::new(seed_catalog(), true);
        let resolution = catalog.resolve("FFFFAAAA1111");
        assert!(resolution.is_generated());
        let record = resolution.record().expect("generated record");
        assert_eq!(record.product_code, "AUTO-FFFFAA");
        assert_eq!(record.rfid, "FFFFAAAA1111");
        assert_eq!(record.observed_rfid.as_deref(), Some("FFFFAAAA1111"));
        // Template fields carry through.
        assert_eq!(record.product_name, "VASO PLASTICO OK PASTELERÍA 12EU");
    }

    #[test]
    fn strict_miss_is_unknown() {
        let catalog = TagCatalog::new(seed_catalog(), false);
        assert_eq!(catalog.resolve("FFFFAAAA1111"), Resolution::Unknown);
    }

    #[test]
    fn add_then_remove_clears_all_variant_keys() {
        let mut catalog = TagCatalog::new(seed_catalog(), true);
        let rfid = "00abcdef12345678";
        catalog.add(record(rfid)).expect("add");
        for key in variant_keys(rfid) {
            assert!(catalog.has_key(&key), "missing key {key} after add");
        }

        catalog.remove(rfid).expect("remove");
        for key in variant_keys(rfid) {
            assert!(!catalog.has_key(&key), "stale key {key} after remove");
        }
        assert!(!catalog.records().iter().any(|r| r.rfid == rfid));
    }

    #[test]
    fn remove_accepts_any_variant_spelling() {
        let mut catalog = TagCatalog::new(Vec::new(), false);
        catalog.add(record("00abcdef12345678")).expect("add");
        // Remove via the stripped form; the canonical key set must go too.
        catalog.remove("abcdef12345678").expect("remove by variant");
        assert!(!catalog.has_key("00abcdef12345678"));
    }

    #[test]
    fn duplicate_add_is_rejected() {
        let mut catalog = TagCatalog::new(seed_catalog(), true);
        let err = catalog.add(record("0002601014737010")).unwrap_err();
        assert_eq!(
            err,
            CatalogError::DuplicateIdentifier("0002601014737010".to_string())
        );
    }

    #[test]
    fn remove_unknown_is_not_found() {
        let mut catalog = TagCatalog::new(seed_catalog(), true);
        let err = catalog.remove("DOESNOTEXIST").unwrap_err();
        assert_eq!(err, CatalogError::NotFound("DOESNOTEXIST".to_string()));
    }

    #[test]
    fn colliding_derived_keys_last_write_wins_when_seeded() {
        // "0011aabbccdd" strips to "11aabbccdd", which is also the
        // canonical form of the second record. Documented ambiguity on
        // the unchecked seeding path.
        let catalog = TagCatalog::new(vec![record("0011aabbccdd"), record("11aabbccdd")], false);
        match catalog.resolve("11aabbccdd") {
            Resolution::Known(r) => assert_eq!(r.rfid, "11aabbccdd"),
            other => panic!("expected known record, got {other:?}"),
        }
        // Both records survive in the sequence; only the key collided.
        assert_eq!(catalog.records().len(), 2);
    }

    #[test]
    fn add_rejects_identifier_already_indexed_as_a_variant() {
        let mut catalog = TagCatalog::new(Vec::new(), false);
        catalog.add(record("0011aabbccdd")).expect("first");
        let err = catalog.add(record("11aabbccdd")).unwrap_err();
        assert_eq!(
            err,
            CatalogError::DuplicateIdentifier("11aabbccdd".to_string())
        );
    }

    #[test]
    fn empty_permissive_catalog_has_no_template() {
        let catalog = TagCatalog::new(Vec::new(), true);
        assert_eq!(catalog.resolve("FFFFAAAA1111"), Resolution::Unknown);
    }

    #[test]
    fn record_serializes_with_wire_field_names() {
        let json = serde_json::to_value(record("00abcdef12345678")).expect("serialize");
        let obj = json.as_object().expect("object");
        for key in [
            "claveProducto",
            "nombreProducto",
            "pesoBruto",
            "pesoNeto",
            "piezas",
            "orden",
            "claveUnidad",
            "trazabilidad",
            "rfid",
        ] {
            assert!(obj.contains_key(key), "missing wire key {key}");
        }
        assert!(!obj.contains_key("rfidOriginal"));
    }

    #[test]
    fn seed_catalog_has_three_records() {
        let seeds = seed_catalog();
        assert_eq!(seeds.len(), 3);
        assert_eq!(seeds[0].rfid, "0002601014737010");
    }
}
