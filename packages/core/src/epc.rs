//! EPC identifier normalization.
//!
//! Readers and legacy integrations disagree on how a tag identifier is
//! written: some strip leading zeros, some carry the "00" pallet prefix,
//! some uppercase the hex digits, and the external labelling system
//! decorates codes with "E2". Every catalog entry is therefore indexed
//! under all of these spellings at once, and the same derivation is used
//! for insertion and removal so the key table stays consistent.

/// Minimum length for a hex run to be treated as a candidate identifier.
///
/// Shorter hex strings are too common in ordinary payloads (counters,
/// status codes) to be worth reporting.
pub const MIN_CANDIDATE_LEN: usize = 8;

/// Prefix toggled between the reader wire form and the catalog form.
pub const PALLET_PREFIX: &str = "00";

/// Prefix prepended by the external labelling system.
pub const EXTERNAL_PREFIX: &str = "E2";

/// Returns `true` if the string is non-empty and entirely hexadecimal.
#[must_use]
pub fn is_hex(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_hexdigit())
}

/// Strips leading `'0'` characters. An all-zero identifier becomes empty,
/// matching the behavior of the integrations this table interoperates with.
#[must_use]
pub fn strip_leading_zeros(s: &str) -> &str {
    s.trim_start_matches('0')
}

/// Derives the five lookup keys under which an identifier is indexed:
///
/// 1. the canonical form as written,
/// 2. the leading-zero-stripped form,
/// 3. the "00" prefix toggled (stripped if present, prepended otherwise),
/// 4. the upper-cased form,
/// 5. the "E2"-decorated form.
///
/// Keys may coincide for some identifiers (e.g. one already upper-cased);
/// callers insert and remove the full set regardless.
#[must_use]
pub fn variant_keys(rfid: &str) -> Vec<String> {
    let mut keys = Vec::with_capacity(5);
    keys.push(rfid.to_string());
    keys.push(strip_leading_zeros(rfid).to_string());
    match rfid.strip_prefix(PALLET_PREFIX) {
        Some(rest) => keys.push(rest.to_string()),
        None => keys.push(format!("{PALLET_PREFIX}{rfid}")),
    }
    keys.push(rfid.to_uppercase());
    keys.push(format!("{EXTERNAL_PREFIX}{rfid}"));
    keys
}
