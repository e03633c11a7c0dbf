//! Wire types, split by the surface that carries them.
//!
//! - [`bus`] — JSON envelopes published to the message bus.
//! - [`channel`] — named events pushed to real-time channel subscribers.
//! - [`device`] — request/response bodies of the reader device HTTP API.
//!
//! All structs serialize with the exact field names existing consumers
//! expect; envelope timestamps are ISO-8601 UTC with millisecond
//! precision.

pub mod bus;
pub mod channel;
pub mod device;

use chrono::{SecondsFormat, Utc};

/// Current time as an ISO-8601 UTC string with millisecond precision,
/// the timestamp format of every envelope and channel event.
#[must_use]
pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn now_iso_is_utc_with_millis() {
        let ts = now_iso();
        assert!(ts.ends_with('Z'), "expected UTC suffix: {ts}");
        // e.g. 2026-01-01T00:00:00.000Z
        assert_eq!(ts.len(), 24, "unexpected precision: {ts}");
    }
}
