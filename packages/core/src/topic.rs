//! Bus topic construction, parsing, and the fixed subscription set.
//!
//! Structured topics follow `readers/{id}/{suffix}`. A set of flat legacy
//! patterns is retained because deployed readers still publish on them.

/// Per-reader topic families.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopicKind {
    Status,
    Inventory,
    Gpos,
    Operations,
    Errors,
}

impl TopicKind {
    #[must_use]
    fn suffix(self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::Inventory => "inventory",
            Self::Gpos => "gpos/events",
            Self::Operations => "operations",
            Self::Errors => "errors",
        }
    }
}

/// Legacy flat subscription patterns kept for backward compatibility.
pub const LEGACY_SUBSCRIPTIONS: [&str; 5] =
    ["tags/#", "inventory/#", "tag/#", "impinj/#", "reader/#"];

/// Global wildcard, subscribed for debugging so no read is ever missed.
pub const DEBUG_WILDCARD: &str = "#";

/// Builds the structured topic for a reader and topic family.
#[must_use]
pub fn reader_topic(kind: TopicKind, reader_id: &str) -> String {
    format!("readers/{reader_id}/{}", kind.suffix())
}

/// Wildcard covering every topic of one reader.
#[must_use]
pub fn reader_wildcard(reader_id: &str) -> String {
    format!("readers/{reader_id}/#")
}

/// Extracts the reader identifier from a structured topic, if any.
#[must_use]
pub fn reader_id_from_topic(topic: &str) -> Option<&str> {
    let mut parts = topic.splitn(3, '/');
    match (parts.next(), parts.next()) {
        (Some("readers"), Some(id)) if !id.is_empty() => Some(id),
        _ => None,
    }
}

/// Topic hint for the tag-read fast path. An optimization and a routing
/// signal for the `tag_data` channel event, not a correctness gate.
#[must_use]
pub fn is_tag_topic(topic: &str) -> bool {
    topic.contains("tag") || topic.contains("inventory")
}

/// The full subscription set: per-reader wildcards, the legacy flat
/// patterns, and the debug wildcard.
#[must_use]
pub fn subscription_set<'a, I>(reader_ids: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut topics: Vec<String> = reader_ids.into_iter().map(reader_wildcard).collect();
    topics.extend(LEGACY_SUBSCRIPTIONS.iter().map(ToString::to_string));
    topics.push(DEBUG_WILDCARD.to_string());
    topics
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reader_topic_forms() {
        assert_eq!(
            reader_topic(TopicKind::Status, "reader1"),
            "readers/reader1/status"
        );
        assert_eq!(
            reader_topic(TopicKind::Gpos, "reader2"),
            "readers/reader2/gpos/events"
        );
        assert_eq!(
            reader_topic(TopicKind::Errors, "reader1"),
            "readers/reader1/errors"
        );
    }

    #[test]
    fn reader_id_parses_from_structured_topics() {
        assert_eq!(
            reader_id_from_topic("readers/reader2/inventory"),
            Some("reader2")
        );
        assert_eq!(
            reader_id_from_topic("readers/r9/gpos/events"),
            Some("r9")
        );
    }

    #[test]
    fn reader_id_absent_for_flat_topics() {
        assert_eq!(reader_id_from_topic("impinj/tag"), None);
        assert_eq!(reader_id_from_topic("readers/"), None);
        assert_eq!(reader_id_from_topic("tags/x"), None);
    }

    #[test]
    fn tag_topic_hint() {
        assert!(is_tag_topic("impinj/tag"));
        assert!(is_tag_topic("readers/reader1/inventory"));
        assert!(!is_tag_topic("readers/reader1/status"));
    }

    #[test]
    fn subscription_set_covers_readers_legacy_and_debug() {
        let topics = subscription_set(["reader1", "reader2"]);
        assert!(topics.contains(&"readers/reader1/#".to_string()));
        assert!(topics.contains(&"readers/reader2/#".to_string()));
        for legacy in LEGACY_SUBSCRIPTIONS {
            assert!(topics.contains(&legacy.to_string()), "missing {legacy}");
        }
        assert_eq!(topics.last().map(String::as_str), Some(DEBUG_WILDCARD));
        assert_eq!(topics.len(), 2 + LEGACY_SUBSCRIPTIONS.len() + 1);
    }
}
