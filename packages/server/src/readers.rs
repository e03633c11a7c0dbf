//! Static registry of reader connection parameters.
//!
//! Populated once at startup and read-only thereafter; there is no
//! dynamic reader registration. Unknown identifiers fall back to the
//! default connection with a logged warning so a misaddressed request
//! still reaches *a* reader instead of failing opaquely.

use std::collections::HashMap;

use tracing::warn;

/// Connection parameters for one physical reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderConnection {
    /// Base URL of the device, e.g. `https://172.16.100.196`.
    pub host: String,
    pub username: String,
    pub password: String,
}

/// Identifier-to-connection table plus the fallback connection.
#[derive(Debug)]
pub struct ReaderRegistry {
    /// Insertion order, kept so the first reader can serve as default.
    ids: Vec<String>,
    readers: HashMap<String, ReaderConnection>,
    default: ReaderConnection,
}

impl ReaderRegistry {
    /// Builds a registry from `(id, connection)` pairs. The first entry's
    /// connection doubles as the fallback for unknown identifiers.
    ///
    /// Falls back to the seeded deployment defaults when `entries` is
    /// empty.
    #[must_use]
    pub fn new(entries: Vec<(String, ReaderConnection)>) -> Self {
        if entries.is_empty() {
            return Self::seeded();
        }
        let default = entries[0].1.clone();
        let ids = entries.iter().map(|(id, _)| id.clone()).collect();
        let readers = entries.into_iter().collect();
        Self {
            ids,
            readers,
            default,
        }
    }

    /// The two-reader deployment default.
    #[must_use]
    pub fn seeded() -> Self {
        let credentials = ("root", "impinj");
        Self::new(vec![
            (
                "reader1".to_string(),
                ReaderConnection {
                    host: "https://172.16.100.196".to_string(),
                    username: credentials.0.to_string(),
                    password: credentials.1.to_string(),
                },
            ),
            (
                "reader2".to_string(),
                ReaderConnection {
                    host: "https://172.16.100.197".to_string(),
                    username: credentials.0.to_string(),
                    password: credentials.1.to_string(),
                },
            ),
        ])
    }

    /// The connection for a reader, or the default with a warning when
    /// the identifier is unknown.
    #[must_use]
    pub fn connection(&self, reader_id: &str) -> &ReaderConnection {
        self.readers.get(reader_id).unwrap_or_else(|| {
            warn!(reader_id, "unknown reader, using default connection");
            &self.default
        })
    }

    /// Registered identifiers in registration order.
    #[must_use]
    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    /// The identifier tag reads are attributed to when a topic carries no
    /// reader of its own.
    #[must_use]
    pub fn default_id(&self) -> &str {
        self.ids.first().map_or("reader1", String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_registry_has_two_readers() {
        let registry = ReaderRegistry::seeded();
        assert_eq!(registry.ids(), ["reader1", "reader2"]);
        assert_eq!(
            registry.connection("reader2").host,
            "https://172.16.100.197"
        );
        assert_eq!(registry.default_id(), "reader1");
    }

    #[test]
    fn unknown_reader_falls_back_to_default() {
        let registry = ReaderRegistry::seeded();
        assert_eq!(
            registry.connection("reader99"),
            registry.connection("reader1")
        );
    }

    #[test]
    fn empty_entries_fall_back_to_seeded() {
        let registry = ReaderRegistry::new(Vec::new());
        assert_eq!(registry.ids().len(), 2);
    }

    #[test]
    fn custom_entries_keep_order() {
        let conn = |host: &str| ReaderConnection {
            host: host.to_string(),
            username: "root".to_string(),
            password: "secret".to_string(),
        };
        let registry = ReaderRegistry::new(vec![
            ("dock".to_string(), conn("https://10.0.0.5")),
            ("gate".to_string(), conn("https://10.0.0.6")),
        ]);
        assert_eq!(registry.default_id(), "dock");
        assert_eq!(registry.connection("gate").host, "https://10.0.0.6");
    }
}
