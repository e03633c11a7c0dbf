//! Process configuration, parsed from the command line and environment.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::bus::BusConfig;
use crate::network::{NetworkConfig, TlsConfig};
use crate::readers::ReaderConnection;

/// Bridge between RFID readers and real-time consumers.
#[derive(Debug, Parser)]
#[command(name = "tagbridge", version, about)]
pub struct Config {
    /// Bind address for the HTTP/WebSocket server.
    #[arg(long, env = "TAGBRIDGE_HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, env = "TAGBRIDGE_PORT", default_value_t = 3000)]
    pub port: u16,

    /// Broker URL, `mqtt://` or `mqtts://`.
    #[arg(
        long,
        env = "TAGBRIDGE_BROKER_URL",
        default_value = "mqtts://localhost:8883"
    )]
    pub broker_url: String,

    #[arg(long, env = "TAGBRIDGE_MQTT_USERNAME", default_value = "root")]
    pub mqtt_username: String,

    #[arg(long, env = "TAGBRIDGE_MQTT_PASSWORD", default_value = "root")]
    pub mqtt_password: String,

    #[arg(
        long,
        env = "TAGBRIDGE_MQTT_CLIENT_ID",
        default_value = "tagbridge-backend"
    )]
    pub mqtt_client_id: String,

    /// Accept self-signed certificates from the broker and the readers.
    #[arg(
        long,
        env = "TAGBRIDGE_ACCEPT_INVALID_CERTS",
        default_value_t = true,
        action = clap::ArgAction::Set
    )]
    pub accept_invalid_certs: bool,

    /// Reader definition as `id=https://host`, repeatable. Falls back to
    /// the seeded two-reader deployment when none are given.
    #[arg(long = "reader", env = "TAGBRIDGE_READERS", value_delimiter = ',')]
    pub readers: Vec<String>,

    #[arg(long, env = "TAGBRIDGE_READER_USERNAME", default_value = "root")]
    pub reader_username: String,

    #[arg(long, env = "TAGBRIDGE_READER_PASSWORD", default_value = "impinj")]
    pub reader_password: String,

    /// Digital-output lines driven as one group.
    #[arg(
        long,
        env = "TAGBRIDGE_GPO_LINES",
        value_delimiter = ',',
        default_values_t = [1, 3]
    )]
    pub gpo_lines: Vec<u8>,

    /// Fabricate records for unknown identifiers instead of rejecting them.
    #[arg(
        long,
        env = "TAGBRIDGE_PERMISSIVE",
        default_value_t = true,
        action = clap::ArgAction::Set
    )]
    pub permissive: bool,

    /// Static bearer token for the control API. Unset leaves it open.
    #[arg(long, env = "TAGBRIDGE_API_TOKEN")]
    pub api_token: Option<String>,

    /// Prometheus exporter bind address. Unset disables the exporter.
    #[arg(long, env = "TAGBRIDGE_METRICS_ADDR")]
    pub metrics_addr: Option<SocketAddr>,

    /// Emit logs as JSON lines instead of human-readable text.
    #[arg(long, env = "TAGBRIDGE_LOG_JSON", default_value_t = false)]
    pub log_json: bool,

    /// Allowed CORS origin, repeatable. `*` allows any.
    #[arg(
        long = "cors-origin",
        env = "TAGBRIDGE_CORS_ORIGINS",
        value_delimiter = ',',
        default_value = "*"
    )]
    pub cors_origins: Vec<String>,

    #[arg(long, env = "TAGBRIDGE_REQUEST_TIMEOUT_SECS", default_value_t = 30)]
    pub request_timeout_secs: u64,

    /// TLS certificate path; together with the key enables HTTPS/WSS.
    #[arg(long, env = "TAGBRIDGE_TLS_CERT", requires = "tls_key")]
    pub tls_cert: Option<PathBuf>,

    /// TLS private key path.
    #[arg(long, env = "TAGBRIDGE_TLS_KEY", requires = "tls_cert")]
    pub tls_key: Option<PathBuf>,
}

impl Config {
    /// The network section derived from this configuration.
    #[must_use]
    pub fn network_config(&self) -> NetworkConfig {
        let tls = match (&self.tls_cert, &self.tls_key) {
            (Some(cert_path), Some(key_path)) => Some(TlsConfig {
                cert_path: cert_path.clone(),
                key_path: key_path.clone(),
            }),
            _ => None,
        };
        NetworkConfig {
            host: self.host.clone(),
            port: self.port,
            tls,
            connection: Default::default(),
            cors_origins: self.cors_origins.clone(),
            request_timeout: Duration::from_secs(self.request_timeout_secs),
            api_token: self.api_token.clone(),
        }
    }

    /// The bus section derived from this configuration.
    #[must_use]
    pub fn bus_config(&self) -> BusConfig {
        BusConfig {
            broker_url: self.broker_url.clone(),
            username: self.mqtt_username.clone(),
            password: self.mqtt_password.clone(),
            client_id: self.mqtt_client_id.clone(),
            accept_invalid_certs: self.accept_invalid_certs,
        }
    }

    /// Parses `--reader id=host` definitions into registry entries.
    /// Malformed definitions are rejected rather than guessed at.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first definition without an `=`.
    pub fn reader_entries(&self) -> anyhow::Result<Vec<(String, ReaderConnection)>> {
        self.readers
            .iter()
            .map(|definition| {
                let (id, host) = definition
                    .split_once('=')
                    .ok_or_else(|| anyhow::anyhow!("invalid reader definition: {definition}"))?;
                Ok((
                    id.to_string(),
                    ReaderConnection {
                        host: host.to_string(),
                        username: self.reader_username.clone(),
                        password: self.reader_password.clone(),
                    },
                ))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Config {
        Config::try_parse_from(std::iter::once("tagbridge").chain(args.iter().copied()))
            .expect("arguments parse")
    }

    #[test]
    fn defaults_match_deployment() {
        let config = parse(&[]);
        assert_eq!(config.port, 3000);
        assert_eq!(config.broker_url, "mqtts://localhost:8883");
        assert!(config.accept_invalid_certs);
        assert!(config.permissive);
        assert_eq!(config.gpo_lines, vec![1, 3]);
        assert_eq!(config.reader_password, "impinj");
        assert!(config.readers.is_empty());
    }

    #[test]
    fn reader_definitions_parse() {
        let config = parse(&[
            "--reader",
            "dock=https://10.0.0.5",
            "--reader",
            "gate=https://10.0.0.6",
        ]);
        let entries = config.reader_entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].0, "dock");
        assert_eq!(entries[1].1.host, "https://10.0.0.6");
    }

    #[test]
    fn malformed_reader_definition_is_rejected() {
        let config = parse(&["--reader", "no-equals-sign"]);
        assert!(config.reader_entries().is_err());
    }

    #[test]
    fn boolean_flags_take_explicit_values() {
        let config = parse(&["--permissive", "false", "--accept-invalid-certs", "false"]);
        assert!(!config.permissive);
        assert!(!config.accept_invalid_certs);
    }

    #[test]
    fn tls_requires_both_paths() {
        let result = Config::try_parse_from(["tagbridge", "--tls-cert", "/tmp/cert.pem"]);
        assert!(result.is_err());
    }

    #[test]
    fn network_config_carries_token_and_timeout() {
        let config = parse(&["--api-token", "s3cret", "--request-timeout-secs", "5"]);
        let network = config.network_config();
        assert_eq!(network.api_token.as_deref(), Some("s3cret"));
        assert_eq!(network.request_timeout, Duration::from_secs(5));
    }
}
