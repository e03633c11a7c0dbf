//! Message bus connection management.
//!
//! One outbound connection, owned by [`BusManager`]. `connect()` tears
//! down any prior event-loop task, opens a new connection, and on the
//! broker's acknowledgment subscribes the fixed topic set and announces
//! the backend. Inbound publishes are dispatched synchronously to the
//! ingest pipeline.
//!
//! There is deliberately no reconnect loop: a transport error ends the
//! event-loop task and the connection stays down until an external
//! `connect()`. No reconnect policy (backoff, retry limit) is defined
//! for this deployment.

use std::sync::Arc;
use std::time::Duration;

use metrics::counter;
use parking_lot::{Mutex, RwLock};
use rumqttc::{AsyncClient, Event, MqttOptions, Packet, QoS, TlsConfiguration, Transport};
use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::DigitallySignedStruct;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{error, info, warn};

use tagbridge_core::topic::subscription_set;

use crate::ingest::IngestPipeline;
use crate::publisher::EventPublisher;
use crate::readers::ReaderRegistry;

/// Outbound bus publishing seam. Production publishes through the live
/// MQTT client; tests record.
pub trait BusSink: Send + Sync {
    /// Enqueues a publish without blocking. Returns `false` when the bus
    /// is not connected or the request queue is full.
    fn try_publish(&self, bus_topic: &str, payload: Vec<u8>) -> bool;
}

/// Live sink over the MQTT client. The client slot is empty until the
/// manager connects and is cleared again on teardown, so publishes
/// before/after a connection are dropped, not queued.
#[derive(Default)]
pub struct MqttSink {
    client: RwLock<Option<AsyncClient>>,
}

impl MqttSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_client(&self, client: AsyncClient) {
        *self.client.write() = Some(client);
    }

    pub fn clear(&self) {
        *self.client.write() = None;
    }

    /// Whether a live connection currently backs this sink.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.client.read().is_some()
    }
}

impl BusSink for MqttSink {
    fn try_publish(&self, bus_topic: &str, payload: Vec<u8>) -> bool {
        let guard = self.client.read();
        match guard.as_ref() {
            Some(client) => client
                .try_publish(bus_topic, QoS::AtMostOnce, false, payload)
                .is_ok(),
            None => false,
        }
    }
}

/// Test sink that records every publish.
#[derive(Default)]
pub struct RecordingSink {
    published: Mutex<Vec<(String, Vec<u8>)>>,
}

impl RecordingSink {
    /// Everything published so far, in order.
    #[must_use]
    pub fn published(&self) -> Vec<(String, Vec<u8>)> {
        self.published.lock().clone()
    }
}

impl BusSink for RecordingSink {
    fn try_publish(&self, bus_topic: &str, payload: Vec<u8>) -> bool {
        self.published.lock().push((bus_topic.to_string(), payload));
        true
    }
}

/// Broker connection parameters.
#[derive(Debug, Clone)]
pub struct BusConfig {
    /// `mqtt://host[:port]` or `mqtts://host[:port]`.
    pub broker_url: String,
    pub username: String,
    pub password: String,
    pub client_id: String,
    /// Accept the broker's certificate without verification, matching
    /// the relaxed setting of the deployed brokers.
    pub accept_invalid_certs: bool,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            broker_url: "mqtts://localhost:8883".to_string(),
            username: "root".to_string(),
            password: "root".to_string(),
            client_id: "tagbridge-backend".to_string(),
            accept_invalid_certs: true,
        }
    }
}

/// Bus connection failures.
#[derive(Debug, Error)]
pub enum BusError {
    #[error("invalid broker url: {0}")]
    InvalidBrokerUrl(String),
}

/// Splits a broker URL into `(host, port, tls)`.
///
/// # Errors
///
/// Returns [`BusError::InvalidBrokerUrl`] for unknown schemes, empty
/// hosts, or unparseable ports.
pub fn parse_broker_url(url: &str) -> Result<(String, u16, bool), BusError> {
    let invalid = || BusError::InvalidBrokerUrl(url.to_string());
    let (tls, rest) = match url.split_once("://") {
        Some(("mqtts" | "ssl", rest)) => (true, rest),
        Some(("mqtt" | "tcp", rest)) => (false, rest),
        Some(_) => return Err(invalid()),
        None => (false, url),
    };
    let default_port = if tls { 8883 } else { 1883 };
    let (host, port) = match rest.rsplit_once(':') {
        Some((host, port)) => (host, port.parse::<u16>().map_err(|_| invalid())?),
        None => (rest, default_port),
    };
    if host.is_empty() {
        return Err(invalid());
    }
    Ok((host.to_string(), port, tls))
}

/// Builds the broker TLS configuration.
///
/// The deployed brokers present self-signed certificates, so the relaxed
/// mode installs a verifier that accepts any server chain. Strict mode
/// uses the platform connector with system roots.
fn tls_configuration(accept_invalid_certs: bool) -> TlsConfiguration {
    if !accept_invalid_certs {
        return TlsConfiguration::Native;
    }
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let config = rustls::ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert(provider)))
        .with_no_client_auth();
    TlsConfiguration::Rustls(Arc::new(config))
}

/// Verifier that accepts any server certificate. Only installed when
/// `accept_invalid_certs` is set; signatures are still checked.
#[derive(Debug)]
struct AcceptAnyServerCert(Arc<rustls::crypto::CryptoProvider>);

impl ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls12_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn verify_tls13_signature(
        &self,
        message: &[u8],
        cert: &CertificateDer<'_>,
        dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        rustls::crypto::verify_tls13_signature(
            message,
            cert,
            dss,
            &self.0.signature_verification_algorithms,
        )
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        self.0.signature_verification_algorithms.supported_schemes()
    }
}

/// Owns the single bus connection and its event-loop task.
pub struct BusManager {
    config: BusConfig,
    sink: Arc<MqttSink>,
    pipeline: Arc<IngestPipeline>,
    publisher: Arc<EventPublisher>,
    readers: Arc<ReaderRegistry>,
    stop: Mutex<Option<watch::Sender<bool>>>,
}

impl BusManager {
    #[must_use]
    pub fn new(
        config: BusConfig,
        sink: Arc<MqttSink>,
        pipeline: Arc<IngestPipeline>,
        publisher: Arc<EventPublisher>,
        readers: Arc<ReaderRegistry>,
    ) -> Self {
        Self {
            config,
            sink,
            pipeline,
            publisher,
            readers,
            stop: Mutex::new(None),
        }
    }

    /// Whether the event-loop task currently holds a live connection.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.sink.is_connected()
    }

    /// The connection parameters this manager was built with.
    #[must_use]
    pub fn config(&self) -> &BusConfig {
        &self.config
    }

    /// Tears down any prior connection and opens a new one, spawning the
    /// event-loop task that subscribes and dispatches inbound messages.
    ///
    /// # Errors
    ///
    /// Returns a [`BusError`] when the broker URL is invalid. Transport
    /// failures after this point are logged by the event-loop task, not
    /// returned.
    pub fn connect(&self) -> Result<(), BusError> {
        if let Some(prev) = self.stop.lock().take() {
            let _ = prev.send(true);
        }

        let (host, port, tls) = parse_broker_url(&self.config.broker_url)?;
        let mut options = MqttOptions::new(&self.config.client_id, host, port);
        options.set_credentials(&self.config.username, &self.config.password);
        options.set_keep_alive(Duration::from_secs(30));
        if tls {
            options.set_transport(Transport::Tls(tls_configuration(
                self.config.accept_invalid_certs,
            )));
        }

        let (client, event_loop) = AsyncClient::new(options, 64);
        self.sink.set_client(client.clone());

        let (stop_tx, stop_rx) = watch::channel(false);
        *self.stop.lock() = Some(stop_tx);

        tokio::spawn(run_event_loop(
            client,
            event_loop,
            stop_rx,
            Arc::clone(&self.sink),
            Arc::clone(&self.pipeline),
            Arc::clone(&self.publisher),
            Arc::clone(&self.readers),
            self.config.client_id.clone(),
        ));
        Ok(())
    }

    /// Announces the backend as gone and stops the event-loop task.
    pub fn disconnect(&self) {
        for reader_id in self.readers.ids() {
            self.publisher
                .backend_status(reader_id, "disconnected", &self.config.client_id);
        }
        if let Some(stop) = self.stop.lock().take() {
            let _ = stop.send(true);
        }
        self.sink.clear();
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_event_loop(
    client: AsyncClient,
    mut event_loop: rumqttc::EventLoop,
    mut stop_rx: watch::Receiver<bool>,
    sink: Arc<MqttSink>,
    pipeline: Arc<IngestPipeline>,
    publisher: Arc<EventPublisher>,
    readers: Arc<ReaderRegistry>,
    backend_id: String,
) {
    loop {
        tokio::select! {
            _ = stop_rx.changed() => {
                info!("bus event loop stopping");
                break;
            }
            event = event_loop.poll() => match event {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    info!("bus connected, subscribing topic set");
                    let ids = readers.ids().iter().map(String::as_str);
                    for bus_topic in subscription_set(ids) {
                        if let Err(err) = client.subscribe(&bus_topic, QoS::AtMostOnce).await {
                            warn!(topic = %bus_topic, %err, "subscribe failed");
                        }
                    }
                    for reader_id in readers.ids() {
                        publisher.backend_status(reader_id, "connected", &backend_id);
                    }
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    counter!("tagbridge_bus_inbound_messages_total").increment(1);
                    pipeline.process(&publish.topic, &publish.payload);
                }
                Ok(_) => {}
                Err(err) => {
                    // Terminal: the connection stays down until an
                    // external connect().
                    error!(%err, "bus transport error, connection is down");
                    counter!("tagbridge_bus_transport_errors_total").increment(1);
                    sink.clear();
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_tls_url_with_port() {
        let (host, port, tls) = parse_broker_url("mqtts://broker.example.com:8883").unwrap();
        assert_eq!(host, "broker.example.com");
        assert_eq!(port, 8883);
        assert!(tls);
    }

    #[test]
    fn parse_plain_url_default_port() {
        let (host, port, tls) = parse_broker_url("mqtt://localhost").unwrap();
        assert_eq!(host, "localhost");
        assert_eq!(port, 1883);
        assert!(!tls);
    }

    #[test]
    fn parse_tls_url_default_port() {
        let (_, port, tls) = parse_broker_url("mqtts://broker").unwrap();
        assert_eq!(port, 8883);
        assert!(tls);
    }

    #[test]
    fn parse_bare_host_port() {
        let (host, port, tls) = parse_broker_url("10.0.0.9:1884").unwrap();
        assert_eq!(host, "10.0.0.9");
        assert_eq!(port, 1884);
        assert!(!tls);
    }

    #[test]
    fn parse_rejects_unknown_scheme_and_bad_port() {
        assert!(parse_broker_url("http://broker").is_err());
        assert!(parse_broker_url("mqtt://broker:notaport").is_err());
        assert!(parse_broker_url("mqtt://").is_err());
    }

    #[test]
    fn relaxed_tls_installs_custom_verifier() {
        assert!(matches!(
            tls_configuration(true),
            TlsConfiguration::Rustls(_)
        ));
    }

    #[test]
    fn strict_tls_uses_platform_roots() {
        assert!(matches!(tls_configuration(false), TlsConfiguration::Native));
    }

    #[test]
    fn sink_without_client_drops_publishes() {
        let sink = MqttSink::new();
        assert!(!sink.is_connected());
        assert!(!sink.try_publish("t", vec![1, 2, 3]));
    }

    #[test]
    fn recording_sink_keeps_order() {
        let sink = RecordingSink::default();
        assert!(sink.try_publish("a", vec![1]));
        assert!(sink.try_publish("b", vec![2]));
        let published = sink.published();
        assert_eq!(published[0].0, "a");
        assert_eq!(published[1].0, "b");
    }
}
