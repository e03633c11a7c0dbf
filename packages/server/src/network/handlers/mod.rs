//! HTTP and WebSocket handler definitions for the `TagBridge` server.
//!
//! Defines `AppState` (the shared state carried through axum extractors),
//! the control-API error mapping, and re-exports all handler functions
//! for convenient access when building the router.

pub mod catalog;
pub mod gpos;
pub mod health;
pub mod readers;
pub mod websocket;

pub use health::{health_handler, liveness_handler, readiness_handler};
pub use websocket::ws_upgrade_handler;

use std::sync::Arc;
use std::time::Instant;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use parking_lot::RwLock;
use serde_json::json;

use tagbridge_core::catalog::{CatalogError, TagCatalog};

use crate::bus::BusManager;
use crate::device::{DeviceApi, DeviceError, GpoActuator, StatusPoller};
use crate::ingest::IngestPipeline;
use crate::publisher::EventPublisher;
use crate::readers::ReaderRegistry;

use super::{ChannelRegistry, NetworkConfig, ShutdownController};

/// Shared application state passed to all axum handlers via `State` extraction.
///
/// Holds `Arc` references to shared resources so cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    /// Registry of all active real-time channel subscribers.
    pub registry: Arc<ChannelRegistry>,
    /// Graceful shutdown controller with health state and in-flight tracking.
    pub shutdown: Arc<ShutdownController>,
    /// Network configuration (bind address, TLS, per-connection settings).
    pub config: Arc<NetworkConfig>,
    /// The resolution catalog, shared with the ingest pipeline.
    pub catalog: Arc<RwLock<TagCatalog>>,
    /// Known reader connection parameters.
    pub readers: Arc<ReaderRegistry>,
    /// Reader device HTTP API.
    pub device: Arc<dyn DeviceApi>,
    /// Digital-output actuation with timed auto-deactivation.
    pub gpo: Arc<GpoActuator>,
    /// Per-reader status polling tasks.
    pub poller: Arc<StatusPoller>,
    /// The message bus connection.
    pub bus: Arc<BusManager>,
    /// Ingest pipeline, exposed for test-read injection.
    pub pipeline: Arc<IngestPipeline>,
    /// Event fan-out to channel and bus.
    pub publisher: Arc<EventPublisher>,
    /// Server process start time, used for uptime calculation.
    pub start_time: Instant,
}

/// Control-API error, mapped onto an HTTP status and a JSON body.
#[derive(Debug)]
pub enum ApiError {
    /// A device call failed; relays the device's own status when there
    /// was one, 502 when the device never answered.
    Device(DeviceError),
    /// A catalog mutation was rejected.
    Catalog(CatalogError),
}

impl From<DeviceError> for ApiError {
    fn from(err: DeviceError) -> Self {
        Self::Device(err)
    }
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        Self::Catalog(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::Device(err) => {
                let status = err
                    .device_status()
                    .and_then(|s| StatusCode::from_u16(s).ok())
                    .unwrap_or(StatusCode::BAD_GATEWAY);
                (status, err.to_string())
            }
            Self::Catalog(err @ CatalogError::DuplicateIdentifier(_)) => {
                (StatusCode::CONFLICT, err.to_string())
            }
            Self::Catalog(err @ CatalogError::NotFound(_)) => {
                (StatusCode::NOT_FOUND, err.to_string())
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;
    use std::time::Instant;

    use parking_lot::RwLock;

    use tagbridge_core::catalog::{seed_catalog, TagCatalog};

    use crate::bus::{BusConfig, BusManager, BusSink, MqttSink, RecordingSink};
    use crate::device::{DeviceApi, GpoActuator, StatusPoller};
    use crate::ingest::IngestPipeline;
    use crate::network::{ChannelRegistry, NetworkConfig, ShutdownController};
    use crate::publisher::EventPublisher;
    use crate::readers::ReaderRegistry;

    use super::AppState;

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::{json, Value};

    use tagbridge_core::messages::device::GpoConfiguration;

    use crate::device::DeviceError;
    use crate::readers::ReaderConnection;

    /// Fake device recording every call by name.
    #[derive(Default)]
    pub(crate) struct FakeDevice {
        pub calls: Mutex<Vec<String>>,
        pub fail_status: std::sync::atomic::AtomicBool,
    }

    impl FakeDevice {
        fn record(&self, call: impl Into<String>) {
            self.calls.lock().push(call.into());
        }
    }

    #[async_trait]
    impl DeviceApi for FakeDevice {
        async fn status(&self, _conn: &ReaderConnection) -> Result<Value, DeviceError> {
            if self.fail_status.load(std::sync::atomic::Ordering::Relaxed) {
                return Err(DeviceError::Status {
                    status: 503,
                    body: "unavailable".to_string(),
                });
            }
            self.record("status");
            Ok(json!({ "status": "running" }))
        }

        async fn start_preset(
            &self,
            _conn: &ReaderConnection,
            profile: &str,
        ) -> Result<(), DeviceError> {
            self.record(format!("start_preset:{profile}"));
            Ok(())
        }

        async fn stop_preset(&self, _conn: &ReaderConnection) -> Result<(), DeviceError> {
            self.record("stop_preset");
            Ok(())
        }

        async fn mqtt_config(&self, _conn: &ReaderConnection) -> Result<Value, DeviceError> {
            self.record("mqtt_config");
            Ok(json!({ "enabled": false }))
        }

        async fn set_mqtt_config(
            &self,
            _conn: &ReaderConnection,
            _config: &Value,
        ) -> Result<(), DeviceError> {
            self.record("set_mqtt_config");
            Ok(())
        }

        async fn set_gpos(
            &self,
            _conn: &ReaderConnection,
            lines: &[GpoConfiguration],
        ) -> Result<(), DeviceError> {
            self.record(format!("set_gpos:{}", lines.len()));
            Ok(())
        }

        async fn restart(&self, _conn: &ReaderConnection) -> Result<(), DeviceError> {
            self.record("restart");
            Ok(())
        }
    }

    /// Builds an `AppState` around a fake device and a recording bus
    /// sink, returning the sink so tests can assert on publishes.
    pub(crate) fn app_state(device: Arc<dyn DeviceApi>) -> (AppState, Arc<RecordingSink>) {
        let registry = Arc::new(ChannelRegistry::new());
        let sink = Arc::new(RecordingSink::default());
        let readers = Arc::new(ReaderRegistry::seeded());
        let publisher = Arc::new(EventPublisher::new(
            Arc::clone(&registry),
            Arc::clone(&sink) as Arc<dyn BusSink>,
            readers.default_id(),
        ));
        let catalog = Arc::new(RwLock::new(TagCatalog::new(seed_catalog(), true)));
        let pipeline = Arc::new(IngestPipeline::new(
            Arc::clone(&catalog),
            Arc::clone(&publisher),
        ));
        let gpo = Arc::new(GpoActuator::new(
            Arc::clone(&device),
            Arc::clone(&readers),
            Arc::clone(&publisher),
            vec![1, 3],
        ));
        let poller = Arc::new(StatusPoller::new(
            Arc::clone(&device),
            Arc::clone(&readers),
            Arc::clone(&publisher),
        ));
        let bus = Arc::new(BusManager::new(
            BusConfig::default(),
            Arc::new(MqttSink::new()),
            Arc::clone(&pipeline),
            Arc::clone(&publisher),
            Arc::clone(&readers),
        ));
        let state = AppState {
            registry,
            shutdown: Arc::new(ShutdownController::new()),
            config: Arc::new(NetworkConfig::default()),
            catalog,
            readers,
            device,
            gpo,
            poller,
            bus,
            pipeline,
            publisher,
            start_time: Instant::now(),
        };
        (state, sink)
    }
}
