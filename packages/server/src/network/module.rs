//! Network module with deferred startup lifecycle.
//!
//! Implements the deferred startup pattern: `new()` creates resources,
//! `start()` binds the TCP listener, and `serve()` starts accepting
//! connections. This separation allows the rest of the application to
//! construct the shared services (bus, pipeline, actuators) between
//! `start()` and `serve()` while already knowing the bound port.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use axum::middleware::from_fn_with_state;
use axum::routing::{delete, get, post};
use axum::Router;
use tokio::net::TcpListener;
use tracing::{info, warn};

use super::config::NetworkConfig;
use super::connection::{ChannelRegistry, OutboundFrame};
use super::handlers::{
    catalog, gpos, health_handler, liveness_handler, readers, readiness_handler,
    ws_upgrade_handler, AppState,
};
use super::middleware::{build_http_layers, require_bearer_token};
use super::shutdown::ShutdownController;

/// Manages the full HTTP/WebSocket server lifecycle.
///
/// Follows the deferred startup pattern:
/// 1. `new()` -- allocates the registry and the shutdown controller
/// 2. `start()` -- binds the TCP listener to the configured address
/// 3. `serve()` -- begins accepting connections until shutdown is signalled
///
/// The registry and shutdown controller are shared via `Arc` so the rest
/// of the application can reference them after construction.
pub struct NetworkModule {
    config: NetworkConfig,
    listener: Option<TcpListener>,
    registry: Arc<ChannelRegistry>,
    shutdown: Arc<ShutdownController>,
}

impl NetworkModule {
    /// Creates a new network module without binding any port.
    #[must_use]
    pub fn new(config: NetworkConfig) -> Self {
        Self {
            config,
            listener: None,
            registry: Arc::new(ChannelRegistry::new()),
            shutdown: Arc::new(ShutdownController::new()),
        }
    }

    /// Returns a shared reference to the channel registry.
    #[must_use]
    pub fn registry(&self) -> Arc<ChannelRegistry> {
        Arc::clone(&self.registry)
    }

    /// Returns a shared reference to the shutdown controller.
    #[must_use]
    pub fn shutdown_controller(&self) -> Arc<ShutdownController> {
        Arc::clone(&self.shutdown)
    }

    /// Assembles the axum router with all routes and middleware.
    ///
    /// The control API under `/api` sits behind the bearer-token guard;
    /// health probes and the real-time channel stay open.
    pub fn build_router(&self, state: AppState) -> Router {
        let api = Router::new()
            .route("/readers", get(readers::list_readers))
            .route("/readers/{id}/status", get(readers::reader_status))
            .route("/readers/{id}/start", post(readers::start_reading))
            .route("/readers/{id}/stop", post(readers::stop_reading))
            .route(
                "/readers/{id}/mqtt",
                get(readers::get_mqtt_config).put(readers::set_mqtt_config),
            )
            .route("/readers/{id}/mqtt/tags", post(readers::configure_tag_reports))
            .route("/readers/{id}/restart", post(readers::restart_reader))
            .route("/readers/{id}/polling/start", post(readers::start_polling))
            .route("/readers/{id}/polling/stop", post(readers::stop_polling))
            .route("/readers/{id}/gpos", post(gpos::configure_gpos))
            .route("/readers/{id}/gpos/activate", post(gpos::activate_gpos))
            .route("/readers/{id}/gpos/deactivate", post(gpos::deactivate_gpos))
            .route("/epcs", get(catalog::list_records).post(catalog::add_record))
            .route("/epcs/{identifier}", delete(catalog::remove_record))
            .route("/test-epc", get(catalog::inject_test_read))
            .route_layer(from_fn_with_state(state.clone(), require_bearer_token));

        let layers = build_http_layers(&self.config);

        Router::new()
            .route("/health", get(health_handler))
            .route("/health/live", get(liveness_handler))
            .route("/health/ready", get(readiness_handler))
            .route("/ws", get(ws_upgrade_handler))
            .nest("/api", api)
            .layer(layers)
            .with_state(state)
    }

    /// Binds the TCP listener to the configured host and port.
    ///
    /// Returns the actual bound port, which may differ from the configured
    /// port when port 0 is used (OS-assigned ephemeral port).
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound (e.g., port in use).
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        let port = listener.local_addr()?.port();

        info!("TCP listener bound to {}:{}", self.config.host, port);

        self.listener = Some(listener);
        Ok(port)
    }

    /// Starts serving connections until the shutdown signal fires.
    ///
    /// After the shutdown signal:
    /// 1. Health state transitions to Draining
    /// 2. All channel subscribers receive a Close frame
    /// 3. Waits up to 30 seconds for in-flight requests to complete
    /// 4. Health state transitions to Stopped
    ///
    /// # Errors
    ///
    /// Returns an error if the server encounters a fatal I/O error, or if
    /// `start()` was not called first.
    pub async fn serve(
        mut self,
        state: AppState,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let Some(listener) = self.listener.take() else {
            anyhow::bail!("start() must be called before serve()");
        };
        let registry = Arc::clone(&self.registry);
        let shutdown_ctrl = Arc::clone(&self.shutdown);
        let router = self.build_router(state);

        // Transition to Ready so readiness probes pass.
        shutdown_ctrl.set_ready();

        if let Some(ref tls_config) = self.config.tls {
            serve_tls(listener, router, tls_config, registry, shutdown_ctrl, shutdown).await
        } else {
            serve_plain(listener, router, registry, shutdown_ctrl, shutdown).await
        }
    }
}

/// Serves plain HTTP/WS connections using axum's built-in server.
async fn serve_plain(
    listener: TcpListener,
    router: Router,
    registry: Arc<ChannelRegistry>,
    shutdown_ctrl: Arc<ShutdownController>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    info!("Serving plain HTTP/WS connections");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;

    drain_subscribers(registry, shutdown_ctrl).await;
    Ok(())
}

/// Serves TLS connections using `axum-server` with rustls.
///
/// Reuses the pre-bound TCP listener by converting it to a `std::net::TcpListener`.
async fn serve_tls(
    listener: TcpListener,
    router: Router,
    tls_config: &super::config::TlsConfig,
    registry: Arc<ChannelRegistry>,
    shutdown_ctrl: Arc<ShutdownController>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    use axum_server::tls_rustls::RustlsConfig;

    let rustls_config = RustlsConfig::from_pem_file(&tls_config.cert_path, &tls_config.key_path)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to load TLS certificates: {e}"))?;

    let addr = listener.local_addr()?;
    let std_listener = listener.into_std()?;
    let handle = axum_server::Handle::new();
    let shutdown_handle = handle.clone();

    // Spawn a task that waits for the shutdown signal and triggers graceful
    // shutdown on the axum-server handle.
    tokio::spawn(async move {
        shutdown.await;
        shutdown_handle.graceful_shutdown(None);
    });

    info!("Serving TLS connections on {}", addr);

    axum_server::from_tcp_rustls(std_listener, rustls_config)
        .handle(handle)
        .serve(router.into_make_service())
        .await?;

    drain_subscribers(registry, shutdown_ctrl).await;
    Ok(())
}

/// Drains all channel subscribers and transitions to Stopped state.
///
/// Sends a Close frame to every active subscriber, then waits for
/// in-flight requests to complete (up to 30 seconds).
async fn drain_subscribers(registry: Arc<ChannelRegistry>, shutdown_ctrl: Arc<ShutdownController>) {
    shutdown_ctrl.trigger_shutdown();

    let handles = registry.drain_all();
    let count = handles.len();
    if count > 0 {
        info!("Draining {} channel subscribers", count);
        for handle in &handles {
            let _ = handle.try_send(OutboundFrame::Close(Some(
                "server shutting down".to_string(),
            )));
        }
    }

    let drained = shutdown_ctrl.wait_for_drain(Duration::from_secs(30)).await;
    if drained {
        info!("All subscribers drained successfully");
    } else {
        warn!("Drain timeout expired with in-flight requests remaining");
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::super::handlers::testing::{app_state, FakeDevice};
    use super::*;
    use crate::device::DeviceApi;

    #[test]
    fn new_creates_module_without_binding() {
        let module = NetworkModule::new(NetworkConfig::default());
        assert!(module.listener.is_none());
    }

    #[test]
    fn registry_returns_shared_arc() {
        let module = NetworkModule::new(NetworkConfig::default());
        let r1 = module.registry();
        let r2 = module.registry();
        assert!(Arc::ptr_eq(&r1, &r2));
    }

    #[test]
    fn shutdown_controller_returns_shared_arc() {
        let module = NetworkModule::new(NetworkConfig::default());
        let s1 = module.shutdown_controller();
        let s2 = module.shutdown_controller();
        assert!(Arc::ptr_eq(&s1, &s2));
    }

    #[tokio::test]
    async fn build_router_creates_router() {
        let module = NetworkModule::new(NetworkConfig::default());
        let device: Arc<dyn DeviceApi> = Arc::new(FakeDevice::default());
        let (state, _sink) = app_state(device);
        let _router = module.build_router(state);
    }

    #[tokio::test]
    async fn start_binds_to_os_assigned_port() {
        let mut module = NetworkModule::new(NetworkConfig::default());
        let port = module.start().await.expect("start should succeed");
        assert!(port > 0, "OS-assigned port should be > 0");
        assert!(module.listener.is_some());
    }

    #[tokio::test]
    async fn serve_fails_without_start() {
        let module = NetworkModule::new(NetworkConfig::default());
        let device: Arc<dyn DeviceApi> = Arc::new(FakeDevice::default());
        let (state, _sink) = app_state(device);
        let result = module.serve(state, std::future::pending::<()>()).await;
        assert!(result.is_err());
    }
}
