//! Server entrypoint: wire the services together and run until SIGINT.

use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use parking_lot::RwLock;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use tagbridge_core::catalog::{seed_catalog, TagCatalog};
use tagbridge_server::bus::{BusManager, BusSink, MqttSink};
use tagbridge_server::config::Config;
use tagbridge_server::device::{DeviceApi, GpoActuator, HttpDeviceClient, StatusPoller};
use tagbridge_server::ingest::IngestPipeline;
use tagbridge_server::network::{AppState, NetworkModule};
use tagbridge_server::publisher::EventPublisher;
use tagbridge_server::readers::ReaderRegistry;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    init_tracing(config.log_json);

    if let Some(addr) = config.metrics_addr {
        metrics_exporter_prometheus::PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()?;
        info!(%addr, "metrics exporter listening");
    }

    let mut network = NetworkModule::new(config.network_config());
    let port = network.start().await?;
    info!(port, "server starting");

    let readers = Arc::new(ReaderRegistry::new(config.reader_entries()?));
    let catalog = Arc::new(RwLock::new(TagCatalog::new(
        seed_catalog(),
        config.permissive,
    )));

    let sink = Arc::new(MqttSink::new());
    let publisher = Arc::new(EventPublisher::new(
        network.registry(),
        Arc::clone(&sink) as Arc<dyn BusSink>,
        readers.default_id(),
    ));
    let pipeline = Arc::new(IngestPipeline::new(
        Arc::clone(&catalog),
        Arc::clone(&publisher),
    ));
    let bus = Arc::new(BusManager::new(
        config.bus_config(),
        Arc::clone(&sink),
        Arc::clone(&pipeline),
        Arc::clone(&publisher),
        Arc::clone(&readers),
    ));

    let device: Arc<dyn DeviceApi> =
        Arc::new(HttpDeviceClient::new(config.accept_invalid_certs)?);
    let gpo = Arc::new(GpoActuator::new(
        Arc::clone(&device),
        Arc::clone(&readers),
        Arc::clone(&publisher),
        config.gpo_lines.clone(),
    ));
    let poller = Arc::new(StatusPoller::new(
        Arc::clone(&device),
        Arc::clone(&readers),
        Arc::clone(&publisher),
    ));

    // A broker that is down at boot is an operational condition, not a
    // startup failure; ingestion resumes on the next connect.
    if let Err(err) = bus.connect() {
        error!(%err, "bus connection failed at startup");
    }

    for reader_id in readers.ids() {
        poller.start(reader_id);
    }

    let state = AppState {
        registry: network.registry(),
        shutdown: network.shutdown_controller(),
        config: Arc::new(config.network_config()),
        catalog,
        readers: Arc::clone(&readers),
        device,
        gpo,
        poller: Arc::clone(&poller),
        bus: Arc::clone(&bus),
        pipeline,
        publisher,
        start_time: Instant::now(),
    };

    network
        .serve(state, async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                error!(%err, "failed to listen for shutdown signal");
            }
            info!("shutdown signal received");
        })
        .await?;

    poller.stop_all();
    bus.disconnect();
    info!("server stopped");
    Ok(())
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}
