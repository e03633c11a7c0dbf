//! Periodic reader status polling.
//!
//! One task per polled reader, keyed in a `DashMap` by identifier.
//! Starting a reader that is already polled replaces its task; each task
//! queries the device on a fixed period and republishes the result.
//! Query failures are published as status errors and never stop the
//! loop — an unreachable reader keeps being polled until told to stop.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::device::client::DeviceApi;
use crate::publisher::EventPublisher;
use crate::readers::ReaderRegistry;

/// Fixed period between status queries.
pub const POLL_PERIOD: Duration = Duration::from_millis(3000);

/// Manages the per-reader polling tasks.
pub struct StatusPoller {
    device: Arc<dyn DeviceApi>,
    readers: Arc<ReaderRegistry>,
    publisher: Arc<EventPublisher>,
    period: Duration,
    tasks: DashMap<String, watch::Sender<bool>>,
}

impl StatusPoller {
    #[must_use]
    pub fn new(
        device: Arc<dyn DeviceApi>,
        readers: Arc<ReaderRegistry>,
        publisher: Arc<EventPublisher>,
    ) -> Self {
        Self::with_period(device, readers, publisher, POLL_PERIOD)
    }

    /// Poller with a custom period. Used by tests to shrink wall time.
    #[must_use]
    pub fn with_period(
        device: Arc<dyn DeviceApi>,
        readers: Arc<ReaderRegistry>,
        publisher: Arc<EventPublisher>,
        period: Duration,
    ) -> Self {
        Self {
            device,
            readers,
            publisher,
            period,
            tasks: DashMap::new(),
        }
    }

    /// Starts polling a reader, replacing any existing task for it.
    /// The first query fires immediately, not after one period.
    pub fn start(&self, reader_id: &str) {
        // Stop the old task before its replacement exists.
        if let Some((_, previous)) = self.tasks.remove(reader_id) {
            let _ = previous.send(true);
        }
        let (stop_tx, stop_rx) = watch::channel(false);
        self.tasks.insert(reader_id.to_string(), stop_tx);
        info!(reader_id, period_ms = self.period.as_millis() as u64, "status polling started");

        let device = Arc::clone(&self.device);
        let conn = self.readers.connection(reader_id).clone();
        let publisher = Arc::clone(&self.publisher);
        let reader_id = reader_id.to_string();
        let period = self.period;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            let mut stop_rx = stop_rx;
            loop {
                tokio::select! {
                    _ = stop_rx.changed() => {
                        debug!(reader_id, "status polling task stopping");
                        break;
                    }
                    _ = ticker.tick() => match device.status(&conn).await {
                        Ok(status) => publisher.reader_status(&reader_id, status),
                        Err(err) => {
                            warn!(reader_id, %err, "status query failed");
                            publisher.status_error(&reader_id, &err.to_string());
                        }
                    }
                }
            }
        });
    }

    /// Stops polling a reader. Returns `false` when it was not polled.
    pub fn stop(&self, reader_id: &str) -> bool {
        match self.tasks.remove(reader_id) {
            Some((_, stop_tx)) => {
                let _ = stop_tx.send(true);
                info!(reader_id, "status polling stopped");
                true
            }
            None => false,
        }
    }

    /// Stops every polling task. Used during shutdown.
    pub fn stop_all(&self) {
        let ids: Vec<String> = self.tasks.iter().map(|e| e.key().clone()).collect();
        for reader_id in ids {
            self.stop(&reader_id);
        }
    }

    /// Whether a polling task is registered for this reader.
    #[must_use]
    pub fn is_polling(&self, reader_id: &str) -> bool {
        self.tasks.contains_key(reader_id)
    }
}
