//! Digital-output actuation with timed auto-deactivation.
//!
//! Activation raises the configured lines and schedules one deactivation
//! for the whole group. A later activation for the same reader
//! supersedes the earlier timer through a generation counter: the stale
//! timer still fires but finds its generation outdated and does nothing.
//! In-flight device calls are never cancelled mid-request.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tracing::{info, warn};

use tagbridge_core::messages::device::{GpoConfiguration, GpoState};

use crate::device::client::{uniform_lines, DeviceApi, DeviceError};
use crate::publisher::EventPublisher;
use crate::readers::ReaderRegistry;

/// Deactivation delay applied when an activation names no duration.
pub const DEFAULT_GPO_DURATION: Duration = Duration::from_millis(3000);

/// Drives a reader's digital-output lines as one group.
#[derive(Clone)]
pub struct GpoActuator {
    device: Arc<dyn DeviceApi>,
    readers: Arc<ReaderRegistry>,
    publisher: Arc<EventPublisher>,
    /// Latest activation generation per reader. A scheduled deactivation
    /// only fires when its generation is still the one recorded here.
    pending: Arc<DashMap<String, u64>>,
    generations: Arc<AtomicU64>,
    lines: Vec<u8>,
}

impl GpoActuator {
    #[must_use]
    pub fn new(
        device: Arc<dyn DeviceApi>,
        readers: Arc<ReaderRegistry>,
        publisher: Arc<EventPublisher>,
        lines: Vec<u8>,
    ) -> Self {
        Self {
            device,
            readers,
            publisher,
            pending: Arc::new(DashMap::new()),
            generations: Arc::new(AtomicU64::new(0)),
            lines,
        }
    }

    /// Raises all lines and schedules one deactivation after `duration`.
    /// Supersedes any deactivation still pending for this reader.
    ///
    /// # Errors
    ///
    /// Returns the device error when the activation call fails; nothing
    /// is scheduled in that case.
    pub async fn activate(
        &self,
        reader_id: &str,
        duration: Option<Duration>,
    ) -> Result<(), DeviceError> {
        let duration = duration.unwrap_or(DEFAULT_GPO_DURATION);
        self.apply(reader_id, GpoState::High).await?;
        info!(reader_id, duration_ms = duration.as_millis() as u64, "gpo lines raised");

        let generation = self.generations.fetch_add(1, Ordering::Relaxed) + 1;
        self.pending.insert(reader_id.to_string(), generation);

        let actuator = self.clone();
        let reader_id = reader_id.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            // Atomic: a concurrent activate() must not lose its fresh
            // generation to this stale timer.
            if actuator
                .pending
                .remove_if(&reader_id, |_, g| *g == generation)
                .is_none()
            {
                return;
            }
            if let Err(err) = actuator.apply(&reader_id, GpoState::Low).await {
                warn!(reader_id, %err, "scheduled gpo deactivation failed");
                actuator
                    .publisher
                    .error(&reader_id, "gpo_control_error", &err.to_string());
            }
        });
        Ok(())
    }

    /// Lowers all lines immediately and discards any pending timer.
    /// Safe to call with nothing active.
    ///
    /// # Errors
    ///
    /// Returns the device error when the deactivation call fails.
    pub async fn deactivate(&self, reader_id: &str) -> Result<(), DeviceError> {
        self.pending.remove(reader_id);
        self.apply(reader_id, GpoState::Low).await
    }

    /// Applies an explicit per-line configuration, bypassing the group
    /// lines and the timer.
    ///
    /// # Errors
    ///
    /// Returns the device error when the call fails.
    pub async fn configure(
        &self,
        reader_id: &str,
        configurations: &[GpoConfiguration],
    ) -> Result<(), DeviceError> {
        let conn = self.readers.connection(reader_id);
        self.device.set_gpos(conn, configurations).await?;
        for line in configurations {
            self.publisher.gpo_event(reader_id, line.gpo, line.state);
        }
        Ok(())
    }

    /// Whether a deactivation is still scheduled for this reader.
    #[must_use]
    pub fn has_pending(&self, reader_id: &str) -> bool {
        self.pending.contains_key(reader_id)
    }

    async fn apply(&self, reader_id: &str, state: GpoState) -> Result<(), DeviceError> {
        let conn = self.readers.connection(reader_id);
        let lines = uniform_lines(&self.lines, state);
        self.device.set_gpos(conn, &lines).await?;
        for line in &lines {
            self.publisher.gpo_event(reader_id, line.gpo, line.state);
        }
        Ok(())
    }
}
