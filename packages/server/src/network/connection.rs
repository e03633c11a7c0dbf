//! Real-time channel connection registry.
//!
//! Each WebSocket subscriber gets a bounded mpsc queue for outbound
//! frames; the registry tracks all live subscribers in a `DashMap` so
//! broadcasts never take a global lock. Broadcasting uses non-blocking
//! `try_send`: a slow consumer loses frames rather than stalling the
//! ingest path.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use metrics::counter;
use tokio::sync::mpsc;
use tracing::trace;

use super::config::ConnectionConfig;

/// Unique identifier for a channel subscriber, assigned by the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(pub u64);

/// Frame to be sent outbound to a subscriber.
#[derive(Debug, Clone)]
pub enum OutboundFrame {
    /// A JSON text frame (`{"event": .., "data": ..}`).
    Text(String),
    /// A close frame with an optional reason.
    Close(Option<String>),
}

/// Handle to one subscriber: the sender end of its outbound queue.
#[derive(Debug)]
pub struct ConnectionHandle {
    pub id: ConnectionId,
    pub tx: mpsc::Sender<OutboundFrame>,
    pub connected_at: Instant,
}

impl ConnectionHandle {
    /// Attempts to enqueue a frame without blocking. Returns `false`
    /// when the queue is full or the subscriber is gone.
    #[must_use]
    pub fn try_send(&self, frame: OutboundFrame) -> bool {
        self.tx.try_send(frame).is_ok()
    }

    /// `false` once the write loop has dropped the receiver.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        !self.tx.is_closed()
    }
}

/// Thread-safe registry of all live channel subscribers.
#[derive(Debug)]
pub struct ChannelRegistry {
    connections: DashMap<ConnectionId, Arc<ConnectionHandle>>,
    next_id: AtomicU64,
}

impl ChannelRegistry {
    /// Creates an empty registry. Connection IDs start at 1.
    #[must_use]
    pub fn new() -> Self {
        Self {
            connections: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Registers a subscriber, returning its handle and the receiver the
    /// socket write loop drains.
    pub fn register(
        &self,
        config: &ConnectionConfig,
    ) -> (Arc<ConnectionHandle>, mpsc::Receiver<OutboundFrame>) {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(config.outbound_channel_capacity);
        let handle = Arc::new(ConnectionHandle {
            id,
            tx,
            connected_at: Instant::now(),
        });
        self.connections.insert(id, Arc::clone(&handle));
        (handle, rx)
    }

    /// Removes a subscriber, returning its handle if it was present.
    pub fn remove(&self, id: ConnectionId) -> Option<Arc<ConnectionHandle>> {
        self.connections.remove(&id).map(|(_, handle)| handle)
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn count(&self) -> usize {
        self.connections.len()
    }

    /// Sends a text frame to every subscriber. Full queues are skipped
    /// and counted; emission never blocks the caller.
    pub fn broadcast_text(&self, text: &str) {
        for entry in &self.connections {
            let handle = entry.value();
            if !handle.try_send(OutboundFrame::Text(text.to_string())) {
                trace!(connection = handle.id.0, "dropping frame for slow subscriber");
                counter!("tagbridge_channel_dropped_frames_total").increment(1);
            }
        }
    }

    /// Removes and returns all subscribers. Used during shutdown.
    pub fn drain_all(&self) -> Vec<Arc<ConnectionHandle>> {
        let keys: Vec<ConnectionId> = self.connections.iter().map(|e| *e.key()).collect();
        let mut handles = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some((_, handle)) = self.connections.remove(&key) {
                handles.push(handle);
            }
        }
        handles
    }
}

impl Default for ChannelRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> ConnectionConfig {
        ConnectionConfig {
            outbound_channel_capacity: 2,
        }
    }

    #[test]
    fn register_and_count() {
        let registry = ChannelRegistry::new();
        assert_eq!(registry.count(), 0);

        let (h1, _rx1) = registry.register(&ConnectionConfig::default());
        assert_eq!(h1.id, ConnectionId(1));
        assert_eq!(registry.count(), 1);

        let (h2, _rx2) = registry.register(&ConnectionConfig::default());
        assert_eq!(h2.id, ConnectionId(2));
        assert_eq!(registry.count(), 2);
    }

    #[test]
    fn remove_is_idempotent() {
        let registry = ChannelRegistry::new();
        let (handle, _rx) = registry.register(&ConnectionConfig::default());
        assert!(registry.remove(handle.id).is_some());
        assert!(registry.remove(handle.id).is_none());
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn broadcast_reaches_all_subscribers() {
        let registry = ChannelRegistry::new();
        let (_h1, mut rx1) = registry.register(&ConnectionConfig::default());
        let (_h2, mut rx2) = registry.register(&ConnectionConfig::default());

        registry.broadcast_text("{\"event\":\"x\"}");

        assert!(matches!(rx1.try_recv(), Ok(OutboundFrame::Text(_))));
        assert!(matches!(rx2.try_recv(), Ok(OutboundFrame::Text(_))));
    }

    #[test]
    fn broadcast_skips_full_queues() {
        let registry = ChannelRegistry::new();
        let (handle, _rx) = registry.register(&small_config());

        assert!(handle.try_send(OutboundFrame::Text("a".into())));
        assert!(handle.try_send(OutboundFrame::Text("b".into())));

        // Queue is full; broadcast must not block or panic.
        registry.broadcast_text("c");
    }

    #[test]
    fn try_send_fails_after_receiver_drop() {
        let registry = ChannelRegistry::new();
        let (handle, rx) = registry.register(&ConnectionConfig::default());
        drop(rx);
        assert!(!handle.try_send(OutboundFrame::Text("x".into())));
        assert!(!handle.is_connected());
    }

    #[test]
    fn drain_all_empties_registry() {
        let registry = ChannelRegistry::new();
        let (_h1, _rx1) = registry.register(&ConnectionConfig::default());
        let (_h2, _rx2) = registry.register(&ConnectionConfig::default());

        let drained = registry.drain_all();
        assert_eq!(drained.len(), 2);
        assert_eq!(registry.count(), 0);
    }
}
