//! Networking: configuration, channel registry, HTTP/WS surface, and
//! shutdown control.

pub mod config;
pub mod connection;
pub mod handlers;
pub mod middleware;
pub mod module;
pub mod shutdown;

pub use config::{ConnectionConfig, NetworkConfig, TlsConfig};
pub use connection::{ChannelRegistry, ConnectionHandle, ConnectionId, OutboundFrame};
pub use handlers::AppState;
pub use module::NetworkModule;
pub use shutdown::{HealthState, InFlightGuard, ShutdownController};
