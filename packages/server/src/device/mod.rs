//! Reader device control: HTTP client, GPO actuation, status polling.

pub mod client;
pub mod gpo;
pub mod poller;

pub use client::{uniform_lines, DeviceApi, DeviceError, HttpDeviceClient, DEVICE_TIMEOUT};
pub use gpo::{GpoActuator, DEFAULT_GPO_DURATION};
pub use poller::{StatusPoller, POLL_PERIOD};
