//! Reader device HTTP API client.
//!
//! Readers expose a REST API under `https://{host}/api/v1` with basic
//! credentials and self-signed certificates. Calls carry a fixed 5 s
//! network timeout; a timed-out or failed call is surfaced to the caller
//! and never retried here — a failing device call means the reader is
//! unreachable and the operator needs to know.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use serde_json::Value;
use thiserror::Error;

use tagbridge_core::messages::device::{GpoConfigRequest, GpoConfiguration, GpoState};

use crate::readers::ReaderConnection;

/// Fixed network timeout for device calls.
pub const DEVICE_TIMEOUT: Duration = Duration::from_millis(5000);

/// A device command that did not complete.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The device answered with a non-success status; the body is kept
    /// so callers can relay the device's own diagnostics.
    #[error("device returned {status}: {body}")]
    Status { status: u16, body: String },
    /// The call never produced a device response (connect failure,
    /// timeout, TLS error).
    #[error("device transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl DeviceError {
    /// The device's own HTTP status, when one was received.
    #[must_use]
    pub fn device_status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Transport(_) => None,
        }
    }
}

/// The device API surface, behind a trait so actuation and polling can be
/// tested against a fake device.
#[async_trait]
pub trait DeviceApi: Send + Sync {
    /// `GET status`.
    async fn status(&self, conn: &ReaderConnection) -> Result<Value, DeviceError>;

    /// `POST profiles/inventory/presets/{profile}/start`.
    async fn start_preset(
        &self,
        conn: &ReaderConnection,
        profile: &str,
    ) -> Result<(), DeviceError>;

    /// `POST profiles/stop`.
    async fn stop_preset(&self, conn: &ReaderConnection) -> Result<(), DeviceError>;

    /// `GET mqtt` — the device-side bus configuration.
    async fn mqtt_config(&self, conn: &ReaderConnection) -> Result<Value, DeviceError>;

    /// `PUT mqtt` — replace the device-side bus configuration.
    async fn set_mqtt_config(
        &self,
        conn: &ReaderConnection,
        config: &Value,
    ) -> Result<(), DeviceError>;

    /// `PUT device/gpos` — set digital-output line states.
    async fn set_gpos(
        &self,
        conn: &ReaderConnection,
        lines: &[GpoConfiguration],
    ) -> Result<(), DeviceError>;

    /// `POST device/restart`.
    async fn restart(&self, conn: &ReaderConnection) -> Result<(), DeviceError>;
}

/// Production client over reqwest.
#[derive(Debug, Clone)]
pub struct HttpDeviceClient {
    http: reqwest::Client,
}

impl HttpDeviceClient {
    /// Builds the client. `accept_invalid_certs` matches the relaxed
    /// verification the deployed readers require (self-signed certs).
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying TLS backend cannot be
    /// initialized.
    pub fn new(accept_invalid_certs: bool) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(accept_invalid_certs)
            .timeout(DEVICE_TIMEOUT)
            .build()?;
        Ok(Self { http })
    }

    async fn send(
        &self,
        conn: &ReaderConnection,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, DeviceError> {
        let url = format!("{}/api/v1/{path}", conn.host);
        let mut request = self
            .http
            .request(method, &url)
            .basic_auth(&conn.username, Some(&conn.password));
        if let Some(body) = body {
            request = request.json(body);
        }
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DeviceError::Status {
                status: status.as_u16(),
                body,
            });
        }
        if status == StatusCode::NO_CONTENT {
            return Ok(Value::Null);
        }
        // Some commands answer with an empty body on success.
        let text = response.text().await?;
        if text.is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_str(&text).unwrap_or(Value::String(text)))
    }
}

#[async_trait]
impl DeviceApi for HttpDeviceClient {
    async fn status(&self, conn: &ReaderConnection) -> Result<Value, DeviceError> {
        self.send(conn, Method::GET, "status", None).await
    }

    async fn start_preset(
        &self,
        conn: &ReaderConnection,
        profile: &str,
    ) -> Result<(), DeviceError> {
        let path = format!("profiles/inventory/presets/{profile}/start");
        self.send(conn, Method::POST, &path, None).await.map(|_| ())
    }

    async fn stop_preset(&self, conn: &ReaderConnection) -> Result<(), DeviceError> {
        self.send(conn, Method::POST, "profiles/stop", None)
            .await
            .map(|_| ())
    }

    async fn mqtt_config(&self, conn: &ReaderConnection) -> Result<Value, DeviceError> {
        self.send(conn, Method::GET, "mqtt", None).await
    }

    async fn set_mqtt_config(
        &self,
        conn: &ReaderConnection,
        config: &Value,
    ) -> Result<(), DeviceError> {
        self.send(conn, Method::PUT, "mqtt", Some(config))
            .await
            .map(|_| ())
    }

    async fn set_gpos(
        &self,
        conn: &ReaderConnection,
        lines: &[GpoConfiguration],
    ) -> Result<(), DeviceError> {
        let body = serde_json::to_value(GpoConfigRequest {
            gpo_configurations: lines.to_vec(),
        })
        .expect("gpo request serialization is infallible");
        self.send(conn, Method::PUT, "device/gpos", Some(&body))
            .await
            .map(|_| ())
    }

    async fn restart(&self, conn: &ReaderConnection) -> Result<(), DeviceError> {
        self.send(conn, Method::POST, "device/restart", None)
            .await
            .map(|_| ())
    }
}

/// Convenience for building uniform line assignments.
#[must_use]
pub fn uniform_lines(lines: &[u8], state: GpoState) -> Vec<GpoConfiguration> {
    GpoConfigRequest::uniform(lines, state).gpo_configurations
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_error_exposes_status() {
        let err = DeviceError::Status {
            status: 409,
            body: "preset already running".to_string(),
        };
        assert_eq!(err.device_status(), Some(409));
        assert!(err.to_string().contains("409"));
    }

    #[test]
    fn client_builds_with_relaxed_tls() {
        assert!(HttpDeviceClient::new(true).is_ok());
        assert!(HttpDeviceClient::new(false).is_ok());
    }

    #[test]
    fn uniform_lines_assign_one_state() {
        let lines = uniform_lines(&[1, 3], GpoState::Low);
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|l| l.state == GpoState::Low));
    }
}
