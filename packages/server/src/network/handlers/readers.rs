//! Reader control endpoints.
//!
//! Thin translations from HTTP to device calls. Every successful
//! control action also publishes an operation envelope on the bus so
//! other systems can audit what was commanded.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use tagbridge_core::messages::device::DeviceMqttConfig;

use super::{ApiError, AppState};

/// Preset started when a start request names none.
const DEFAULT_PRESET: &str = "TEST";

/// `GET /api/readers` — the configured reader identifiers.
pub async fn list_readers(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "readers": state.readers.ids() }))
}

/// `GET /api/readers/{id}/status` — one-shot device status query.
pub async fn reader_status(
    State(state): State<AppState>,
    Path(reader_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let conn = state.readers.connection(&reader_id);
    let status = state.device.status(conn).await?;
    Ok(Json(status))
}

#[derive(Debug, Deserialize, Default)]
pub struct StartRequest {
    pub profile: Option<String>,
}

/// `POST /api/readers/{id}/start` — start an inventory preset.
pub async fn start_reading(
    State(state): State<AppState>,
    Path(reader_id): Path<String>,
    body: Option<Json<StartRequest>>,
) -> Result<Json<Value>, ApiError> {
    let profile = body
        .and_then(|Json(req)| req.profile)
        .unwrap_or_else(|| DEFAULT_PRESET.to_string());
    let conn = state.readers.connection(&reader_id);
    state.device.start_preset(conn, &profile).await?;

    let mut details = Map::new();
    details.insert("profile".to_string(), Value::String(profile.clone()));
    state
        .publisher
        .operation(&reader_id, "reading_started", details);
    Ok(Json(json!({ "started": true, "profile": profile })))
}

/// `POST /api/readers/{id}/stop` — stop the running preset.
pub async fn stop_reading(
    State(state): State<AppState>,
    Path(reader_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let conn = state.readers.connection(&reader_id);
    state.device.stop_preset(conn).await?;
    state
        .publisher
        .operation(&reader_id, "reading_stopped", Map::new());
    Ok(Json(json!({ "stopped": true })))
}

/// `GET /api/readers/{id}/mqtt` — the device-side bus configuration.
pub async fn get_mqtt_config(
    State(state): State<AppState>,
    Path(reader_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let conn = state.readers.connection(&reader_id);
    let config = state.device.mqtt_config(conn).await?;
    Ok(Json(config))
}

/// `PUT /api/readers/{id}/mqtt` — replace the device-side bus
/// configuration verbatim.
pub async fn set_mqtt_config(
    State(state): State<AppState>,
    Path(reader_id): Path<String>,
    Json(config): Json<Value>,
) -> Result<StatusCode, ApiError> {
    let conn = state.readers.connection(&reader_id);
    state.device.set_mqtt_config(conn, &config).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/readers/{id}/mqtt/tags` — point the reader's tag reports
/// at the backend's own broker.
pub async fn configure_tag_reports(
    State(state): State<AppState>,
    Path(reader_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let bus = state.bus.config();
    let config = DeviceMqttConfig::tag_report(&bus.broker_url, &bus.username, &bus.password);
    let value = serde_json::to_value(&config).unwrap_or(Value::Null);
    let conn = state.readers.connection(&reader_id);
    state.device.set_mqtt_config(conn, &value).await?;
    Ok(Json(value))
}

/// `POST /api/readers/{id}/restart` — reboot the device.
pub async fn restart_reader(
    State(state): State<AppState>,
    Path(reader_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let conn = state.readers.connection(&reader_id);
    state.device.restart(conn).await?;
    state
        .publisher
        .operation(&reader_id, "reader_restarted", Map::new());
    Ok(Json(json!({ "restarting": true })))
}

/// `POST /api/readers/{id}/polling/start`.
pub async fn start_polling(
    State(state): State<AppState>,
    Path(reader_id): Path<String>,
) -> Json<Value> {
    state.poller.start(&reader_id);
    Json(json!({ "polling": true }))
}

/// `POST /api/readers/{id}/polling/stop`.
pub async fn stop_polling(
    State(state): State<AppState>,
    Path(reader_id): Path<String>,
) -> Json<Value> {
    let was_polling = state.poller.stop(&reader_id);
    Json(json!({ "polling": false, "was_polling": was_polling }))
}
