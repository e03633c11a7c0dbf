//! Digital-output control endpoints.

use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use tagbridge_core::messages::device::GpoConfigRequest;

use super::{ApiError, AppState};

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ActivateRequest {
    /// Deactivation delay; the actuator default applies when omitted.
    pub duration_ms: Option<u64>,
}

/// `POST /api/readers/{id}/gpos` — explicit per-line configuration.
pub async fn configure_gpos(
    State(state): State<AppState>,
    Path(reader_id): Path<String>,
    Json(request): Json<GpoConfigRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .gpo
        .configure(&reader_id, &request.gpo_configurations)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/readers/{id}/gpos/activate` — raise the group lines with
/// timed auto-deactivation.
pub async fn activate_gpos(
    State(state): State<AppState>,
    Path(reader_id): Path<String>,
    body: Option<Json<ActivateRequest>>,
) -> Result<Json<Value>, ApiError> {
    let duration = body
        .and_then(|Json(req)| req.duration_ms)
        .map(Duration::from_millis);
    state.gpo.activate(&reader_id, duration).await?;
    Ok(Json(json!({ "active": true })))
}

/// `POST /api/readers/{id}/gpos/deactivate` — lower the group lines now.
pub async fn deactivate_gpos(
    State(state): State<AppState>,
    Path(reader_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state.gpo.deactivate(&reader_id).await?;
    Ok(Json(json!({ "active": false })))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::super::testing::{app_state, FakeDevice};
    use super::*;
    use crate::device::DeviceApi;
    use tagbridge_core::messages::device::{GpoConfiguration, GpoState};

    fn fixture() -> (AppState, Arc<FakeDevice>) {
        let device = Arc::new(FakeDevice::default());
        let (state, _sink) = app_state(Arc::clone(&device) as Arc<dyn DeviceApi>);
        (state, device)
    }

    #[tokio::test]
    async fn activate_schedules_deactivation() {
        let (state, device) = fixture();

        let response = activate_gpos(
            State(state.clone()),
            Path("reader1".to_string()),
            Some(Json(ActivateRequest {
                duration_ms: Some(5000),
            })),
        )
        .await
        .unwrap();
        assert_eq!(response.0["active"], true);
        assert!(state.gpo.has_pending("reader1"));
        assert_eq!(device.calls.lock()[0], "set_gpos:2");
    }

    #[tokio::test]
    async fn deactivate_without_activation_succeeds() {
        let (state, device) = fixture();

        let response = deactivate_gpos(State(state), Path("reader1".to_string()))
            .await
            .unwrap();
        assert_eq!(response.0["active"], false);
        assert_eq!(device.calls.lock().len(), 1);
    }

    #[tokio::test]
    async fn configure_passes_explicit_lines() {
        let (state, device) = fixture();

        let status = configure_gpos(
            State(state),
            Path("reader1".to_string()),
            Json(GpoConfigRequest {
                gpo_configurations: vec![GpoConfiguration {
                    gpo: 2,
                    state: GpoState::High,
                }],
            }),
        )
        .await
        .unwrap();
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(device.calls.lock()[0], "set_gpos:1");
    }
}
