//! Catalog inspection and mutation endpoints, plus test-read injection.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use tagbridge_core::catalog::InventoryRecord;

use super::{ApiError, AppState};

/// `GET /api/epcs` — every catalog record with its derived keys live.
pub async fn list_records(State(state): State<AppState>) -> Json<Value> {
    let catalog = state.catalog.read();
    Json(json!({
        "count": catalog.records().len(),
        "records": catalog.records(),
    }))
}

/// `POST /api/epcs` — register a record; all key variants become
/// resolvable immediately.
pub async fn add_record(
    State(state): State<AppState>,
    Json(record): Json<InventoryRecord>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let rfid = record.rfid.clone();
    state.catalog.write().add(record)?;
    Ok((StatusCode::CREATED, Json(json!({ "added": rfid }))))
}

/// `DELETE /api/epcs/{identifier}` — remove a record by any of its
/// derived keys.
pub async fn remove_record(
    State(state): State<AppState>,
    Path(identifier): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let removed = state.catalog.write().remove(&identifier)?;
    Ok(Json(json!({ "removed": removed.rfid })))
}

#[derive(Debug, Deserialize, Default)]
pub struct TestReadQuery {
    pub reader: Option<String>,
}

/// `GET /api/test-epc` — inject a random identifier through the full
/// resolution and fan-out path.
pub async fn inject_test_read(
    State(state): State<AppState>,
    Query(query): Query<TestReadQuery>,
) -> Json<Value> {
    let reader_id = query
        .reader
        .unwrap_or_else(|| state.readers.default_id().to_string());
    let epc = state.pipeline.inject_test_read(&reader_id);
    Json(json!({ "epc": epc, "reader": reader_id }))
}
