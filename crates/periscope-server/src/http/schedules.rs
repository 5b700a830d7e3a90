//! Schedule management — /api/schedules.
//!
//! Every mutation goes through the store first (it is the source of
//! truth), then adjusts the in-memory trigger directly so changes take
//! effect without waiting for the next reconciliation poll.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

use periscope_core::{Recurrence, Schedule, SchedulePatch};
use periscope_store::ScheduleStore;

use crate::app::AppState;
use crate::http::{bad_request, store_error, ApiError};

/// GET /api/schedules — every schedule, active or not.
pub async fn list_handler(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Schedule>>, ApiError> {
    let schedules = state.store.list_all().map_err(store_error)?;
    Ok(Json(schedules))
}

/// GET /api/schedules/{id}
pub async fn get_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Schedule>, ApiError> {
    let schedule = state
        .store
        .get(&id)
        .map_err(store_error)?
        .ok_or_else(|| not_found(&id))?;
    Ok(Json(schedule))
}

/// PATCH /api/schedules/{id} — partial update, returns the updated row.
pub async fn patch_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(patch): Json<SchedulePatch>,
) -> Result<Json<Schedule>, ApiError> {
    if patch.is_empty() {
        return Err(bad_request("empty patch"));
    }
    if matches!(patch.recurrence, Some(Recurrence::Immediate)) {
        return Err(bad_request("immediate queries cannot be scheduled"));
    }

    state.store.update(&id, &patch).map_err(store_error)?;
    let updated = state
        .store
        .get(&id)
        .map_err(store_error)?
        .ok_or_else(|| not_found(&id))?;

    if updated.is_active {
        if let Err(e) = state.registry.install(&updated) {
            warn!(schedule_id = %id, error = %e, "trigger reinstall failed");
        }
    } else {
        state.registry.uninstall(&id);
    }
    info!(schedule_id = %id, "schedule updated");

    Ok(Json(updated))
}

/// DELETE /api/schedules/{id}
pub async fn delete_handler(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    state.registry.uninstall(&id);
    state.store.delete(&id).map_err(store_error)?;
    info!(schedule_id = %id, "schedule deleted");
    Ok(Json(json!({"ok": true})))
}

fn not_found(id: &str) -> ApiError {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"error": format!("Schedule not found: {id}")})),
    )
}
