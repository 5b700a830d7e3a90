pub mod health;
pub mod query;
pub mod results;
pub mod schedules;

use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

use periscope_store::StoreError;

pub(crate) type ApiError = (StatusCode, Json<Value>);

/// Map a store error onto an HTTP response: missing rows are the client's
/// problem, everything else is ours.
pub(crate) fn store_error(e: StoreError) -> ApiError {
    let status = match e {
        StoreError::NotFound { .. } => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, Json(json!({"error": e.to_string()})))
}

pub(crate) fn bad_request(message: &str) -> ApiError {
    (StatusCode::BAD_REQUEST, Json(json!({"error": message})))
}
