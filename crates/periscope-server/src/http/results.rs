use axum::{
    extract::{Query, State},
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use periscope_core::QueryResult;
use periscope_store::ScheduleStore;

use crate::app::AppState;
use crate::http::{store_error, ApiError};

const DEFAULT_LIMIT: u32 = 50;
const MAX_LIMIT: u32 = 500;

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub limit: Option<u32>,
}

/// GET /api/results?limit=N — newest first.
pub async fn list_handler(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<QueryResult>>, ApiError> {
    let limit = params.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT);
    let results = state.store.list_results(limit).map_err(store_error)?;
    Ok(Json(results))
}
