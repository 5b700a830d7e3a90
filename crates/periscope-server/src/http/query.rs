//! Query ingress — POST /api/query.
//!
//! One endpoint for both shapes of work: `frequency: "immediate"` runs the
//! research call inline and answers with the completion, any other
//! frequency persists a schedule, installs its trigger, and answers with
//! the new schedule's id.

use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{info, warn};

use periscope_core::{QueryModel, Recurrence, Schedule};
use periscope_research::{Notifier, ResearchClient, ResearchRequest, WebhookPayload};
use periscope_store::{NewQueryResult, ScheduleStore};

use crate::app::AppState;
use crate::http::{bad_request, store_error, ApiError};

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default)]
    pub model: QueryModel,
    #[serde(flatten)]
    pub recurrence: Recurrence,
}

pub async fn query_handler(
    State(state): State<Arc<AppState>>,
    Json(req): Json<QueryRequest>,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    if req.query.trim().is_empty() {
        return Err(bad_request("query must not be empty"));
    }

    match req.recurrence {
        Recurrence::Immediate => run_immediate(&state, &req).await,
        _ => create_schedule(&state, req),
    }
}

/// Inline execution: call the model, best-effort persist the result, and
/// fire-and-forget an outcome webhook. The row and webhook never block or
/// fail the response.
async fn run_immediate(
    state: &AppState,
    req: &QueryRequest,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    info!(model = %req.model, "executing immediate query");

    let completion = state
        .research
        .complete(&ResearchRequest {
            model: req.model,
            query: req.query.clone(),
        })
        .await
        .map_err(|e| {
            warn!(error = %e, "immediate query failed");
            (
                StatusCode::BAD_GATEWAY,
                Json(json!({"error": e.to_string()})),
            )
        })?;

    let row = NewQueryResult {
        schedule_id: None,
        query: req.query.clone(),
        result: completion.text.clone(),
        model: req.model,
        citations: completion.citations.clone(),
    };
    if let Err(e) = state.store.insert_result(&row) {
        warn!(error = %e, "result insert failed — continuing");
    }

    let payload =
        WebhookPayload::immediate(&req.query, req.model, &completion.text, &completion.citations);
    let notifier = Arc::clone(&state.notifier);
    tokio::spawn(async move {
        if let Err(e) = notifier.notify(&payload).await {
            warn!(error = %e, "immediate webhook failed");
        }
    });

    Ok((
        StatusCode::OK,
        Json(json!({
            "result": completion.text,
            "citations": completion.citations,
        })),
    ))
}

/// Persist a new schedule and arm its trigger. The row is the source of
/// truth: even if the install fails, the reconciliation poll retries it.
fn create_schedule(
    state: &AppState,
    req: QueryRequest,
) -> Result<(StatusCode, Json<Value>), ApiError> {
    let schedule = Schedule::new(req.query, req.model, req.recurrence);
    state.store.insert(&schedule).map_err(store_error)?;

    if let Err(e) = state.registry.install(&schedule) {
        warn!(schedule_id = %schedule.id, error = %e, "trigger install failed");
    }
    info!(schedule_id = %schedule.id, frequency = schedule.recurrence.frequency(), "schedule created");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "scheduleId": schedule.id,
            "status": "scheduled",
        })),
    ))
}
