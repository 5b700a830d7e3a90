use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};

use periscope_core::config::PeriscopeConfig;
use periscope_research::{Notifier, ResearchClient};
use periscope_scheduler::JobRegistry;
use periscope_store::ScheduleStore;

/// Central shared state — passed as Arc<AppState> to all Axum handlers.
pub struct AppState {
    pub config: PeriscopeConfig,
    pub store: Arc<dyn ScheduleStore>,
    pub research: Arc<dyn ResearchClient>,
    pub notifier: Arc<dyn Notifier>,
    pub registry: Arc<JobRegistry>,
}

/// Assemble the full Axum router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(crate::http::health::health_handler))
        .route("/api/query", post(crate::http::query::query_handler))
        .route("/api/schedules", get(crate::http::schedules::list_handler))
        .route(
            "/api/schedules/{id}",
            get(crate::http::schedules::get_handler)
                .patch(crate::http::schedules::patch_handler)
                .delete(crate::http::schedules::delete_handler),
        )
        .route("/api/results", get(crate::http::results::list_handler))
        .with_state(state)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}
