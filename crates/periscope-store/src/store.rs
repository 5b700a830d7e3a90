use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use periscope_core::{QueryModel, QueryResult, Schedule, SchedulePatch};

use crate::error::Result;

/// Insert payload for the append-only `query_results` table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewQueryResult {
    /// Owning schedule, `None` for immediate queries.
    pub schedule_id: Option<String>,
    pub query: String,
    pub result: String,
    pub model: QueryModel,
    pub citations: Vec<String>,
}

/// The persisted-store contract the scheduler core works against.
///
/// Each call is atomic on its own; there are no cross-call transactions.
/// Implementations must be shareable across timer tasks and the
/// reconciliation loop (`Send + Sync`).
pub trait ScheduleStore: Send + Sync {
    /// All schedules with `is_active = true`.
    fn list_active(&self) -> Result<Vec<Schedule>>;

    /// Every schedule, active or not, ordered by creation time.
    fn list_all(&self) -> Result<Vec<Schedule>>;

    fn get(&self, id: &str) -> Result<Option<Schedule>>;

    fn insert(&self, schedule: &Schedule) -> Result<()>;

    /// Apply a partial update. Bumps `updated_at` so the reconciliation
    /// poll notices the change. Returns `NotFound` when no row matches.
    fn update(&self, id: &str, patch: &SchedulePatch) -> Result<()>;

    /// Delete a schedule row. Returns `NotFound` when no row matches.
    fn delete(&self, id: &str) -> Result<()>;

    /// Schedules whose `updated_at` is strictly after `since` — the
    /// change-detection query driving reconciliation.
    fn list_updated_since(&self, since: DateTime<Utc>) -> Result<Vec<Schedule>>;

    /// Append one executed-query record. Returns the new row id.
    fn insert_result(&self, result: &NewQueryResult) -> Result<i64>;

    /// Most recent results, newest first.
    fn list_results(&self, limit: u32) -> Result<Vec<QueryResult>>;
}
