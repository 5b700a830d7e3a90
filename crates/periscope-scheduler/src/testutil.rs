//! In-memory fakes for the executor's collaborators.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use periscope_core::{QueryResult, Schedule, SchedulePatch};
use periscope_research::{
    Completion, Notifier, NotifyError, ResearchClient, ResearchError, ResearchRequest,
    WebhookPayload,
};
use periscope_store::{NewQueryResult, ScheduleStore, StoreError};

#[derive(Default)]
pub struct MockStore {
    schedules: Mutex<HashMap<String, Schedule>>,
    results: Mutex<Vec<NewQueryResult>>,
    fail_insert_result: AtomicBool,
    fail_next_update: AtomicBool,
}

impl MockStore {
    pub fn seed(&self, schedule: Schedule) {
        self.schedules
            .lock()
            .unwrap()
            .insert(schedule.id.clone(), schedule);
    }

    pub fn results(&self) -> Vec<NewQueryResult> {
        self.results.lock().unwrap().clone()
    }

    /// Every result insert fails from now on.
    pub fn fail_insert_result(&self) {
        self.fail_insert_result.store(true, Ordering::SeqCst);
    }

    /// Only the next update call fails.
    pub fn fail_next_update(&self) {
        self.fail_next_update.store(true, Ordering::SeqCst);
    }

    fn apply(schedule: &mut Schedule, patch: &SchedulePatch) {
        if let Some(ref q) = patch.query {
            schedule.query = q.clone();
        }
        if let Some(model) = patch.model {
            schedule.model = model;
        }
        if let Some(ref r) = patch.recurrence {
            schedule.recurrence = r.clone();
        }
        if let Some(active) = patch.is_active {
            schedule.is_active = active;
        }
        if let Some(status) = patch.status {
            schedule.status = status;
        }
        if let Some(t) = patch.last_run {
            schedule.last_run = Some(t);
        }
        if let Some(t) = patch.next_run {
            schedule.next_run = Some(t);
        }
        if let Some(ref r) = patch.last_result {
            schedule.last_result = Some(r.clone());
        }
        if let Some(ref e) = patch.last_error {
            schedule.last_error = Some(e.clone());
        }
        if let Some(t) = patch.last_error_time {
            schedule.last_error_time = Some(t);
        }
        schedule.updated_at = Utc::now();
    }
}

impl ScheduleStore for MockStore {
    fn list_active(&self) -> Result<Vec<Schedule>, StoreError> {
        let mut active: Vec<Schedule> = self
            .schedules
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.is_active)
            .cloned()
            .collect();
        active.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(active)
    }

    fn list_all(&self) -> Result<Vec<Schedule>, StoreError> {
        Ok(self.schedules.lock().unwrap().values().cloned().collect())
    }

    fn get(&self, id: &str) -> Result<Option<Schedule>, StoreError> {
        Ok(self.schedules.lock().unwrap().get(id).cloned())
    }

    fn insert(&self, schedule: &Schedule) -> Result<(), StoreError> {
        self.seed(schedule.clone());
        Ok(())
    }

    fn update(&self, id: &str, patch: &SchedulePatch) -> Result<(), StoreError> {
        if self.fail_next_update.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected update failure".into()));
        }
        let mut schedules = self.schedules.lock().unwrap();
        let schedule = schedules
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })?;
        Self::apply(schedule, patch);
        Ok(())
    }

    fn delete(&self, id: &str) -> Result<(), StoreError> {
        self.schedules
            .lock()
            .unwrap()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound { id: id.to_string() })
    }

    fn list_updated_since(&self, since: DateTime<Utc>) -> Result<Vec<Schedule>, StoreError> {
        Ok(self
            .schedules
            .lock()
            .unwrap()
            .values()
            .filter(|s| s.updated_at > since)
            .cloned()
            .collect())
    }

    fn insert_result(&self, result: &NewQueryResult) -> Result<i64, StoreError> {
        if self.fail_insert_result.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected insert failure".into()));
        }
        let mut results = self.results.lock().unwrap();
        results.push(result.clone());
        Ok(results.len() as i64)
    }

    fn list_results(&self, limit: u32) -> Result<Vec<QueryResult>, StoreError> {
        Ok(self
            .results
            .lock()
            .unwrap()
            .iter()
            .rev()
            .take(limit as usize)
            .enumerate()
            .map(|(i, r)| QueryResult {
                id: i as i64,
                schedule_id: r.schedule_id.clone(),
                query: r.query.clone(),
                result: r.result.clone(),
                model: r.model,
                citations: r.citations.clone(),
                created_at: Utc::now(),
            })
            .collect())
    }
}

/// Per-query scripted behavior for the fake research backend.
#[derive(Clone)]
pub enum MockBehavior {
    Ok {
        text: String,
        citations: Vec<String>,
    },
    Fail,
    /// Sleep, then fail — models a remote call hitting its timeout.
    FailSlow {
        delay_ms: u64,
    },
}

pub struct MockResearch {
    default: MockBehavior,
    per_query: Mutex<HashMap<String, MockBehavior>>,
}

impl MockResearch {
    pub fn ok(text: &str, citations: &[&str]) -> Self {
        Self {
            default: MockBehavior::Ok {
                text: text.to_string(),
                citations: citations.iter().map(|c| c.to_string()).collect(),
            },
            per_query: Mutex::new(HashMap::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            default: MockBehavior::Fail,
            per_query: Mutex::new(HashMap::new()),
        }
    }

    pub fn set(&self, query: &str, behavior: MockBehavior) {
        self.per_query
            .lock()
            .unwrap()
            .insert(query.to_string(), behavior);
    }
}

#[async_trait]
impl ResearchClient for MockResearch {
    fn name(&self) -> &str {
        "mock"
    }

    async fn complete(&self, req: &ResearchRequest) -> Result<Completion, ResearchError> {
        let behavior = self
            .per_query
            .lock()
            .unwrap()
            .get(&req.query)
            .cloned()
            .unwrap_or_else(|| self.default.clone());

        match behavior {
            MockBehavior::Ok { text, citations } => Ok(Completion { text, citations }),
            MockBehavior::Fail => Err(ResearchError::Timeout { ms: 8000 }),
            MockBehavior::FailSlow { delay_ms } => {
                tokio::time::sleep(std::time::Duration::from_millis(delay_ms)).await;
                Err(ResearchError::Timeout { ms: delay_ms })
            }
        }
    }
}

#[derive(Default)]
pub struct MockNotifier {
    sent: Mutex<Vec<WebhookPayload>>,
    fail: bool,
}

impl MockNotifier {
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<WebhookPayload> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn notify(&self, payload: &WebhookPayload) -> Result<(), NotifyError> {
        self.sent.lock().unwrap().push(payload.clone());
        if self.fail {
            return Err(NotifyError::Status(502));
        }
        Ok(())
    }
}
