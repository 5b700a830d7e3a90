use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use periscope_core::{Schedule, SchedulePatch, ScheduleStatus};
use periscope_store::ScheduleStore;

use crate::error::Result;
use crate::executor::{execute, ErrorHandler, ExecutionContext};
use crate::trigger::{next_run_time, trigger_spec};

struct JobHandle {
    timer: JoinHandle<()>,
}

/// In-memory map from schedule identifier to its active timer task.
///
/// Mutations are mutex-serialised: triggers fire on independent tasks
/// while the reconciliation loop may concurrently rebuild the whole set.
/// Constructed once at process start and torn down with
/// [`JobRegistry::uninstall_all`] on shutdown.
pub struct JobRegistry {
    ctx: Arc<ExecutionContext>,
    jobs: Mutex<HashMap<String, JobHandle>>,
    handlers: Arc<Mutex<HashMap<String, ErrorHandler>>>,
}

impl JobRegistry {
    pub fn new(ctx: ExecutionContext) -> Self {
        Self {
            ctx: Arc::new(ctx),
            jobs: Mutex::new(HashMap::new()),
            handlers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Install (or replace) the trigger for a schedule.
    ///
    /// Idempotent: any existing trigger for the same identifier is stopped
    /// first, so there is never more than one active trigger per schedule.
    /// The timer closes over the schedule's *current* field values — an
    /// externally mutated schedule needs a re-install to take effect.
    /// Inactive schedules are skipped (logged, no error).
    pub fn install(&self, schedule: &Schedule) -> Result<()> {
        self.uninstall(&schedule.id);

        if !schedule.is_active {
            info!(schedule_id = %schedule.id, "schedule is not active, skipping");
            return Ok(());
        }

        let spec = trigger_spec(&schedule.recurrence)?;
        info!(
            schedule_id = %schedule.id,
            hour = spec.hour,
            minute = spec.minute,
            day_of_week = ?spec.day_of_week,
            "installing trigger"
        );

        // Arm bookkeeping: back to `scheduled` with a fresh next_run.
        // Best-effort — a failed write leaves the trigger armed anyway.
        match next_run_time(&schedule.recurrence, Utc::now()) {
            Ok(next) => {
                let patch = SchedulePatch {
                    status: Some(ScheduleStatus::Scheduled),
                    next_run: Some(next),
                    ..Default::default()
                };
                if let Err(e) = self.ctx.store.update(&schedule.id, &patch) {
                    warn!(schedule_id = %schedule.id, error = %e, "failed to set initial schedule status");
                }
            }
            Err(e) => {
                warn!(schedule_id = %schedule.id, error = %e, "next-run computation failed at install")
            }
        }

        let ctx = Arc::clone(&self.ctx);
        let handlers = Arc::clone(&self.handlers);
        let id = schedule.id.clone();
        let schedule = schedule.clone();
        let timer = tokio::spawn(async move {
            loop {
                let now = Utc::now();
                let fire_at = spec.next_fire(now);
                let wait = (fire_at - now).to_std().unwrap_or_default();
                tokio::time::sleep(wait).await;

                let handler = handlers.lock().unwrap().get(&schedule.id).cloned();
                let ctx = Arc::clone(&ctx);
                let schedule = schedule.clone();
                // Detached: uninstall cancels future firings, never an
                // execution already in flight.
                tokio::spawn(async move {
                    execute(&ctx, &schedule, handler).await;
                });
            }
        });

        self.jobs.lock().unwrap().insert(id, JobHandle { timer });
        Ok(())
    }

    /// Stop and remove the trigger for `id`, along with its error handler.
    /// No-op on an unknown identifier.
    pub fn uninstall(&self, id: &str) {
        if let Some(handle) = self.jobs.lock().unwrap().remove(id) {
            handle.timer.abort();
            self.handlers.lock().unwrap().remove(id);
            info!(schedule_id = %id, "trigger stopped and removed");
        }
    }

    /// Tear down every trigger. Used at shutdown and before each
    /// reconciliation rebuild so no duplicate triggers survive.
    pub fn uninstall_all(&self) {
        let ids: Vec<String> = self.jobs.lock().unwrap().keys().cloned().collect();
        if !ids.is_empty() {
            info!(count = ids.len(), "stopping all schedules");
        }
        for id in ids {
            self.uninstall(&id);
        }
    }

    /// Register the error callback for a schedule. Looked up at firing
    /// time, so registration before or after `install` both work.
    pub fn on_error(&self, id: &str, handler: ErrorHandler) {
        self.handlers.lock().unwrap().insert(id.to_string(), handler);
    }

    pub fn error_handler(&self, id: &str) -> Option<ErrorHandler> {
        self.handlers.lock().unwrap().get(id).cloned()
    }

    /// Number of schedules with an active trigger.
    pub fn active_count(&self) -> usize {
        self.jobs.lock().unwrap().len()
    }
}
