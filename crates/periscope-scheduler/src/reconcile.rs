//! Keeps the in-memory trigger set consistent with the persisted one.
//!
//! The store is the source of truth: on startup and whenever a row's
//! `updated_at` moves past the last poll, the whole registry is torn down
//! and rebuilt from the active set. Rebuilds are cheap (a handful of timer
//! tasks) and sidestep per-row diffing entirely.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tracing::{error, info, warn};

use periscope_core::SchedulePatch;
use periscope_store::ScheduleStore;

use crate::executor::ErrorHandler;
use crate::registry::JobRegistry;

pub struct Reconciler {
    registry: Arc<JobRegistry>,
    store: Arc<dyn ScheduleStore>,
}

impl Reconciler {
    pub fn new(registry: Arc<JobRegistry>, store: Arc<dyn ScheduleStore>) -> Self {
        Self { registry, store }
    }

    /// Rebuild the registry from the persisted active set.
    ///
    /// Stops every existing trigger first, then installs each active
    /// schedule with an error handler that records failures back onto its
    /// row. A schedule that fails to install is logged and skipped; it
    /// never aborts the rest of the set. Returns the number installed.
    pub fn initialize_schedules(&self) -> usize {
        let schedules = match self.store.list_active() {
            Ok(s) => s,
            Err(e) => {
                error!(error = %e, "failed to load active schedules");
                return 0;
            }
        };
        info!(count = schedules.len(), "loading active schedules");

        self.registry.uninstall_all();

        let mut installed = 0;
        for schedule in schedules {
            let store = Arc::clone(&self.store);
            let id = schedule.id.clone();
            let handler: ErrorHandler = Arc::new(move |err| {
                let patch = SchedulePatch {
                    last_error: Some(err.to_string()),
                    last_error_time: Some(Utc::now()),
                    ..Default::default()
                };
                if let Err(e) = store.update(&id, &patch) {
                    error!(schedule_id = %id, error = %e, "failed to record error state");
                }
            });
            self.registry.on_error(&schedule.id, handler);

            match self.registry.install(&schedule) {
                Ok(()) => {
                    info!(schedule_id = %schedule.id, "schedule installed");
                    installed += 1;
                }
                Err(e) => {
                    error!(schedule_id = %schedule.id, error = %e, "failed to install schedule")
                }
            }
        }
        installed
    }

    /// Poll the store for rows whose `updated_at` moved past the last
    /// check and reinitialize when any did. `last_check` only advances
    /// after a successful poll, so rows changed during an outage are
    /// picked up by the next one that succeeds. Runs until `shutdown`
    /// flips to `true`.
    pub async fn watch_for_changes(
        &self,
        poll_interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let mut last_check = Utc::now();
        let mut ticker = tokio::time::interval(poll_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // interval's first tick completes immediately
        ticker.tick().await;

        info!(
            interval_secs = poll_interval.as_secs(),
            "watching for schedule changes"
        );
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let changed = match self.store.list_updated_since(last_check) {
                        Ok(c) => c,
                        Err(e) => {
                            warn!(error = %e, "schedule change poll failed");
                            continue;
                        }
                    };
                    if !changed.is_empty() {
                        info!(count = changed.len(), "schedule changes detected, reinitializing");
                        self.initialize_schedules();
                    }
                    last_check = Utc::now();
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        info!("change watcher shutting down");
                        return;
                    }
                }
            }
        }
    }
}
