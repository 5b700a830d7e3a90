use std::sync::Arc;

use chrono::Utc;
use tracing::{error, info, warn};

use periscope_core::{Schedule, SchedulePatch, ScheduleStatus};
use periscope_research::{
    Completion, Notifier, ResearchClient, ResearchRequest, WebhookPayload,
};
use periscope_store::{NewQueryResult, ScheduleStore};

use crate::error::SchedulerError;
use crate::trigger::next_run_time;

/// Per-schedule error callback, invoked once per failed execution.
pub type ErrorHandler = Arc<dyn Fn(&SchedulerError) + Send + Sync>;

/// The collaborators one execution needs. Shared across all timer tasks.
pub struct ExecutionContext {
    pub store: Arc<dyn ScheduleStore>,
    pub research: Arc<dyn ResearchClient>,
    pub notifier: Arc<dyn Notifier>,
}

/// Run one trigger firing for `schedule`.
///
/// Sequence, with isolated failure handling at each step:
/// 1. mark `processing` — best-effort, a failed write never blocks the
///    query itself;
/// 2. remote completion call — any failure jumps to the error path;
/// 3. persist the QueryResult — failure is logged, the flow continues;
/// 4. recompute `next_run`, mark `completed`, fire-and-forget a success
///    webhook.
///
/// The error path marks the schedule `error`, invokes the registered
/// handler exactly once, and attempts a best-effort error webhook.
/// Errors never propagate to the caller — one schedule's failure must not
/// stop other schedules' timers.
pub async fn execute(ctx: &ExecutionContext, schedule: &Schedule, handler: Option<ErrorHandler>) {
    info!(schedule_id = %schedule.id, "executing scheduled query");

    // 1. Mark processing. A failed status write is bookkeeping only.
    let processing = SchedulePatch {
        status: Some(ScheduleStatus::Processing),
        ..Default::default()
    };
    if let Err(e) = ctx.store.update(&schedule.id, &processing) {
        warn!(schedule_id = %schedule.id, error = %e, "processing-status write failed — continuing");
    }

    // 2. The remote call.
    let completion = match ctx
        .research
        .complete(&ResearchRequest {
            model: schedule.model,
            query: schedule.query.clone(),
        })
        .await
    {
        Ok(c) => c,
        Err(e) => {
            fail(ctx, schedule, handler, SchedulerError::RemoteCallFailed(e)).await;
            return;
        }
    };

    // 3. Persist the result row. The user-visible success of the remote
    // call is not reverted when this write fails.
    let row = NewQueryResult {
        schedule_id: Some(schedule.id.clone()),
        query: schedule.query.clone(),
        result: completion.text.clone(),
        model: schedule.model,
        citations: completion.citations.clone(),
    };
    if let Err(e) = ctx.store.insert_result(&row) {
        warn!(schedule_id = %schedule.id, error = %e, "result insert failed — continuing");
    }

    // 4. Re-arm: recompute next_run and mark completed.
    let next_run = match next_run_time(&schedule.recurrence, Utc::now()) {
        Ok(t) => t,
        Err(e) => {
            fail(ctx, schedule, handler, e).await;
            return;
        }
    };
    let completed = SchedulePatch {
        status: Some(ScheduleStatus::Completed),
        last_run: Some(Utc::now()),
        next_run: Some(next_run),
        last_result: Some(completion.text.clone()),
        ..Default::default()
    };
    if let Err(e) = ctx.store.update(&schedule.id, &completed) {
        fail(
            ctx,
            schedule,
            handler,
            SchedulerError::PersistenceFailed(e),
        )
        .await;
        return;
    }

    info!(schedule_id = %schedule.id, next_run = %next_run, "scheduled query completed");
    notify_success(ctx, schedule, &completion);
}

/// Fire-and-forget success webhook: detached task, own timeout, failure
/// observable only in logs.
fn notify_success(ctx: &ExecutionContext, schedule: &Schedule, completion: &Completion) {
    let payload = WebhookPayload::success(schedule, &completion.text, &completion.citations);
    let notifier = Arc::clone(&ctx.notifier);
    let schedule_id = schedule.id.clone();
    tokio::spawn(async move {
        if let Err(e) = notifier.notify(&payload).await {
            warn!(%schedule_id, error = %e, "success webhook failed");
        }
    });
}

/// Error path: record the failure, invoke the handler, best-effort error
/// webhook. Every step swallows its own errors.
async fn fail(
    ctx: &ExecutionContext,
    schedule: &Schedule,
    handler: Option<ErrorHandler>,
    err: SchedulerError,
) {
    error!(schedule_id = %schedule.id, error = %err, "scheduled query failed");

    let patch = SchedulePatch {
        status: Some(ScheduleStatus::Error),
        last_error: Some(err.to_string()),
        last_error_time: Some(Utc::now()),
        ..Default::default()
    };
    if let Err(e) = ctx.store.update(&schedule.id, &patch) {
        error!(schedule_id = %schedule.id, error = %e, "failed to record error state");
    }

    if let Some(handler) = handler {
        handler(&err);
    }

    let payload = WebhookPayload::failure(schedule, &err.to_string());
    if let Err(e) = ctx.notifier.notify(&payload).await {
        warn!(schedule_id = %schedule.id, error = %e, "error webhook failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use periscope_core::{QueryModel, Recurrence, TimeOfDay};

    use crate::testutil::{MockNotifier, MockResearch, MockStore};

    fn daily_schedule() -> Schedule {
        Schedule::new(
            "latest robotics research",
            QueryModel::Sonar,
            Recurrence::Daily {
                time: TimeOfDay { hour: 9, minute: 0 },
            },
        )
    }

    fn ctx(store: Arc<MockStore>, research: Arc<MockResearch>, notifier: Arc<MockNotifier>) -> ExecutionContext {
        ExecutionContext {
            store,
            research,
            notifier,
        }
    }

    #[tokio::test]
    async fn success_path_completes_and_persists_result() {
        let store = Arc::new(MockStore::default());
        let research = Arc::new(MockResearch::ok("findings", &["https://example.com/x"]));
        let notifier = Arc::new(MockNotifier::default());
        let schedule = daily_schedule();
        store.seed(schedule.clone());

        execute(
            &ctx(store.clone(), research, notifier.clone()),
            &schedule,
            None,
        )
        .await;

        let updated = store.get(&schedule.id).unwrap().unwrap();
        assert_eq!(updated.status, ScheduleStatus::Completed);
        assert_eq!(updated.last_result.as_deref(), Some("findings"));
        assert!(updated.next_run.unwrap() > Utc::now());
        assert!(updated.last_run.is_some());

        let results = store.results();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].schedule_id.as_deref(), Some(schedule.id.as_str()));
        assert_eq!(results[0].citations, vec!["https://example.com/x"]);

        // Success webhook is detached — give it a moment to land.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].result.as_deref(), Some("findings"));
    }

    #[tokio::test]
    async fn remote_failure_marks_error_and_invokes_handler_once() {
        let store = Arc::new(MockStore::default());
        let research = Arc::new(MockResearch::failing());
        let notifier = Arc::new(MockNotifier::default());
        let schedule = daily_schedule();
        store.seed(schedule.clone());

        let calls = Arc::new(AtomicUsize::new(0));
        let calls_in_handler = Arc::clone(&calls);
        let handler: ErrorHandler = Arc::new(move |err| {
            assert!(matches!(err, SchedulerError::RemoteCallFailed(_)));
            calls_in_handler.fetch_add(1, Ordering::SeqCst);
        });

        execute(
            &ctx(store.clone(), research, notifier.clone()),
            &schedule,
            Some(handler),
        )
        .await;

        let updated = store.get(&schedule.id).unwrap().unwrap();
        assert_eq!(updated.status, ScheduleStatus::Error);
        assert!(updated.last_error.is_some());
        assert!(updated.last_error_time.is_some());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // No result row for a failed call.
        assert!(store.results().is_empty());

        // Error webhook was attempted with status=error.
        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].error.is_some());
    }

    #[tokio::test]
    async fn result_insert_failure_still_completes() {
        let store = Arc::new(MockStore::default());
        store.fail_insert_result();
        let research = Arc::new(MockResearch::ok("findings", &[]));
        let schedule = daily_schedule();
        store.seed(schedule.clone());

        execute(
            &ctx(store.clone(), research, Arc::new(MockNotifier::default())),
            &schedule,
            None,
        )
        .await;

        let updated = store.get(&schedule.id).unwrap().unwrap();
        assert_eq!(updated.status, ScheduleStatus::Completed);
        assert!(updated.next_run.is_some());
        assert!(store.results().is_empty());
    }

    #[tokio::test]
    async fn processing_write_failure_does_not_block_execution() {
        let store = Arc::new(MockStore::default());
        store.fail_next_update();
        let research = Arc::new(MockResearch::ok("findings", &[]));
        let schedule = daily_schedule();
        store.seed(schedule.clone());

        execute(
            &ctx(store.clone(), research, Arc::new(MockNotifier::default())),
            &schedule,
            None,
        )
        .await;

        // The processing write failed, but the query still ran and the
        // completed write (second update) went through.
        let updated = store.get(&schedule.id).unwrap().unwrap();
        assert_eq!(updated.status, ScheduleStatus::Completed);
        assert_eq!(store.results().len(), 1);
    }

    #[tokio::test]
    async fn one_schedule_failing_does_not_disturb_another() {
        let store = Arc::new(MockStore::default());
        let research = Arc::new(MockResearch::ok("findings", &[]));
        let notifier = Arc::new(MockNotifier::default());

        let healthy = daily_schedule();
        let mut doomed = daily_schedule();
        doomed.query = "query that always fails".to_string();
        store.seed(healthy.clone());
        store.seed(doomed.clone());
        research.set(
            &doomed.query,
            crate::testutil::MockBehavior::FailSlow { delay_ms: 30 },
        );

        let ctx = ctx(store.clone(), research, notifier);
        tokio::join!(
            execute(&ctx, &healthy, None),
            execute(&ctx, &doomed, None),
        );

        let healthy = store.get(&healthy.id).unwrap().unwrap();
        assert_eq!(healthy.status, ScheduleStatus::Completed);
        assert_eq!(store.results().len(), 1);

        let doomed = store.get(&doomed.id).unwrap().unwrap();
        assert_eq!(doomed.status, ScheduleStatus::Error);
    }

    #[tokio::test]
    async fn webhook_failure_never_touches_schedule_state() {
        let store = Arc::new(MockStore::default());
        let research = Arc::new(MockResearch::ok("findings", &[]));
        let notifier = Arc::new(MockNotifier::failing());
        let schedule = daily_schedule();
        store.seed(schedule.clone());

        execute(
            &ctx(store.clone(), research, notifier),
            &schedule,
            None,
        )
        .await;
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let updated = store.get(&schedule.id).unwrap().unwrap();
        assert_eq!(updated.status, ScheduleStatus::Completed);
    }
}
