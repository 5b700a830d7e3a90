use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, warn};

use periscope_core::config::WEBHOOK_TIMEOUT_SECS;
use periscope_core::{QueryModel, Recurrence, Schedule};

/// Outcome marker carried in every webhook delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Success,
    Error,
}

/// Payload forwarded to the external webhook after each execution.
///
/// Best-effort telemetry, not part of the correctness contract — the
/// schedule's own state never depends on whether this was delivered.
#[derive(Debug, Clone, Serialize)]
pub struct WebhookPayload {
    pub query: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub week_day: Option<String>,
    pub model: QueryModel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub citations: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "scheduleId", skip_serializing_if = "Option::is_none")]
    pub schedule_id: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    pub status: DeliveryStatus,
}

impl WebhookPayload {
    /// Successful scheduled execution.
    pub fn success(schedule: &Schedule, result: &str, citations: &[String]) -> Self {
        Self {
            result: Some(result.to_string()),
            citations: Some(citations.to_vec()),
            error: None,
            status: DeliveryStatus::Success,
            ..Self::base(schedule)
        }
    }

    /// Failed scheduled execution.
    pub fn failure(schedule: &Schedule, error: &str) -> Self {
        Self {
            result: None,
            citations: None,
            error: Some(error.to_string()),
            status: DeliveryStatus::Error,
            ..Self::base(schedule)
        }
    }

    /// Ad-hoc immediate query (never owned by a schedule).
    pub fn immediate(query: &str, model: QueryModel, result: &str, citations: &[String]) -> Self {
        Self {
            query: query.to_string(),
            frequency: None,
            time: None,
            week_day: None,
            model,
            result: Some(result.to_string()),
            citations: Some(citations.to_vec()),
            error: None,
            timestamp: Utc::now(),
            schedule_id: None,
            kind: Some("immediate".to_string()),
            status: DeliveryStatus::Success,
        }
    }

    fn base(schedule: &Schedule) -> Self {
        let recurrence: &Recurrence = &schedule.recurrence;
        Self {
            query: schedule.query.clone(),
            frequency: Some(recurrence.frequency().to_string()),
            time: recurrence.time().map(|t| t.to_string()),
            week_day: recurrence.week_day().map(|d| d.to_string()),
            model: schedule.model,
            result: None,
            citations: None,
            error: None,
            timestamp: Utc::now(),
            schedule_id: Some(schedule.id.clone()),
            kind: None,
            status: DeliveryStatus::Success,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("webhook returned status {0}")]
    Status(u16),
}

/// Delivery contract. Callers treat failures as log-only.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, payload: &WebhookPayload) -> Result<(), NotifyError>;
}

/// HTTP webhook delivery with its own bounded timeout.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: Option<String>,
}

impl WebhookNotifier {
    /// `url = None` disables delivery entirely — every notify becomes a
    /// logged no-op.
    pub fn new(url: Option<String>) -> Self {
        Self::with_timeout(url, Duration::from_secs(WEBHOOK_TIMEOUT_SECS))
    }

    pub fn with_timeout(url: Option<String>, timeout: Duration) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            url,
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn notify(&self, payload: &WebhookPayload) -> Result<(), NotifyError> {
        let Some(ref url) = self.url else {
            debug!("webhook delivery disabled — payload dropped");
            return Ok(());
        };

        let resp = self.client.post(url).json(payload).send().await?;
        if !resp.status().is_success() {
            let status = resp.status().as_u16();
            warn!(status, "webhook rejected delivery");
            return Err(NotifyError::Status(status));
        }
        debug!(status = ?payload.status, "webhook delivered");
        Ok(())
    }
}
