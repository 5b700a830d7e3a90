use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};

use periscope_core::config::RESEARCH_TIMEOUT_SECS;

use crate::client::{Completion, ResearchClient, ResearchError, ResearchRequest};

const SYSTEM_PROMPT: &str =
    "You are a helpful research assistant. Provide detailed, well-researched answers.";

/// Perplexity chat-completions backend.
pub struct PerplexityClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    timeout_ms: u64,
}

impl PerplexityClient {
    pub fn new(api_key: String, base_url: Option<String>) -> Self {
        Self::with_timeout(api_key, base_url, Duration::from_secs(RESEARCH_TIMEOUT_SECS))
    }

    pub fn with_timeout(api_key: String, base_url: Option<String>, timeout: Duration) -> Self {
        Self {
            // Client-level timeout bounds the whole call: connect, send, body.
            client: reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_default(),
            api_key,
            base_url: base_url.unwrap_or_else(|| "https://api.perplexity.ai".to_string()),
            timeout_ms: timeout.as_millis() as u64,
        }
    }
}

#[async_trait]
impl ResearchClient for PerplexityClient {
    fn name(&self) -> &str {
        "perplexity"
    }

    async fn complete(&self, req: &ResearchRequest) -> Result<Completion, ResearchError> {
        let body = build_request_body(req);
        let url = format!("{}/chat/completions", self.base_url);

        debug!(model = %req.model, "sending research request");

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ResearchError::Timeout {
                        ms: self.timeout_ms,
                    }
                } else {
                    ResearchError::Http(e)
                }
            })?;

        let status = resp.status().as_u16();
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status, body = %text, "research API error");
            return Err(ResearchError::Api {
                status,
                message: text,
            });
        }

        let api_resp: ApiResponse = resp
            .json()
            .await
            .map_err(|e| ResearchError::Parse(e.to_string()))?;

        parse_response(api_resp)
    }
}

fn build_request_body(req: &ResearchRequest) -> serde_json::Value {
    serde_json::json!({
        "model": req.model.as_str(),
        "messages": [
            { "role": "system", "content": SYSTEM_PROMPT },
            { "role": "user", "content": req.query },
        ],
        "temperature": 0.2,
        "max_tokens": req.model.max_tokens(),
        "top_p": 0.9,
    })
}

fn parse_response(resp: ApiResponse) -> Result<Completion, ResearchError> {
    let text = resp
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .ok_or_else(|| ResearchError::Parse("response carried no choices".to_string()))?;

    Ok(Completion {
        text,
        citations: resp.citations.unwrap_or_default(),
    })
}

// Perplexity API response types (private — deserialization only)

#[derive(Deserialize)]
struct ApiResponse {
    choices: Vec<Choice>,
    citations: Option<Vec<String>>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}
