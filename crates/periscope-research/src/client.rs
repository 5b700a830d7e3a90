use async_trait::async_trait;

use periscope_core::QueryModel;

/// Request to the remote completion endpoint.
#[derive(Debug, Clone)]
pub struct ResearchRequest {
    pub model: QueryModel,
    pub query: String,
}

/// Response from the remote completion endpoint.
#[derive(Debug, Clone)]
pub struct Completion {
    pub text: String,
    /// Citation URLs, empty when the API returns none.
    pub citations: Vec<String>,
}

/// Common interface for remote completion backends.
#[async_trait]
pub trait ResearchClient: Send + Sync {
    /// Backend name for logging and error messages.
    fn name(&self) -> &str;

    /// Execute one completion call. Implementations must bound the call
    /// with a timeout — callers rely on this returning promptly.
    async fn complete(&self, req: &ResearchRequest) -> Result<Completion, ResearchError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ResearchError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("request timed out after {ms}ms")]
    Timeout { ms: u64 },

    #[error("Research backend unavailable: {0}")]
    Unavailable(String),
}
