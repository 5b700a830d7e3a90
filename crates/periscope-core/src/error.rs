use thiserror::Error;

#[derive(Debug, Error)]
pub enum PeriscopeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid recurrence: {0}")]
    InvalidRecurrence(String),

    #[error("Schedule not found: {id}")]
    ScheduleNotFound { id: String },

    #[error("Database error: {0}")]
    Database(String),

    #[error("Research call failed: {0}")]
    Research(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Request timeout after {ms}ms")]
    Timeout { ms: u64 },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PeriscopeError {
    /// Short error code string sent to clients in JSON error payloads.
    pub fn code(&self) -> &'static str {
        match self {
            PeriscopeError::Config(_) => "CONFIG_ERROR",
            PeriscopeError::InvalidRecurrence(_) => "INVALID_RECURRENCE",
            PeriscopeError::ScheduleNotFound { .. } => "SCHEDULE_NOT_FOUND",
            PeriscopeError::Database(_) => "DATABASE_ERROR",
            PeriscopeError::Research(_) => "RESEARCH_ERROR",
            PeriscopeError::Serialization(_) => "SERIALIZATION_ERROR",
            PeriscopeError::Io(_) => "IO_ERROR",
            PeriscopeError::Timeout { .. } => "TIMEOUT",
            PeriscopeError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

pub type Result<T> = std::result::Result<T, PeriscopeError>;
