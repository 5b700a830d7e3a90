use thiserror::Error;

/// Errors that can occur within the scheduler subsystem.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// Bad schedule configuration — surfaces at install time, never at
    /// execution time. The schedule stays un-triggered until fixed.
    #[error("Invalid recurrence: {0}")]
    InvalidRecurrence(String),

    /// The remote completion call errored or timed out. Transient and
    /// expected; the next natural firing is the retry.
    #[error("Research call failed: {0}")]
    RemoteCallFailed(#[from] periscope_research::ResearchError),

    /// A store write failed. Reported, never retried automatically.
    #[error("Store write failed: {0}")]
    PersistenceFailed(#[from] periscope_store::StoreError),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
