use thiserror::Error;

/// Errors surfaced by the persisted store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Underlying SQLite / rusqlite error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// No schedule with the given ID exists.
    #[error("Schedule not found: {id}")]
    NotFound { id: String },

    /// A persisted row could not be decoded back into a Schedule.
    #[error("Corrupt row for schedule {id}: {reason}")]
    CorruptRow { id: String, reason: String },

    /// The backing store could not be reached.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Immediate queries execute synchronously and never become rows.
    #[error("Immediate queries are not persisted as schedules")]
    ImmediateNotPersisted,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StoreError>;
