//! `periscope-core` — shared types, configuration and errors.
//!
//! Everything the other crates agree on lives here: the [`types::Schedule`]
//! entity and its recurrence vocabulary, the append-only
//! [`types::QueryResult`] audit record, the top-level error taxonomy, and
//! the TOML + env configuration loader.

pub mod config;
pub mod error;
pub mod types;

pub use error::{PeriscopeError, Result};
pub use types::{
    QueryModel, QueryResult, Recurrence, Schedule, SchedulePatch, ScheduleStatus, TimeOfDay,
    WeekDay,
};
