//! `periscope-store` — persisted schedule and result storage.
//!
//! The [`ScheduleStore`] trait is the collaborator contract the scheduler
//! core works against: per-call atomicity, typed errors, no cross-call
//! transactions. [`SqliteStore`] is the production implementation, one
//! SQLite `Connection` behind a mutex.

pub mod db;
pub mod error;
pub mod sqlite;
pub mod store;

pub use error::{Result, StoreError};
pub use sqlite::SqliteStore;
pub use store::{NewQueryResult, ScheduleStore};
