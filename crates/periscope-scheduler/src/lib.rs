//! `periscope-scheduler` — the recurring-query execution engine.
//!
//! # Overview
//!
//! Each installed schedule owns one timer task that fires per its
//! [`trigger::TriggerSpec`]. When a trigger fires, [`executor::execute`]
//! drives the schedule through `scheduled → processing → completed/error`
//! against the store, with isolated failure handling at every step. The
//! [`reconcile::Reconciler`] periodically re-syncs the in-memory
//! [`registry::JobRegistry`] with the persisted set of active schedules so
//! externally created, edited or deleted schedules are picked up without a
//! restart.
//!
//! There is no retry inside a single firing: the next natural occurrence of
//! the recurrence is the retry mechanism.

pub mod error;
pub mod executor;
pub mod reconcile;
pub mod registry;
pub mod trigger;

#[cfg(test)]
pub(crate) mod testutil;

pub use error::{Result, SchedulerError};
pub use executor::{execute, ErrorHandler, ExecutionContext};
pub use reconcile::Reconciler;
pub use registry::JobRegistry;
pub use trigger::{next_run_time, trigger_spec, TriggerSpec};
