#![forbid(unsafe_code)]
//! epicload-core library.
//!
//! Resolves every work item to its ancestor epic, counts distinct epics per
//! assignee, projects when each assignee becomes free, and reconciles roster
//! members who hold nothing. [`pipeline::run`] chains the stages over one
//! immutable [`pipeline::Snapshot`].
//!
//! # Conventions
//!
//! - **Errors**: Stage functions return [`error::EngineError`]; config and
//!   file loading use `anyhow::Result`.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `debug!`). Anomalies
//!   in the input are logged and reported, never raised.
//! - **Time**: Nothing reads the clock. Callers pass `today`.

pub mod availability;
pub mod config;
pub mod error;
pub mod export;
pub mod hierarchy;
pub mod input;
pub mod model;
pub mod pipeline;
pub mod reconcile;
pub mod table;
pub mod workload;

pub use error::{EngineError, ErrorCode};
pub use pipeline::{RunOutput, Snapshot, run};
