//! qtriage-core library.
//!
//! A concurrent in-memory triage store for support questions: four state
//! buckets, per-question ownership, per-user shadow buckets, and an atomic
//! batch transition engine, with SQLite write-behind persistence.
//!
//! # Conventions
//!
//! - **Errors**: typed `thiserror` enums at the store boundary
//!   ([`error::TriageError`]); `anyhow::Result` for I/O glue.
//! - **Logging**: `tracing` macros with structured fields.

pub mod config;
pub mod coordinator;
pub mod db;
pub mod engine;
pub mod error;
pub mod lock;
pub mod model;
pub mod persist;
pub mod proposal;
pub mod source;
pub mod store;

pub use coordinator::{Committed, Triage};
pub use engine::{Change, Transition};
pub use error::{ErrorCode, InvariantViolation, TriageError};
pub use proposal::ProposalSet;
