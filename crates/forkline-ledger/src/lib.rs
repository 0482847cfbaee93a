//! Branchable, append-only event log for forkline.
//!
//! This crate is the heart of forkline. It provides:
//! - [`EventStore`], the root authority that accumulates canonical history
//! - [`Branch`], an isolated working copy that can be materialized, amended
//!   with retroactive events, diffed, and merged
//! - [`Reducer`], the caller-supplied fold from events to state
//! - Deterministic replay in canonical (`t`, then `id`) order
//! - Duplicate-id policy and caller-side event validation

pub mod branch;
pub mod config;
pub mod error;
pub mod reducer;
pub mod replay;
pub mod store;
pub mod traits;
pub mod validation;

pub use branch::Branch;
pub use config::{DuplicatePolicy, LedgerConfig};
pub use error::LedgerError;
pub use reducer::{ReduceFn, Reducer, ReducerError};
pub use replay::{Materialization, ReplayEngine};
pub use store::EventStore;
pub use traits::EventSource;
pub use validation::{EventValidator, ValidationReport, Violation, ViolationKind};
