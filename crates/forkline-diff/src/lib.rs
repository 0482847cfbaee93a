//! Diff engine for forkline.
//!
//! Computes which events one branch holds that another lacks, and compares
//! materialized state maps key by key.
//!
//! # Key Types
//!
//! - [`missing_events`] -- Asymmetric, id-based event set difference
//! - [`StateDiff`] / [`StateChange`] -- State map diff (BTreeMap<String, Value>)

pub mod event_diff;
pub mod state_diff;

pub use event_diff::{id_set, missing_events};
pub use state_diff::{diff_states, StateChange, StateDiff};
