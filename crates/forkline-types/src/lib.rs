//! Foundation types for forkline.
//!
//! Every other forkline crate depends on `forkline-types`. It defines the
//! immutable [`Event`] record and the single canonical order in which events
//! are folded into state.
//!
//! # Key Types
//!
//! - [`EventId`] — Opaque, producer-assigned identifier, globally unique
//! - [`Timestamp`] — Primary ordering key (any finite number)
//! - [`Event`] — Immutable unit of history
//! - [`sort_canonical`] — Timestamp-then-id total order

pub mod error;
pub mod event;
pub mod order;
pub mod temporal;

pub use error::TypeError;
pub use event::{Event, EventId};
pub use order::{canonical_cmp, is_canonical, sort_canonical};
pub use temporal::Timestamp;
