use std::fmt;
use std::sync::Arc;

use forkline_types::{Event, EventId};

/// Signature of a fold step: consume the current state, return the next.
pub type ReduceFn<S> = dyn Fn(S, &Event) -> Result<S, ReducerError> + Send + Sync;

/// Failure raised by a reducer for a particular event.
///
/// The log never catches or retries this; it surfaces unchanged from the
/// materialization that triggered it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("reducer failed on event {event}: {reason}")]
pub struct ReducerError {
    pub event: EventId,
    pub reason: String,
}

impl ReducerError {
    pub fn new(event: &Event, reason: impl Into<String>) -> Self {
        Self {
            event: event.id().clone(),
            reason: reason.into(),
        }
    }
}

/// Caller-supplied fold from events to application state.
///
/// A reducer pairs the initial (empty) state with a pure step function. It
/// is a capability value rather than a trait object hierarchy: the store and
/// every branch forked from it share the same function through an `Arc`,
/// while each owns its own event list.
///
/// The step function must be deterministic and free of side effects; the
/// log relies on that to guarantee identical states for identical event sets.
pub struct Reducer<S> {
    initial: S,
    apply: Arc<ReduceFn<S>>,
}

impl<S> Reducer<S> {
    /// Build a reducer whose step may fail.
    pub fn new<F>(initial: S, apply: F) -> Self
    where
        F: Fn(S, &Event) -> Result<S, ReducerError> + Send + Sync + 'static,
    {
        Self {
            initial,
            apply: Arc::new(apply),
        }
    }

    /// Build a reducer whose step cannot fail.
    pub fn infallible<F>(initial: S, apply: F) -> Self
    where
        F: Fn(S, &Event) -> S + Send + Sync + 'static,
    {
        Self::new(initial, move |state, event| Ok(apply(state, event)))
    }

    /// The state folding starts from.
    pub fn initial(&self) -> &S {
        &self.initial
    }

    /// Apply one event to `state`.
    pub fn apply(&self, state: S, event: &Event) -> Result<S, ReducerError> {
        (self.apply)(state, event)
    }
}

impl<S: Clone> Clone for Reducer<S> {
    fn clone(&self) -> Self {
        Self {
            initial: self.initial.clone(),
            apply: Arc::clone(&self.apply),
        }
    }
}

impl<S: fmt::Debug> fmt::Debug for Reducer<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reducer")
            .field("initial", &self.initial)
            .finish_non_exhaustive()
    }
}
