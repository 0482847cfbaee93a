use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use forkline_types::{Event, Timestamp};
use tracing::{debug, trace};

use crate::branch::Branch;
use crate::config::LedgerConfig;
use crate::error::LedgerError;
use crate::reducer::Reducer;
use crate::traits::EventSource;

/// Root authority over the canonical, ever-growing event history.
///
/// The log lives behind a `RwLock` so a store can be shared (for example in
/// an `Arc`) while appends stay exclusive. Events are never mutated or
/// removed once appended. No id or timestamp validation happens here.
///
/// Branches are produced by [`EventStore::fork`] as value copies; later
/// appends never become visible to a branch forked earlier.
#[derive(Debug)]
pub struct EventStore<S> {
    reducer: Reducer<S>,
    config: LedgerConfig,
    log: RwLock<Vec<Event>>,
}

impl<S: Clone> EventStore<S> {
    pub fn new(reducer: Reducer<S>) -> Self {
        Self::with_config(reducer, LedgerConfig::default())
    }

    pub fn with_config(reducer: Reducer<S>, config: LedgerConfig) -> Self {
        Self {
            reducer,
            config,
            log: RwLock::new(Vec::new()),
        }
    }

    /// Add `event` to the end of the log. Always succeeds.
    pub fn append(&self, event: Event) {
        trace!(id = %event.id(), t = %event.t(), "append");
        self.write_log().push(event);
    }

    /// Append several events under a single write lock, in iteration order.
    pub fn append_batch(&self, events: impl IntoIterator<Item = Event>) {
        let mut log = self.write_log();
        let before = log.len();
        log.extend(events);
        trace!(count = log.len() - before, "append batch");
    }

    /// Fork a branch holding the events with `t <= until` (all events when
    /// `until` is `None`). The filter sees the log as of this call.
    pub fn fork(&self, until: Option<Timestamp>) -> Branch<S> {
        let log = self.read_log();
        let events: Vec<Event> = match until {
            Some(cutoff) => log.iter().filter(|e| e.t() <= cutoff).cloned().collect(),
            None => log.clone(),
        };
        debug!(
            until = ?until,
            copied = events.len(),
            total = log.len(),
            "forked branch from store"
        );
        Branch::new(self.reducer.clone(), events).with_duplicate_policy(self.config.duplicate_policy)
    }

    /// Materialize the whole log, as a fresh fork would.
    pub fn state(&self) -> Result<S, LedgerError> {
        self.fork(None).state()
    }

    pub fn len(&self) -> usize {
        self.read_log().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_log().is_empty()
    }

    /// Value copy of the log, in append order.
    pub fn events(&self) -> Vec<Event> {
        self.read_log().clone()
    }

    /// Greatest timestamp in the log, if any.
    pub fn latest_timestamp(&self) -> Option<Timestamp> {
        self.read_log().iter().map(Event::t).max()
    }

    pub fn reducer(&self) -> &Reducer<S> {
        &self.reducer
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    // A panic while the lock is held cannot leave the Vec half-written, so a
    // poisoned lock still guards a consistent log.
    fn read_log(&self) -> RwLockReadGuard<'_, Vec<Event>> {
        self.log.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_log(&self) -> RwLockWriteGuard<'_, Vec<Event>> {
        self.log.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<S: Clone> EventSource for EventStore<S> {
    fn snapshot(&self) -> Vec<Event> {
        self.events()
    }
}
