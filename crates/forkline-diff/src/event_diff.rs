//! Event-level diff: which events does one list hold that another lacks?
//!
//! Presence is decided by [`EventId`] alone. Two events with the same id are
//! the same event as far as the diff is concerned, even if their timestamps
//! or payloads differ.

use std::collections::HashSet;

use forkline_types::{Event, EventId};

/// Collect the set of identifiers present in `events`.
pub fn id_set(events: &[Event]) -> HashSet<&EventId> {
    events.iter().map(Event::id).collect()
}

/// Events of `other` whose id does not appear in `base`.
///
/// The result is asymmetric: `missing_events(a, b)` answers "what does `b`
/// have that `a` lacks". It preserves `other`'s list order and holds each id
/// at most once; when `other` carries several copies of an id, the first
/// copy in its list is returned.
///
/// Runs in `O(n + m)`.
pub fn missing_events(base: &[Event], other: &[Event]) -> Vec<Event> {
    let mut seen = id_set(base);
    other
        .iter()
        .filter(|event| seen.insert(event.id()))
        .cloned()
        .collect()
}
