//! The canonical total order over events.
//!
//! Events are ordered by timestamp ascending, then by identifier using a
//! byte-lexicographic comparison. Every branch sorts with this same order
//! before folding, so the same multiset of events always reduces to the same
//! state no matter how it was assembled.

use std::cmp::Ordering;

use crate::event::Event;

/// Compare two events in canonical order: `t` first, then `id`.
pub fn canonical_cmp(a: &Event, b: &Event) -> Ordering {
    a.t().cmp(&b.t()).then_with(|| a.id().cmp(b.id()))
}

/// Sort events in place into canonical order.
///
/// The sort is stable: events equal under [`canonical_cmp`] (same `t` and
/// same `id`) keep their relative order.
pub fn sort_canonical(events: &mut [Event]) {
    events.sort_by(canonical_cmp);
}

/// Returns `true` if `events` is already in canonical order.
pub fn is_canonical(events: &[Event]) -> bool {
    events
        .windows(2)
        .all(|pair| canonical_cmp(&pair[0], &pair[1]) != Ordering::Greater)
}
