use std::collections::HashSet;

use forkline_types::{canonical_cmp, sort_canonical, Event, Timestamp};
use tracing::trace;

use crate::config::DuplicatePolicy;
use crate::error::LedgerError;
use crate::reducer::Reducer;

/// State produced by folding a reducer over an event list, with counters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Materialization<S> {
    pub state: S,
    /// Events passed to the reducer.
    pub applied: u64,
    /// Duplicate-id copies withheld by the duplicate policy.
    pub skipped_duplicates: u64,
    /// Greatest timestamp among the events considered.
    pub head: Option<Timestamp>,
}

/// Deterministic fold of events into state.
///
/// Every replay copies the input, sorts it into canonical order, applies the
/// duplicate policy, then folds from the reducer's initial state. The input
/// slice's order never influences the result.
pub struct ReplayEngine;

impl ReplayEngine {
    pub fn replay<S: Clone>(
        reducer: &Reducer<S>,
        events: &[Event],
        policy: DuplicatePolicy,
    ) -> Result<Materialization<S>, LedgerError> {
        let mut ordered = events.to_vec();
        sort_canonical(&mut ordered);
        fold_ordered(reducer, &ordered, policy)
    }

    /// Replay only the events with `t <= until`.
    pub fn replay_until<S: Clone>(
        reducer: &Reducer<S>,
        events: &[Event],
        policy: DuplicatePolicy,
        until: Timestamp,
    ) -> Result<Materialization<S>, LedgerError> {
        let mut ordered: Vec<Event> = events.iter().filter(|e| e.t() <= until).cloned().collect();
        sort_canonical(&mut ordered);
        fold_ordered(reducer, &ordered, policy)
    }
}

fn fold_ordered<S: Clone>(
    reducer: &Reducer<S>,
    ordered: &[Event],
    policy: DuplicatePolicy,
) -> Result<Materialization<S>, LedgerError> {
    let selected = select(ordered, policy);
    let skipped_duplicates = (ordered.len() - selected.len()) as u64;

    let mut state = reducer.initial().clone();
    let mut applied = 0u64;
    for event in selected {
        state = reducer.apply(state, event)?;
        applied += 1;
    }

    trace!(applied, skipped_duplicates, %policy, "replayed events");

    Ok(Materialization {
        state,
        applied,
        skipped_duplicates,
        head: ordered.last().map(Event::t),
    })
}

/// Pick the copies the policy lets through, preserving canonical order.
fn select(ordered: &[Event], policy: DuplicatePolicy) -> Vec<&Event> {
    match policy {
        DuplicatePolicy::FoldAll => ordered.iter().collect(),
        DuplicatePolicy::KeepEarliest => {
            let mut seen = HashSet::new();
            rank_copies(ordered)
                .into_iter()
                .filter(|e| seen.insert(e.id()))
                .collect()
        }
        DuplicatePolicy::KeepLatest => {
            let mut seen = HashSet::new();
            let mut kept: Vec<&Event> = rank_copies(ordered)
                .into_iter()
                .rev()
                .filter(|e| seen.insert(e.id()))
                .collect();
            kept.reverse();
            kept
        }
    }
}

/// Canonical order, with copies tied on `(t, id)` further ranked by type
/// tag and then by encoded payload.
///
/// The stable canonical sort leaves such copies in insertion order; ranking
/// them by content makes the policy's pick depend only on which events are
/// held.
fn rank_copies(ordered: &[Event]) -> Vec<&Event> {
    let mut keyed: Vec<(&Event, String)> = ordered
        .iter()
        .map(|event| (event, event.payload().to_string()))
        .collect();
    keyed.sort_by(|(a, a_body), (b, b_body)| {
        canonical_cmp(a, b)
            .then_with(|| a.kind().cmp(b.kind()))
            .then_with(|| a_body.cmp(b_body))
    });
    keyed.into_iter().map(|(event, _)| event).collect()
}
