use std::collections::BTreeMap;
use std::sync::OnceLock;

use forkline_diff::{diff_states, missing_events, StateDiff};
use forkline_types::{sort_canonical, Event, EventId, Timestamp};
use serde_json::Value;
use tracing::debug;

use crate::config::DuplicatePolicy;
use crate::error::LedgerError;
use crate::reducer::Reducer;
use crate::replay::{Materialization, ReplayEngine};
use crate::traits::EventSource;

/// An independent, mutable working copy of a set of events.
///
/// A branch owns its event list outright; nothing it is forked or merged
/// from can observe its mutations, and it observes none of theirs. The list
/// is kept in insertion order and treated as an unordered set: only
/// materialization imposes the canonical order.
///
/// The last materialization is memoized. [`Branch::retro_insert`] is the
/// only mutation and always discards the memo.
#[derive(Clone, Debug)]
pub struct Branch<S> {
    events: Vec<Event>,
    reducer: Reducer<S>,
    policy: DuplicatePolicy,
    cache: OnceLock<Materialization<S>>,
}

impl<S: Clone> Branch<S> {
    pub fn new(reducer: Reducer<S>, events: Vec<Event>) -> Self {
        Self {
            events,
            reducer,
            policy: DuplicatePolicy::default(),
            cache: OnceLock::new(),
        }
    }

    pub fn empty(reducer: Reducer<S>) -> Self {
        Self::new(reducer, Vec::new())
    }

    pub fn with_duplicate_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.policy = policy;
        self.cache = OnceLock::new();
        self
    }

    pub fn duplicate_policy(&self) -> DuplicatePolicy {
        self.policy
    }

    pub fn reducer(&self) -> &Reducer<S> {
        &self.reducer
    }

    /// The held events, in insertion order.
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// A copy of the held events, in canonical order.
    pub fn canonical_events(&self) -> Vec<Event> {
        let mut ordered = self.events.clone();
        sort_canonical(&mut ordered);
        ordered
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn contains(&self, id: &EventId) -> bool {
        self.events.iter().any(|e| e.id() == id)
    }

    /// Greatest timestamp held, if any.
    pub fn head(&self) -> Option<Timestamp> {
        self.events.iter().map(Event::t).max()
    }

    /// Fold the reducer over the events in canonical order.
    ///
    /// Repeated calls without an intervening mutation return identical
    /// results. A reducer failure propagates unchanged and leaves the
    /// branch's events untouched.
    pub fn materialize(&self) -> Result<Materialization<S>, LedgerError> {
        if let Some(cached) = self.cache.get() {
            return Ok(cached.clone());
        }
        let result = ReplayEngine::replay(&self.reducer, &self.events, self.policy)?;
        // Losing a race to fill the cell is harmless: both folds are identical.
        let _ = self.cache.set(result.clone());
        Ok(result)
    }

    /// The materialized application state.
    pub fn state(&self) -> Result<S, LedgerError> {
        self.materialize().map(|m| m.state)
    }

    /// The state as of `until`: only events with `t <= until` are folded.
    pub fn state_until(&self, until: Timestamp) -> Result<S, LedgerError> {
        ReplayEngine::replay_until(&self.reducer, &self.events, self.policy, until).map(|m| m.state)
    }

    /// Add `event` regardless of how its timestamp relates to the events
    /// already held. Previously returned states are not updated; call
    /// [`Branch::state`] again to see the amended history.
    ///
    /// No id uniqueness check is performed.
    pub fn retro_insert(&mut self, event: Event) {
        if let Some(head) = self.head() {
            if event.t().is_before(&head) {
                debug!(
                    id = %event.id(),
                    t = %event.t(),
                    head = %head,
                    "retroactive insert precedes branch head"
                );
            }
        }
        self.events.push(event);
        self.cache = OnceLock::new();
    }

    /// Events held by `other` whose id is absent from this branch.
    ///
    /// Asymmetric: `a.diff(b)` is what `b` has that `a` lacks. Each id
    /// appears at most once in the result.
    pub fn diff<T>(&self, other: &Branch<T>) -> Vec<Event> {
        missing_events(&self.events, &other.events)
    }

    /// A new branch holding the union of both event sets, deduplicated by
    /// id against this branch. Neither input is modified.
    ///
    /// The result uses this branch's reducer and duplicate policy.
    pub fn merge(&self, other: &Branch<S>) -> Branch<S> {
        let adopted = self.diff(other);
        debug!(
            own = self.events.len(),
            adopted = adopted.len(),
            "merging branches"
        );
        let mut events = Vec::with_capacity(self.events.len() + adopted.len());
        events.extend_from_slice(&self.events);
        events.extend(adopted);
        Branch::new(self.reducer.clone(), events).with_duplicate_policy(self.policy)
    }

    /// Fork a sub-branch holding this branch's events with `t <= until`
    /// (all of them when `until` is `None`).
    pub fn fork(&self, until: Option<Timestamp>) -> Branch<S> {
        let events = match until {
            Some(cutoff) => self.events.iter().filter(|e| e.t() <= cutoff).cloned().collect(),
            None => self.events.clone(),
        };
        Branch::new(self.reducer.clone(), events).with_duplicate_policy(self.policy)
    }
}

impl Branch<BTreeMap<String, Value>> {
    /// Key-level difference from this branch's state to `other`'s.
    pub fn state_diff(&self, other: &Self) -> Result<StateDiff, LedgerError> {
        let ours = self.state()?;
        let theirs = other.state()?;
        Ok(diff_states(&ours, &theirs))
    }
}

impl<S: Clone> EventSource for Branch<S> {
    fn snapshot(&self) -> Vec<Event> {
        self.events.clone()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use proptest::prelude::*;
    use serde_json::json;

    use super::*;
    use crate::reducer::ReducerError;
    use crate::store::EventStore;

    type KvState = BTreeMap<String, Value>;

    fn kv_reducer() -> Reducer<KvState> {
        Reducer::new(KvState::new(), |mut state, event| match event.kind() {
            "add" => {
                let key = event.payload()["key"]
                    .as_str()
                    .ok_or_else(|| ReducerError::new(event, "missing key"))?;
                state.insert(key.to_string(), event.payload()["value"].clone());
                Ok(state)
            }
            "remove" => {
                if let Some(key) = event.payload()["key"].as_str() {
                    state.remove(key);
                }
                Ok(state)
            }
            _ => Ok(state),
        })
    }

    fn add(id: &str, t: i64, key: &str, value: i64) -> Event {
        Event::new(id, t, "add", json!({"key": key, "value": value}))
    }

    fn kv(pairs: &[(&str, i64)]) -> KvState {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), json!(v)))
            .collect()
    }

    fn ids(events: &[Event]) -> Vec<&str> {
        events.iter().map(|e| e.id().as_str()).collect()
    }

    fn seeded_store() -> EventStore<KvState> {
        let store = EventStore::new(kv_reducer());
        store.append(add("e1", 1, "x", 1));
        store.append(add("e2", 2, "y", 2));
        store
    }

    #[test]
    fn worked_example() {
        let store = seeded_store();

        let b1 = store.fork(None);
        assert_eq!(b1.state().unwrap(), kv(&[("x", 1), ("y", 2)]));

        let mut b2 = store.fork(None);
        b2.retro_insert(add("e0", 0, "z", 0));
        assert_eq!(b2.state().unwrap(), kv(&[("z", 0), ("x", 1), ("y", 2)]));

        let merged = b1.merge(&b2);
        assert_eq!(merged.state().unwrap(), kv(&[("x", 1), ("y", 2), ("z", 0)]));
    }

    #[test]
    fn state_is_deterministic() {
        let branch = seeded_store().fork(None);
        let first = branch.state().unwrap();
        let second = branch.state().unwrap();
        assert_eq!(first, second);
        assert_eq!(branch.materialize().unwrap(), branch.materialize().unwrap());
    }

    #[test]
    fn retro_insert_reorders_history() {
        let mut branch = Branch::empty(kv_reducer());
        branch.retro_insert(add("late", 10, "k", 10));
        assert_eq!(branch.state().unwrap(), kv(&[("k", 10)]));

        // An earlier write must not override the later one once re-sorted.
        branch.retro_insert(add("early", 1, "k", 1));
        assert_eq!(branch.state().unwrap(), kv(&[("k", 10)]));
        assert_eq!(ids(&branch.canonical_events()), vec!["early", "late"]);
        assert_eq!(ids(branch.events()), vec!["late", "early"]);
    }

    #[test]
    fn retro_insert_between_integral_timestamps() {
        let mut branch = Branch::new(
            kv_reducer(),
            vec![add("e0", 0, "k", 0), add("e1", 1, "k", 1)],
        );
        let half = Timestamp::from_f64(0.5).unwrap();
        branch.retro_insert(Event::new(
            "mid",
            half,
            "add",
            json!({"key": "k", "value": 5}),
        ));
        assert_eq!(ids(&branch.canonical_events()), vec!["e0", "mid", "e1"]);
        assert_eq!(branch.state().unwrap(), kv(&[("k", 1)]));
        assert_eq!(branch.state_until(half).unwrap(), kv(&[("k", 5)]));
    }

    #[test]
    fn retro_insert_invalidates_memo() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let reducer = Reducer::infallible(0u32, move |n, _event| {
            counter.fetch_add(1, Ordering::SeqCst);
            n + 1
        });

        let mut branch = Branch::new(reducer, vec![add("a", 1, "k", 1)]);
        assert_eq!(branch.state().unwrap(), 1);
        assert_eq!(branch.state().unwrap(), 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        branch.retro_insert(add("b", 0, "k", 0));
        assert_eq!(branch.state().unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn equal_timestamps_break_ties_by_id() {
        let mut branch = Branch::empty(kv_reducer());
        branch.retro_insert(add("b", 5, "k", 2));
        branch.retro_insert(add("a", 5, "k", 1));
        // "a" sorts first, so "b" is applied last.
        assert_eq!(branch.state().unwrap(), kv(&[("k", 2)]));
    }

    #[test]
    fn state_until_time_travels() {
        let mut branch = seeded_store().fork(None);
        branch.retro_insert(add("e3", 3, "x", 30));
        assert_eq!(branch.state_until(Timestamp::new(0)).unwrap(), KvState::new());
        assert_eq!(branch.state_until(Timestamp::new(1)).unwrap(), kv(&[("x", 1)]));
        assert_eq!(
            branch.state_until(Timestamp::new(3)).unwrap(),
            kv(&[("x", 30), ("y", 2)])
        );
    }

    #[test]
    fn diff_is_asymmetric() {
        let store = seeded_store();
        let mut a = store.fork(None);
        let mut b = store.fork(None);
        a.retro_insert(add("only-a", 4, "a", 4));
        b.retro_insert(add("only-b", 3, "b", 3));

        assert_eq!(ids(&a.diff(&b)), vec!["only-b"]);
        assert_eq!(ids(&b.diff(&a)), vec!["only-a"]);
        assert!(a.diff(&a.clone()).is_empty());
    }

    #[test]
    fn merge_does_not_mutate_inputs() {
        let store = seeded_store();
        let a = store.fork(Some(Timestamp::new(1)));
        let b = store.fork(None);
        let merged = a.merge(&b);

        assert_eq!(a.len(), 1);
        assert_eq!(b.len(), 2);
        assert_eq!(merged.len(), 2);
        assert!(merged.diff(&a).is_empty());
        assert!(merged.diff(&b).is_empty());
    }

    #[test]
    fn merge_is_isolated_from_later_inserts() {
        let store = seeded_store();
        let mut a = store.fork(None);
        let b = store.fork(None);
        let merged = a.merge(&b);
        a.retro_insert(add("after", 0, "w", 0));
        assert!(!merged.contains(&"after".into()));
    }

    #[test]
    fn merge_takes_receiver_policy() {
        let a = Branch::empty(kv_reducer()).with_duplicate_policy(DuplicatePolicy::KeepEarliest);
        let b = Branch::empty(kv_reducer());
        assert_eq!(a.merge(&b).duplicate_policy(), DuplicatePolicy::KeepEarliest);
        assert_eq!(b.merge(&a).duplicate_policy(), DuplicatePolicy::FoldAll);
    }

    #[test]
    fn duplicate_ids_fold_twice_by_default() {
        let counting = Reducer::infallible(0u32, |n, _event| n + 1);
        let mut branch = Branch::empty(counting);
        branch.retro_insert(Event::new("dup", 1, "tick", Value::Null));
        branch.retro_insert(Event::new("dup", 1, "tick", Value::Null));
        assert_eq!(branch.state().unwrap(), 2);

        let deduped = branch.clone().with_duplicate_policy(DuplicatePolicy::KeepEarliest);
        let m = deduped.materialize().unwrap();
        assert_eq!(m.state, 1);
        assert_eq!(m.skipped_duplicates, 1);
    }

    #[test]
    fn reducer_failure_leaves_events_intact() {
        let mut branch = seeded_store().fork(None);
        branch.retro_insert(Event::new("broken", 5, "add", json!({"value": 1})));

        let err = branch.state().unwrap_err();
        assert!(matches!(err, LedgerError::Reducer(ref e) if e.event.as_str() == "broken"));
        assert_eq!(branch.len(), 3);
        // Same failure again: nothing was cached or dropped.
        assert_eq!(branch.state().unwrap_err(), err);
    }

    #[test]
    fn remove_events_fold_in_order() {
        let mut branch = seeded_store().fork(None);
        branch.retro_insert(Event::new("rm", 3, "remove", json!({"key": "x"})));
        assert_eq!(branch.state().unwrap(), kv(&[("y", 2)]));
        // Re-adding "x" before the removal has no visible effect.
        branch.retro_insert(add("readd", 2, "x", 7));
        assert_eq!(branch.state().unwrap(), kv(&[("y", 2)]));
    }

    #[test]
    fn state_diff_between_branches() {
        let store = seeded_store();
        let a = store.fork(None);
        let mut b = store.fork(None);
        b.retro_insert(add("e3", 3, "y", 20));
        b.retro_insert(add("e4", 4, "z", 4));

        let diff = a.state_diff(&b).unwrap();
        assert_eq!(diff.modifications(), 1);
        assert_eq!(diff.additions(), 1);
        assert_eq!(diff.removals(), 0);
    }

    #[test]
    fn sub_fork_copies_subset() {
        let mut parent = seeded_store().fork(None);
        let child = parent.fork(Some(Timestamp::new(1)));
        parent.retro_insert(add("e9", 0, "w", 9));
        assert_eq!(ids(child.events()), vec!["e1"]);
        assert_eq!(child.head(), Some(Timestamp::new(1)));
    }

    /// Events with system-wide unique ids, as producers are expected to emit.
    fn arb_unique_events() -> impl Strategy<Value = Vec<Event>> {
        proptest::collection::btree_map("[a-f]{1,3}", (-4i64..4, "[xyz]", 0i64..50), 0..16)
            .prop_map(|pool| {
                pool.into_iter()
                    .map(|(id, (t, key, value))| add(&id, t, &key, value))
                    .collect()
            })
    }

    /// Two branches drawn from one pool of unique events, possibly overlapping.
    fn arb_branch_pair() -> impl Strategy<Value = (Vec<Event>, Vec<Event>)> {
        proptest::collection::btree_map(
            "[a-f]{1,3}",
            (-4i64..4, "[xyz]", 0i64..50, 0u8..3),
            0..16,
        )
        .prop_map(|pool| {
            let mut left = Vec::new();
            let mut right = Vec::new();
            for (id, (t, key, value, side)) in pool {
                let event = add(&id, t, &key, value);
                match side {
                    0 => left.push(event),
                    1 => right.push(event),
                    _ => {
                        left.push(event.clone());
                        right.push(event);
                    }
                }
            }
            right.reverse();
            (left, right)
        })
    }

    /// Events whose ids may repeat within the list.
    fn arb_events() -> impl Strategy<Value = Vec<Event>> {
        proptest::collection::vec(("[a-f]{1,2}", -4i64..4, "[xyz]", 0i64..50), 0..16).prop_map(
            |raw| {
                raw.into_iter()
                    .map(|(id, t, key, value)| add(&id, t, &key, value))
                    .collect()
            },
        )
    }

    proptest! {
        #[test]
        fn order_independent_state(events in arb_unique_events()) {
            let forward = Branch::new(kv_reducer(), events.clone());
            let mut reversed_events = events;
            reversed_events.reverse();
            let mut inserted = Branch::empty(kv_reducer());
            for event in reversed_events {
                inserted.retro_insert(event);
            }
            prop_assert_eq!(forward.state().unwrap(), inserted.state().unwrap());
        }

        #[test]
        fn merge_closure_and_commutativity((left, right) in arb_branch_pair()) {
            let a = Branch::new(kv_reducer(), left);
            let b = Branch::new(kv_reducer(), right);
            let ab = a.merge(&b);
            let ba = b.merge(&a);

            prop_assert!(ab.diff(&a).is_empty());
            prop_assert!(ab.diff(&b).is_empty());
            prop_assert!(ba.diff(&a).is_empty());
            prop_assert!(ba.diff(&b).is_empty());
            prop_assert_eq!(ab.state().unwrap(), ba.state().unwrap());
        }

        #[test]
        fn diff_contains_exactly_missing_ids(left in arb_events(), right in arb_events()) {
            let a = Branch::new(kv_reducer(), left);
            let b = Branch::new(kv_reducer(), right);
            let diff = a.diff(&b);

            let mut seen = std::collections::HashSet::new();
            for event in &diff {
                prop_assert!(seen.insert(event.id().clone()));
                prop_assert!(b.contains(event.id()));
                prop_assert!(!a.contains(event.id()));
            }
            for event in b.events() {
                if !a.contains(event.id()) {
                    prop_assert!(seen.contains(event.id()));
                }
            }
        }
    }
}
