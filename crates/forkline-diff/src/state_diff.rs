//! State-level diff: compare two materialized key/value states.
//!
//! States are `BTreeMap<String, serde_json::Value>`, the shape produced by
//! key/value reducers. Changes are reported in ascending key order.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

/// The result of comparing two state maps.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct StateDiff {
    /// Changes, sorted by key.
    pub changes: Vec<StateChange>,
}

impl StateDiff {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the two states were equal.
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn additions(&self) -> usize {
        self.count(|c| matches!(c, StateChange::Added { .. }))
    }

    pub fn removals(&self) -> usize {
        self.count(|c| matches!(c, StateChange::Removed { .. }))
    }

    pub fn modifications(&self) -> usize {
        self.count(|c| matches!(c, StateChange::Modified { .. }))
    }

    fn count(&self, pred: impl Fn(&StateChange) -> bool) -> usize {
        self.changes.iter().filter(|c| pred(c)).count()
    }
}

/// A single key-level change between two states.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "change", rename_all = "snake_case")]
pub enum StateChange {
    /// Key present only in the new state.
    Added { key: String, value: Value },
    /// Key present only in the old state.
    Removed { key: String, value: Value },
    /// Key present in both with different values.
    Modified { key: String, old: Value, new: Value },
}

impl StateChange {
    /// The key this change concerns.
    pub fn key(&self) -> &str {
        match self {
            Self::Added { key, .. } | Self::Removed { key, .. } | Self::Modified { key, .. } => {
                key
            }
        }
    }
}

/// Compute the diff from `old` to `new`.
///
/// Walks both maps in key order at once, so the output is sorted by key and
/// the cost is linear in the combined size.
pub fn diff_states(old: &BTreeMap<String, Value>, new: &BTreeMap<String, Value>) -> StateDiff {
    let mut changes = Vec::new();
    let mut old_iter = old.iter().peekable();
    let mut new_iter = new.iter().peekable();

    loop {
        let order = match (old_iter.peek(), new_iter.peek()) {
            (Some((old_key, _)), Some((new_key, _))) => old_key.cmp(new_key),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => break,
        };

        match order {
            Ordering::Less => {
                if let Some((key, value)) = old_iter.next() {
                    changes.push(StateChange::Removed {
                        key: key.clone(),
                        value: value.clone(),
                    });
                }
            }
            Ordering::Greater => {
                if let Some((key, value)) = new_iter.next() {
                    changes.push(StateChange::Added {
                        key: key.clone(),
                        value: value.clone(),
                    });
                }
            }
            Ordering::Equal => {
                if let (Some((key, old_val)), Some((_, new_val))) =
                    (old_iter.next(), new_iter.next())
                {
                    if old_val != new_val {
                        changes.push(StateChange::Modified {
                            key: key.clone(),
                            old: old_val.clone(),
                            new: new_val.clone(),
                        });
                    }
                }
            }
        }
    }

    StateDiff { changes }
}
