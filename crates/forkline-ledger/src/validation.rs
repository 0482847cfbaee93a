use std::collections::HashMap;

use forkline_types::{Event, EventId, TypeError};
use serde::Serialize;

use crate::traits::EventSource;

/// Result of validating an event list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub event_count: u64,
    pub distinct_ids: u64,
    pub violations: Vec<Violation>,
}

impl ValidationReport {
    /// Returns `true` if no check failed.
    pub fn is_valid(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn count(&self, kind: ViolationKind) -> usize {
        self.violations.iter().filter(|v| v.kind == kind).count()
    }
}

/// A specific problem found at one position of the list.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Violation {
    /// Index in the list as given (insertion order).
    pub position: usize,
    pub event: EventId,
    pub kind: ViolationKind,
    pub description: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationKind {
    EmptyId,
    EmptyKind,
    DuplicateId,
}

/// Caller-side checks for event lists.
///
/// Appending and retroactive insertion accept anything; callers that want
/// malformed or duplicate events rejected run this first.
pub struct EventValidator;

impl EventValidator {
    pub fn validate(events: &[Event]) -> ValidationReport {
        let mut violations = Vec::new();
        let mut first_seen: HashMap<&EventId, usize> = HashMap::new();

        for (position, event) in events.iter().enumerate() {
            if let Err(err) = event.check_well_formed() {
                let kind = match err {
                    TypeError::EmptyId => ViolationKind::EmptyId,
                    _ => ViolationKind::EmptyKind,
                };
                violations.push(Violation {
                    position,
                    event: event.id().clone(),
                    kind,
                    description: err.to_string(),
                });
            }

            match first_seen.get(event.id()) {
                Some(&first) => violations.push(Violation {
                    position,
                    event: event.id().clone(),
                    kind: ViolationKind::DuplicateId,
                    description: format!("id {} already used at position {first}", event.id()),
                }),
                None => {
                    first_seen.insert(event.id(), position);
                }
            }
        }

        ValidationReport {
            event_count: events.len() as u64,
            distinct_ids: first_seen.len() as u64,
            violations,
        }
    }

    /// Validate the current contents of a store or branch.
    pub fn validate_source<L: EventSource>(source: &L) -> ValidationReport {
        Self::validate(&source.snapshot())
    }
}
