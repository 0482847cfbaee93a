use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::TypeError;
use crate::temporal::Timestamp;

/// Opaque event identifier, unique across the whole system.
///
/// Identifiers are assigned by the producer. Comparison is byte-lexicographic
/// over the UTF-8 encoding, which is the tie-break of the canonical order.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EventId(String);

impl EventId {
    /// Wrap a producer-assigned identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generate a fresh time-ordered identifier (UUID v7).
    pub fn generate() -> Self {
        Self(uuid::Uuid::now_v7().to_string())
    }

    /// The identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` if the identifier is the empty string.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for EventId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for EventId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for EventId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventId({})", self.0)
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The atomic, immutable unit of history.
///
/// An event carries an identifier, a timestamp, a type tag naming the kind of
/// mutation, and an application-defined payload. The payload is never
/// inspected by the log; only reducers give it meaning.
///
/// There are no setters: once built, an event is only ever copied.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    id: EventId,
    t: Timestamp,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: Value,
}

impl Event {
    /// Build an event from its four fields.
    pub fn new(
        id: impl Into<EventId>,
        t: impl Into<Timestamp>,
        kind: impl Into<String>,
        payload: Value,
    ) -> Self {
        Self {
            id: id.into(),
            t: t.into(),
            kind: kind.into(),
            payload,
        }
    }

    /// Build an event with a freshly generated identifier.
    pub fn generated(t: impl Into<Timestamp>, kind: impl Into<String>, payload: Value) -> Self {
        Self::new(EventId::generate(), t, kind, payload)
    }

    /// The producer-assigned identifier.
    pub fn id(&self) -> &EventId {
        &self.id
    }

    /// The event's position on the timeline.
    pub fn t(&self) -> Timestamp {
        self.t
    }

    /// The type tag (serialized as `"type"`).
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// The application-defined body, opaque to the log.
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// Check the fields a well-formed event must carry.
    ///
    /// The log itself never calls this; it is offered to callers that want
    /// to reject malformed events before appending them.
    pub fn check_well_formed(&self) -> Result<(), TypeError> {
        if self.id.is_empty() {
            return Err(TypeError::EmptyId);
        }
        if self.kind.is_empty() {
            return Err(TypeError::EmptyKind(self.id.to_string()));
        }
        Ok(())
    }

    /// Parse an event from its JSON encoding.
    pub fn from_json(json: &str) -> Result<Self, TypeError> {
        serde_json::from_str(json).map_err(|e| TypeError::Serialization(e.to_string()))
    }

    /// Encode this event as a single line of JSON.
    pub fn to_json(&self) -> Result<String, TypeError> {
        serde_json::to_string(self).map_err(|e| TypeError::Serialization(e.to_string()))
    }
}
