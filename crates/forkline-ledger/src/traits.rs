use forkline_types::Event;

/// Read boundary shared by anything that holds a list of events.
pub trait EventSource {
    /// Value copy of the held events, in insertion order.
    fn snapshot(&self) -> Vec<Event>;
}
