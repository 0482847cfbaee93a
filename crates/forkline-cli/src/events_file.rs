//! JSON-lines event files: one event object per line, blank lines skipped.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::Path;

use anyhow::Context;
use forkline_types::Event;
use tracing::debug;

pub fn read_events(path: &Path) -> anyhow::Result<Vec<Event>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("failed to read event file {}", path.display()))?;
    let events = parse_events(&text).with_context(|| format!("in {}", path.display()))?;
    debug!(path = %path.display(), count = events.len(), "loaded events");
    Ok(events)
}

pub fn parse_events(text: &str) -> anyhow::Result<Vec<Event>> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| {
            Event::from_json(line).with_context(|| format!("line {}", index + 1))
        })
        .collect()
}

pub fn write_events(path: &Path, events: &[Event]) -> anyhow::Result<()> {
    let mut file = fs::File::create(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    for event in events {
        writeln!(file, "{}", event.to_json()?)?;
    }
    debug!(path = %path.display(), count = events.len(), "wrote events");
    Ok(())
}

/// Append one event to `path`, creating the file if needed.
pub fn append_event(path: &Path, event: &Event) -> anyhow::Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    writeln!(file, "{}", event.to_json()?)?;
    debug!(path = %path.display(), id = %event.id(), "appended event");
    Ok(())
}
