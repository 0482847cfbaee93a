//! Built-in key/value reducer used by the command line.
//!
//! `add`/`set` assign `payload.value` to `payload.key`, `remove`/`delete`
//! drop `payload.key`, and any other type is ignored.

use std::collections::BTreeMap;

use forkline_ledger::{Reducer, ReducerError};
use forkline_types::Event;
use serde_json::Value;

pub type KvState = BTreeMap<String, Value>;

pub fn kv_reducer() -> Reducer<KvState> {
    Reducer::new(KvState::new(), apply)
}

fn apply(mut state: KvState, event: &Event) -> Result<KvState, ReducerError> {
    match event.kind() {
        "add" | "set" => {
            let key = key_of(event)?;
            let value = event.payload().get("value").cloned().unwrap_or(Value::Null);
            state.insert(key, value);
        }
        "remove" | "delete" => {
            let key = key_of(event)?;
            state.remove(&key);
        }
        _ => {}
    }
    Ok(state)
}

fn key_of(event: &Event) -> Result<String, ReducerError> {
    event
        .payload()
        .get("key")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ReducerError::new(event, "payload.key must be a string"))
}
