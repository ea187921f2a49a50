//! Per-machine local path storage.
//!
//! A `local_path` column holds one of three shapes:
//!
//! - an empty string (no path on any machine),
//! - a plain path written before paths were tracked per machine,
//! - a JSON object mapping machine id to absolute path.
//!
//! Everything that reads or writes that column goes through this module so
//! the rest of the crate never touches the JSON directly. Malformed content is
//! never an error: it decodes as a legacy path or as an empty map.

use std::collections::BTreeMap;

use serde_json::Value;

/// Key holding a path stored before per-machine tracking existed.
/// It belongs to no machine in particular and is dropped on the first
/// per-machine write.
pub const LEGACY_KEY: &str = "__default__";

/// Machine id to local path.
pub type PathMap = BTreeMap<String, String>;

pub fn decode(raw: Option<&str>) -> PathMap {
    let Some(raw) = raw else {
        return PathMap::new();
    };
    let raw = raw.trim();
    if raw.is_empty() {
        return PathMap::new();
    }
    if let Ok(Value::Object(entries)) = serde_json::from_str::<Value>(raw) {
        return entries
            .into_iter()
            .filter_map(|(machine, value)| match value {
                Value::String(path) if !path.trim().is_empty() => {
                    Some((machine, path.trim().to_string()))
                }
                _ => None,
            })
            .collect();
    }
    PathMap::from([(LEGACY_KEY.to_string(), raw.to_string())])
}

/// An empty map encodes as `""`, not `"{}"`.
pub fn encode(map: &PathMap) -> String {
    if map.is_empty() {
        return String::new();
    }
    // A map of strings always serializes.
    serde_json::to_string(map).unwrap_or_default()
}

pub fn resolve_for_machine(map: &PathMap, machine: &str) -> String {
    map.get(machine).cloned().unwrap_or_default()
}

/// Decode the stored value and resolve it for `machine` in one step.
pub fn resolve_raw(raw: Option<&str>, machine: &str) -> String {
    resolve_for_machine(&decode(raw), machine)
}

/// Rewrite only `machine`'s slot of a stored value.
///
/// A non-blank `new_path` replaces the machine's entry and retires the legacy
/// entry; a blank one removes the machine's entry. Other machines' entries are
/// kept as they are.
pub fn update_for_machine(raw: Option<&str>, machine: &str, new_path: &str) -> String {
    let mut map = decode(raw);
    let new_path = new_path.trim();
    if new_path.is_empty() {
        map.remove(machine);
    } else {
        map.insert(machine.to_string(), new_path.to_string());
        map.remove(LEGACY_KEY);
    }
    map.retain(|_, path| !path.is_empty());
    encode(&map)
}

/// Stored value for a freshly created row.
pub fn for_new_entry(machine: &str, path: &str) -> String {
    update_for_machine(None, machine, path)
}
