use serde_yaml::Value;

/// Keys starting with this character hold bookkeeping data and are skipped by
/// flattening and flag derivation.
pub const METADATA_PREFIX: char = '_';

/// Revision counter, bumped by every dump.
pub const VERSION_KEY: &str = "_version";
/// Load time, `YYYY/MM/DD HH:MM:SS` in local time.
pub const TIMESTAMP_KEY: &str = "_timestamp";
/// Repository metadata collected at load time.
pub const GIT_KEY: &str = "_git";

pub fn is_metadata_key(key: &str) -> bool {
    key.starts_with(METADATA_PREFIX)
}

/// Render a mapping key as a path segment. YAML allows non-string keys
/// (`1: x`, `true: y`); those are rendered the way they would be written.
pub fn key_segment(key: &Value) -> Option<String> {
    match key {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
