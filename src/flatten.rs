//! Flatten a configuration tree into `-`-joined path / leaf pairs.
//!
//! Mapping keys are visited in insertion order, sequence elements in index
//! order (the index becomes the path segment). Metadata keys are skipped at
//! every level. The result is rebuilt on every call.

use std::collections::HashMap;

use serde_yaml::Value;

use crate::types::{is_metadata_key, key_segment};

/// Separator between path segments in flattened keys and derived flag names.
pub const PATH_SEPARATOR: &str = "-";

/// Flatten a value into `(path, leaf)` pairs.
///
/// `{foo: {bar: 1}, list: [a, b]}` → `[("foo-bar", 1), ("list-0", a), ("list-1", b)]`
///
/// Paths are unique: when two leaves flatten to the same path (`a-b: 1` next
/// to `a: {b: 2}`), the later leaf's value replaces the earlier one in the
/// earlier one's position.
pub fn flatten(value: &Value) -> Vec<(String, Value)> {
    let mut walked = Vec::new();
    let mut path = Vec::new();
    walk(&mut path, value, &mut walked);

    let mut positions: HashMap<String, usize> = HashMap::with_capacity(walked.len());
    let mut out: Vec<(String, Value)> = Vec::with_capacity(walked.len());
    for (key, leaf) in walked {
        match positions.get(&key) {
            Some(&index) => out[index].1 = leaf,
            None => {
                positions.insert(key.clone(), out.len());
                out.push((key, leaf));
            }
        }
    }
    out
}

fn walk(path: &mut Vec<String>, value: &Value, out: &mut Vec<(String, Value)>) {
    match value {
        Value::Mapping(map) => {
            for (key, child) in map {
                let Some(segment) = key_segment(key) else {
                    continue;
                };
                if is_metadata_key(&segment) {
                    continue;
                }
                path.push(segment);
                walk(path, child, out);
                path.pop();
            }
        }
        Value::Sequence(items) => {
            for (index, child) in items.iter().enumerate() {
                path.push(index.to_string());
                walk(path, child, out);
                path.pop();
            }
        }
        Value::Tagged(tagged) => walk(path, &tagged.value, out),
        leaf => out.push((path.join(PATH_SEPARATOR), leaf.clone())),
    }
}
