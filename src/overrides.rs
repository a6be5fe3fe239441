//! Write a value into a nested mapping by key path.
//!
//! Used for path assignment on [`Config`](crate::Config) and for writing
//! caller-added command-line flags back into the configuration, where
//! `--foo_bar` becomes `{foo: {bar: ...}}`.

use serde_yaml::{Mapping, Value};

/// Set `segments` to `value` inside `map`, creating intermediate mappings.
///
/// Existing sibling keys along the path are kept. An intermediate value that
/// is not a mapping is replaced by one. An empty path is a no-op.
pub fn set_nested(map: &mut Mapping, segments: &[&str], value: Value) {
    let Some((leaf, parents)) = segments.split_last() else {
        return;
    };

    let mut current = map;
    for segment in parents {
        let slot = current.entry(Value::from(*segment)).or_insert(Value::Null);
        if !slot.is_mapping() {
            *slot = Value::Mapping(Mapping::new());
        }
        let Some(next) = slot.as_mapping_mut() else {
            return;
        };
        current = next;
    }

    current.insert(Value::from(*leaf), value);
}

/// Split a flag id on `_` into the path it is written to.
pub fn id_segments(id: &str) -> Vec<&str> {
    id.split('_').collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(yaml: &str) -> Mapping {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn flat_key() {
        let mut map = Mapping::new();
        set_nested(&mut map, &["host"], Value::from("0.0.0.0"));
        assert_eq!(map["host"].as_str().unwrap(), "0.0.0.0");
    }

    #[test]
    fn deep_nesting() {
        let mut map = Mapping::new();
        set_nested(&mut map, &["a", "b", "c", "d"], Value::from(42));
        assert_eq!(map["a"]["b"]["c"]["d"].as_i64().unwrap(), 42);
    }

    #[test]
    fn merges_into_existing_mapping() {
        let mut map = mapping("foo:\n  bar: 1\n");
        set_nested(&mut map, &["foo", "baz"], Value::from(2));
        assert_eq!(map, mapping("foo:\n  bar: 1\n  baz: 2\n"));
    }

    #[test]
    fn scalar_intermediate_replaced() {
        let mut map = mapping("foo: 1\n");
        set_nested(&mut map, &["foo", "bar"], Value::from(2));
        assert_eq!(map["foo"]["bar"].as_i64().unwrap(), 2);
    }

    #[test]
    fn last_write_wins() {
        let mut map = Mapping::new();
        set_nested(&mut map, &["port"], Value::from(3000));
        set_nested(&mut map, &["port"], Value::from(5000));
        assert_eq!(map["port"].as_i64().unwrap(), 5000);
    }

    #[test]
    fn empty_path_is_noop() {
        let mut map = mapping("a: 1\n");
        set_nested(&mut map, &[], Value::from(2));
        assert_eq!(map, mapping("a: 1\n"));
    }

    #[test]
    fn id_segments_split_on_underscore() {
        assert_eq!(id_segments("foo_bar_baz"), vec!["foo", "bar", "baz"]);
        assert_eq!(id_segments("plain"), vec!["plain"]);
    }
}
