//! Config dumping: bump the revision counter and serialize to block-style YAML.
//!
//! Mapping keys are sorted recursively so that two dumps of equal mappings are
//! byte-identical regardless of insertion order. Parent directories of the
//! target file are created as needed.

use std::path::Path;

use serde_yaml::{Mapping, Value};
use tracing::info;

use crate::error::ConfigError;
use crate::ops::Config;
use crate::types::{VERSION_KEY, key_segment};

impl Config {
    /// Increment `_version`, serialize the whole mapping (metadata included),
    /// optionally write it to `filename`, and return the YAML text.
    pub fn dump(&mut self, filename: Option<&Path>) -> Result<String, ConfigError> {
        self.bump_version()?;
        let text = render(self.mapping())?;

        if let Some(path) = filename {
            write_file(path, &text)?;
            info!(path = %path.display(), "config dumped");
        }
        Ok(text)
    }

    fn bump_version(&mut self) -> Result<(), ConfigError> {
        let next = match self.get(VERSION_KEY) {
            None => 1,
            Some(value) => {
                value
                    .as_i64()
                    .ok_or_else(|| ConfigError::InvalidValue {
                        key: VERSION_KEY.into(),
                        reason: format!("expected an integer, found {value:?}"),
                    })?
                    + 1
            }
        };
        self.set(VERSION_KEY, next);
        Ok(())
    }
}

/// Pure function: render a mapping as block-style YAML with sorted keys.
pub fn render(mapping: &Mapping) -> Result<String, ConfigError> {
    let sorted = sort_keys(Value::Mapping(mapping.clone()));
    serde_yaml::to_string(&sorted).map_err(|e| ConfigError::InvalidValue {
        key: "<dump>".into(),
        reason: e.to_string(),
    })
}

fn sort_keys(value: Value) -> Value {
    match value {
        Value::Mapping(map) => {
            let mut entries: Vec<(Value, Value)> = map
                .into_iter()
                .map(|(key, child)| (key, sort_keys(child)))
                .collect();
            entries.sort_by_cached_key(|(key, _)| key_segment(key).unwrap_or_else(|| format!("{key:?}")));
            Value::Mapping(entries.into_iter().collect())
        }
        Value::Sequence(items) => Value::Sequence(items.into_iter().map(sort_keys).collect()),
        other => other,
    }
}

fn write_file(path: &Path, text: &str) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::IoError {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    std::fs::write(path, text).map_err(|e| ConfigError::IoError {
        path: path.to_path_buf(),
        source: e,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::test::{BASIC_YAML, RegistryGuard, write_fixture};
    use crate::registry;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn dump_bumps_version_each_call() {
        let dir = TempDir::new().unwrap();
        let path = write_fixture(&dir, "basic.yaml", BASIC_YAML);
        let mut config = Config::builder().path(path).load().unwrap();
        assert_eq!(config.version(), Some(1));

        for expected in 2..=4 {
            let text = config.dump(None).unwrap();
            assert_eq!(config.version(), Some(expected));
            assert!(text.starts_with(&format!("_version: {expected}\n")));
        }
    }

    #[test]
    fn dump_matches_expected_text() {
        let dir = TempDir::new().unwrap();
        let path = write_fixture(&dir, "basic.yaml", BASIC_YAML);
        let mut config = Config::builder().path(path).load().unwrap();

        let foo = config.item_mut("foo").unwrap();
        foo["bar"] = serde_yaml::from_str("test: 10").unwrap();
        foo["baz"] = Value::from(3);

        assert_eq!(
            config.dump(None).unwrap(),
            "_version: 2\nfoo:\n  bar:\n    test: 10\n  baz: 3\n"
        );
        assert_eq!(
            config.dump(None).unwrap(),
            "_version: 3\nfoo:\n  bar:\n    test: 10\n  baz: 3\n"
        );
    }

    #[test]
    fn dump_round_trips_through_file() {
        let _guard = RegistryGuard::new();
        let dir = TempDir::new().unwrap();
        let path = write_fixture(&dir, "basic.yaml", BASIC_YAML);

        let handle = Config::builder().path(&path).install().unwrap();
        {
            let mut config = handle.borrow_mut();
            config.set_path(&["foo", "bar"], serde_yaml::from_str::<Value>("test: 10").unwrap());
            config.set_path(&["foo", "baz"], 3);
            config.dump(Some(path.as_path())).unwrap();
        }
        registry::clear();

        let handle = Config::builder().path(&path).install().unwrap();
        let config = handle.borrow();
        assert_eq!(config.get_path(&["foo", "bar", "test"]).unwrap().as_i64(), Some(10));
        assert_eq!(config.get_path(&["foo", "baz"]).unwrap().as_i64(), Some(3));
        assert_eq!(config.version(), Some(2));
    }

    #[test]
    fn dump_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("out").join("nested").join("config.yaml");
        let mut config = Config::default();
        let text = config.dump(Some(target.as_path())).unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), text);
    }

    #[test]
    fn dump_is_block_style() {
        let mut config = Config::from_mapping(
            serde_yaml::from_str("list: [1, 2]\nmap: {a: 1}\n").unwrap(),
        );
        let text = config.dump(None).unwrap();
        assert!(!text.contains('['));
        assert!(!text.contains('{'));
        assert!(text.contains("map:\n  a: 1\n"));
    }

    #[test]
    fn non_integer_version_rejected() {
        let mut config = Config::from_mapping(serde_yaml::from_str("_version: abc\n").unwrap());
        assert!(matches!(
            config.dump(None),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn render_sorts_nested_keys() {
        let mapping: Mapping = serde_yaml::from_str("b:\n  z: 1\n  a: 2\na: 0\n").unwrap();
        assert_eq!(render(&mapping).unwrap(), "a: 0\nb:\n  a: 2\n  z: 1\n");
    }
}
