//! The configuration store: key access, path access, and flattening.
//!
//! A [`Config`] owns one merged YAML mapping plus the list of files it was
//! loaded from. Loading lives in [`ConfigBuilder`](crate::ConfigBuilder),
//! serialization in [`Config::dump`].

use std::fmt;
use std::path::PathBuf;

use serde_yaml::{Mapping, Value};

use crate::error::ConfigError;
use crate::flatten;
use crate::overrides;
use crate::types::VERSION_KEY;

/// A loaded configuration mapping.
///
/// Keys are kept in insertion order. Metadata keys (`_version`, `_timestamp`,
/// `_git`) live in the same mapping and are included in dumps, but not in
/// [`flatten`](Self::flatten) output or derived command-line flags.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    conf: Mapping,
    filenames: Vec<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_mapping(Mapping::new())
    }
}

impl Config {
    /// Wrap an existing mapping, initializing `_version` to 1 if absent.
    pub fn from_mapping(conf: Mapping) -> Self {
        Self::with_sources(conf, Vec::new())
    }

    pub(crate) fn with_sources(mut conf: Mapping, filenames: Vec<PathBuf>) -> Self {
        if !conf.contains_key(VERSION_KEY) {
            conf.insert(Value::from(VERSION_KEY), Value::from(1));
        }
        Self { conf, filenames }
    }

    /// Top-level value, or `None` if absent.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.conf.get(key)
    }

    /// Top-level value, or `default` if absent. Never fails.
    pub fn get_or<'a>(&'a self, key: &str, default: &'a Value) -> &'a Value {
        self.conf.get(key).unwrap_or(default)
    }

    /// Top-level value with indexing semantics: absent keys are an error.
    pub fn item(&self, key: &str) -> Result<&Value, ConfigError> {
        self.conf
            .get(key)
            .ok_or_else(|| ConfigError::KeyNotFound(key.into()))
    }

    pub fn item_mut(&mut self, key: &str) -> Result<&mut Value, ConfigError> {
        self.conf
            .get_mut(key)
            .ok_or_else(|| ConfigError::KeyNotFound(key.into()))
    }

    /// Create or overwrite a top-level key. The value's shape is not checked.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.conf.insert(Value::from(key), value.into());
    }

    pub fn contains(&self, key: &str) -> bool {
        self.conf.contains_key(key)
    }

    /// Navigate nested mappings (and sequences, by index) along `path`.
    pub fn get_path(&self, path: &[&str]) -> Result<&Value, ConfigError> {
        let Some((first, rest)) = path.split_first() else {
            return Err(ConfigError::KeyNotFound(String::new()));
        };
        let mut current = self.item(first)?;
        for segment in rest {
            current = match current {
                Value::Mapping(map) => map.get(*segment),
                Value::Sequence(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
                _ => None,
            }
            .ok_or_else(|| ConfigError::KeyNotFound(path.join(".")))?;
        }
        Ok(current)
    }

    pub fn get_path_mut(&mut self, path: &[&str]) -> Result<&mut Value, ConfigError> {
        let Some((first, rest)) = path.split_first() else {
            return Err(ConfigError::KeyNotFound(String::new()));
        };
        let mut current = self
            .conf
            .get_mut(*first)
            .ok_or_else(|| ConfigError::KeyNotFound(path.join(".")))?;
        for segment in rest {
            current = match current {
                Value::Mapping(map) => map.get_mut(*segment),
                Value::Sequence(items) => {
                    segment.parse::<usize>().ok().and_then(|i| items.get_mut(i))
                }
                _ => None,
            }
            .ok_or_else(|| ConfigError::KeyNotFound(path.join(".")))?;
        }
        Ok(current)
    }

    /// Write `value` at `path`, creating intermediate mappings as needed.
    /// Intermediate values that are not mappings are replaced.
    pub fn set_path(&mut self, path: &[&str], value: impl Into<Value>) {
        overrides::set_nested(&mut self.conf, path, value.into());
    }

    /// Flatten the whole mapping, or the sub-tree at `key`, into
    /// `-`-joined path / leaf pairs. Metadata keys are skipped.
    pub fn flatten(&self, key: Option<&str>) -> Result<Vec<(String, Value)>, ConfigError> {
        match key {
            Some(key) => Ok(flatten::flatten(self.item(key)?)),
            None => Ok(flatten::flatten(&Value::Mapping(self.conf.clone()))),
        }
    }

    /// Current revision counter.
    pub fn version(&self) -> Option<i64> {
        self.conf.get(VERSION_KEY).and_then(Value::as_i64)
    }

    pub fn mapping(&self) -> &Mapping {
        &self.conf
    }

    pub fn mapping_mut(&mut self) -> &mut Mapping {
        &mut self.conf
    }

    /// Files the mapping was loaded from, in merge order.
    pub fn filenames(&self) -> &[PathBuf] {
        &self.filenames
    }
}

impl fmt::Display for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let files: Vec<String> = self
            .filenames
            .iter()
            .map(|p| p.display().to_string())
            .collect();
        let conf = serde_yaml::to_string(&self.conf).unwrap_or_else(|_| format!("{:?}", self.conf));
        write!(f, "filenames:{}\nconf:{}", files.join(","), conf)
    }
}
