//! YAML file loading with `!include` support.
//!
//! A node tagged `!include <relative-path>` is replaced by the root node of the
//! referenced document, resolved relative to the directory of the file that
//! contains the tag. Includes nest to any depth.
//!
//! # Anchors across documents
//!
//! An included document may use aliases whose anchors are declared in any
//! document above it on the include chain. The child is parsed as the last
//! entry of a synthetic stream that carries every ancestor document first, so
//! the parser has already seen those anchors when it reaches the child.
//!
//! # Scalars
//!
//! Plain scalars resolve with the YAML 1.2 core schema: `true`/`false` (any
//! case) are booleans, while `yes`, `no`, `on` and `off` stay strings and
//! derive string flags.
//!
//! # Cycles
//!
//! The chain of canonicalized paths currently being loaded is tracked; a file
//! that includes itself directly or transitively fails with
//! [`ConfigError::IncludeCycle`]. The same file may still be included from
//! several sibling positions.

use std::path::{Path, PathBuf};

use serde_yaml::value::TaggedValue;
use serde_yaml::{Mapping, Value};
use tracing::debug;

use crate::error::ConfigError;

/// Tag that triggers file inclusion.
pub const INCLUDE_TAG: &str = "!include";

/// Load each file in order, resolving includes, and return its root mapping.
///
/// An empty document yields an empty mapping. Any other non-mapping root is an
/// error. Nothing is returned unless every file loads.
pub fn load_config_files(paths: &[PathBuf]) -> Result<Vec<(PathBuf, Mapping)>, ConfigError> {
    paths
        .iter()
        .map(|path| {
            let root = load_file(path)?;
            into_mapping(root, path).map(|mapping| (path.clone(), mapping))
        })
        .collect()
}

/// Load a single YAML file and resolve every `!include` inside it.
pub fn load_file(path: &Path) -> Result<Value, ConfigError> {
    let mut chain = Vec::new();
    load_in_context(path, &[], &mut chain)
}

fn load_in_context(
    path: &Path,
    ancestors: &[String],
    chain: &mut Vec<PathBuf>,
) -> Result<Value, ConfigError> {
    let canonical = path.canonicalize().map_err(|e| ConfigError::IoError {
        path: path.to_path_buf(),
        source: e,
    })?;
    if chain.contains(&canonical) {
        return Err(ConfigError::IncludeCycle {
            path: path.to_path_buf(),
        });
    }

    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::IoError {
        path: path.to_path_buf(),
        source: e,
    })?;

    let value = if ancestors.is_empty() {
        parse_document(&content, path)?
    } else {
        parse_in_context(ancestors, &content, path)?
    };

    let mut context = ancestors.to_vec();
    context.push(content);
    let base_dir = path.parent().unwrap_or_else(|| Path::new(""));

    chain.push(canonical);
    let resolved = resolve_includes(value, base_dir, path, &context, chain);
    chain.pop();
    resolved
}

fn parse_document(content: &str, path: &Path) -> Result<Value, ConfigError> {
    serde_yaml::from_str(content).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Parse `content` after all `ancestors`, returning only `content`'s root.
fn parse_in_context(ancestors: &[String], content: &str, path: &Path) -> Result<Value, ConfigError> {
    let mut stream = String::new();
    for document in ancestors.iter().map(String::as_str).chain([content]) {
        stream.push_str("-\n");
        for line in document.lines().filter(|line| !is_document_marker(line)) {
            stream.push_str("  ");
            stream.push_str(line);
            stream.push('\n');
        }
    }

    let mut documents: Vec<Value> = serde_yaml::from_str(&stream).map_err(|e| {
        ConfigError::ParseError {
            path: path.to_path_buf(),
            source: e,
        }
    })?;
    Ok(documents.pop().unwrap_or(Value::Null))
}

/// Stream-level lines that cannot appear inside a nested node.
fn is_document_marker(line: &str) -> bool {
    let trimmed = line.trim_end();
    trimmed == "---" || trimmed == "..." || trimmed.starts_with('%')
}

fn resolve_includes(
    value: Value,
    base_dir: &Path,
    path: &Path,
    context: &[String],
    chain: &mut Vec<PathBuf>,
) -> Result<Value, ConfigError> {
    match value {
        Value::Mapping(map) => {
            let mut resolved = Mapping::with_capacity(map.len());
            for (key, child) in map {
                resolved.insert(key, resolve_includes(child, base_dir, path, context, chain)?);
            }
            Ok(Value::Mapping(resolved))
        }
        Value::Sequence(items) => items
            .into_iter()
            .map(|child| resolve_includes(child, base_dir, path, context, chain))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Sequence),
        Value::Tagged(tagged) if tagged.tag == INCLUDE_TAG => {
            let Value::String(relative) = tagged.value else {
                return Err(ConfigError::InvalidInclude {
                    path: path.to_path_buf(),
                    reason: "expected a file path after !include".into(),
                });
            };
            let target = base_dir.join(&relative);
            debug!(from = %path.display(), include = %target.display(), "resolving include");
            load_in_context(&target, context, chain)
        }
        Value::Tagged(tagged) => {
            let TaggedValue { tag, value } = *tagged;
            let value = resolve_includes(value, base_dir, path, context, chain)?;
            Ok(Value::Tagged(Box::new(TaggedValue { tag, value })))
        }
        scalar => Ok(scalar),
    }
}

/// Convert a document root into the mapping the store works with.
pub fn into_mapping(root: Value, path: &Path) -> Result<Mapping, ConfigError> {
    match root {
        Value::Mapping(mapping) => Ok(mapping),
        Value::Null => Ok(Mapping::new()),
        other => Err(ConfigError::InvalidValue {
            key: path.display().to_string(),
            reason: format!("top-level document must be a mapping, found {other:?}"),
        }),
    }
}
