use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("A configuration instance is already active; call registry::clear() first")]
    SingletonViolation,

    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("Conflicting option string: --{flag}")]
    FlagConflict { flag: String },

    #[cfg(feature = "clap")]
    #[error("{0}")]
    Usage(#[from] clap::Error),

    #[error("No config path given: pass -c/--config or call .config_path() on the builder")]
    MissingConfigPath,

    #[error("Failed to parse {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: serde_yaml::Error,
    },

    #[error("Failed to read {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Include cycle detected at {path}")]
    IncludeCycle { path: PathBuf },

    #[error("Invalid !include in {path}: {reason}")]
    InvalidInclude { path: PathBuf, reason: String },

    #[error("Invalid value for '{key}': {reason}")]
    InvalidValue { key: String, reason: String },
}
