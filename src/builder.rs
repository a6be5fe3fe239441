use std::path::PathBuf;
use std::time::Duration;

use serde_yaml::{Mapping, Value};
use tracing::{debug, info};

use crate::error::ConfigError;
use crate::file;
use crate::git;
use crate::merge::deep_merge;
use crate::ops::Config;
use crate::registry::{self, ConfigHandle};
use crate::types::{GIT_KEY, TIMESTAMP_KEY};

const TIMESTAMP_FORMAT: &str = "%Y/%m/%d %H:%M:%S";
const DEFAULT_GIT_TIMEOUT: Duration = Duration::from_secs(5);

impl Config {
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::new()
    }
}

/// Builder for loading a [`Config`] from zero or more YAML files.
///
/// Files are deep-merged left to right: later files override leaf values,
/// sibling keys from earlier files survive. After merging, `_version` is
/// initialized to 1 if absent, and the optional `_timestamp` and `_git`
/// metadata are stamped.
#[derive(Debug, Clone)]
pub struct ConfigBuilder {
    paths: Vec<PathBuf>,
    skip_timestamp: bool,
    skip_git_info: bool,
    git_dir: Option<PathBuf>,
    git_timeout: Duration,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigBuilder {
    fn new() -> Self {
        Self {
            paths: Vec::new(),
            skip_timestamp: true,
            skip_git_info: true,
            git_dir: None,
            git_timeout: DEFAULT_GIT_TIMEOUT,
        }
    }

    /// Append one file to the merge list.
    pub fn path(mut self, path: impl Into<PathBuf>) -> Self {
        self.paths.push(path.into());
        self
    }

    /// Append several files to the merge list, in order.
    pub fn paths<P: Into<PathBuf>>(mut self, paths: impl IntoIterator<Item = P>) -> Self {
        self.paths.extend(paths.into_iter().map(Into::into));
        self
    }

    /// Skip stamping `_timestamp` (default: `true`).
    pub fn skip_timestamp(mut self, skip: bool) -> Self {
        self.skip_timestamp = skip;
        self
    }

    /// Skip collecting `_git` (default: `true`).
    pub fn skip_git_info(mut self, skip: bool) -> Self {
        self.skip_git_info = skip;
        self
    }

    /// Repository directory for `_git` collection (default: current directory).
    pub fn git_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.git_dir = Some(dir.into());
        self
    }

    /// Per-command timeout for `_git` collection (default: 5 seconds).
    pub fn git_timeout(mut self, timeout: Duration) -> Self {
        self.git_timeout = timeout;
        self
    }

    /// Load and merge every file, then stamp metadata.
    pub fn load(self) -> Result<Config, ConfigError> {
        let mut merged = Mapping::new();
        if !self.paths.is_empty() {
            let names: Vec<String> = self.paths.iter().map(|p| p.display().to_string()).collect();
            info!(files = %names.join(","), "loading config");
            for (_, mapping) in file::load_config_files(&self.paths)? {
                merged = deep_merge(merged, mapping);
            }
        }

        let mut config = Config::with_sources(merged, self.paths.clone());

        if !self.skip_timestamp {
            let now = chrono::Local::now().format(TIMESTAMP_FORMAT).to_string();
            config.set(TIMESTAMP_KEY, now);
        }
        if !self.skip_git_info {
            self.stamp_git_info(&mut config);
        }
        Ok(config)
    }

    /// Load and make the result the active instance.
    ///
    /// Fails with [`ConfigError::SingletonViolation`] before touching any file
    /// if an instance is already active.
    pub fn install(self) -> Result<ConfigHandle, ConfigError> {
        if registry::is_active() {
            return Err(ConfigError::SingletonViolation);
        }
        registry::install(self.load()?)
    }

    fn stamp_git_info(&self, config: &mut Config) {
        let dir = match &self.git_dir {
            Some(dir) => dir.clone(),
            None => match std::env::current_dir() {
                Ok(dir) => dir,
                Err(e) => {
                    debug!(error = %e, "no working directory for git metadata");
                    return;
                }
            },
        };
        let Some(info) = git::collect(&dir, self.git_timeout) else {
            return;
        };
        match serde_yaml::to_value(&info) {
            Ok(value @ Value::Mapping(_)) => config.set(GIT_KEY, value),
            Ok(_) => {}
            Err(e) => debug!(error = %e, "failed to serialize git metadata"),
        }
    }
}
