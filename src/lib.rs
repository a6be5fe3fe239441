//! YAML configuration with file includes, deep merging, and command-line
//! flags derived from the loaded data.
//!
//! One [`Config`] is active at a time. It is loaded from one or more YAML
//! files, deep-merged left to right, and shared through a [`ConfigHandle`]
//! from the [`registry`]. A [`ConfigParser`] turns every leaf of the loaded
//! mapping into a `--<dashed-path>` flag and writes parsed values back into
//! the active configuration:
//!
//! ```ignore
//! let mut parser = ConfigParser::builder().build()?;   // reads -c/--config
//! parser.add_argument("dump", serde_yaml::Value::Null, Some("dump path"))?;
//! let args = parser.parse();
//!
//! let config = registry::get_instance();
//! let depth = config.borrow().get_path(&["model", "depth"])?.clone();
//! config.borrow_mut().dump(Some(Path::new("out/config.yaml")))?;
//! ```
//!
//! # Loading
//!
//! - **`!include path.yaml`** replaces the tagged node with the root of
//!   another document, resolved relative to the including file. Anchors
//!   declared in an including document are visible inside the included one.
//!   Include cycles are an error.
//! - **Multiple files** are deep-merged: nested mappings merge key by key,
//!   any other value in a later file replaces the earlier one.
//! - **Metadata** keys start with `_`. `_version` starts at 1 and is bumped
//!   by every [`Config::dump`]; `_timestamp` and `_git` are stamped on request
//!   (see [`ConfigBuilder`]). Metadata is dumped but never flattened or turned
//!   into flags.
//!
//! # Command line
//!
//! Behind the `clap` Cargo feature (on by default). Flag types follow the
//! loaded values: integers, floats, strings, booleans (`yes/true/t/y/1`,
//! `no/false/f/n/0`), and lists taking zero or more values. Flags not given
//! on the command line keep the file value. See [`ConfigParser`] for eager
//! and lazy loading.
//!
//! # Metrics
//!
//! [`AverageMeter`] keeps weighted running means per key and hands them to a
//! [`MetricsSink`] on reset. It does not depend on the rest of the crate.

pub mod error;
pub mod types;

mod builder;
#[cfg(feature = "clap")]
mod cli;
mod file;
mod flatten;
pub mod git;
mod merge;
pub mod meter;
mod ops;
mod overrides;
mod persist;
pub mod registry;

#[cfg(test)]
mod fixtures;

pub use builder::ConfigBuilder;
#[cfg(feature = "clap")]
pub use cli::{ConfigParser, ConfigParserBuilder, ParsedArgs};
pub use error::ConfigError;
pub use meter::{AverageMeter, MetricsSink};
pub use ops::Config;
pub use registry::ConfigHandle;
