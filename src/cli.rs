//! Clap adapter: command-line flags derived from the loaded configuration.
//!
//! This module is compiled only when the `clap` Cargo feature is enabled (on
//! by default). [`ConfigParser`] owns a [`clap::Command`] with a `-c/--config`
//! option. Once a configuration is loaded it registers one `--<dashed-path>`
//! flag per non-metadata leaf key:
//!
//! ```text
//! model:            --model-name <model_name>
//!   name: resnet    --model-depth <model_depth>
//!   depth: 50       --milestones [<milestones>...]
//! milestones: [30, 60, 90]
//! ```
//!
//! After a successful parse, values given on the command line are written
//! back into the active [`Config`](crate::Config) at their nested position;
//! absent flags keep the value from the file. Flags added by the caller with
//! [`ConfigParser::add_argument`] are written back by splitting the flag id on
//! `_`, so `--foo_bar` lands at `foo.bar`.
//!
//! In eager mode (the default) the configuration is loaded when the parser is
//! built. In lazy mode loading and flag derivation wait for the first parse,
//! which takes the `-c` paths from the arguments it is given.

use std::ffi::OsString;
use std::path::PathBuf;

use clap::builder::ValueParser;
use clap::error::ErrorKind;
use clap::parser::ValueSource;
use clap::{Arg, ArgMatches, Command};
use serde::Serialize;
use serde_yaml::{Mapping, Value};
use tracing::{debug, info};

use crate::error::ConfigError;
use crate::flatten::PATH_SEPARATOR;
use crate::ops::Config;
use crate::overrides::id_segments;
use crate::registry::{self, ConfigHandle};
use crate::types::{is_metadata_key, key_segment};

const CONFIG_ID: &str = "config";
const RESERVED_IDS: &[&str] = &[CONFIG_ID, "help"];

/// Builder for [`ConfigParser`].
#[derive(Debug, Clone)]
pub struct ConfigParserBuilder {
    paths: Vec<PathBuf>,
    lazy: bool,
    name: Option<String>,
    about: Option<String>,
    skip_timestamp: bool,
    skip_git_info: bool,
}

impl ConfigParserBuilder {
    fn new() -> Self {
        Self {
            paths: Vec::new(),
            lazy: false,
            name: None,
            about: None,
            skip_timestamp: true,
            skip_git_info: true,
        }
    }

    /// Load this file when no `-c` is given. Repeat to merge several files.
    /// With at least one path, `-c/--config` becomes optional.
    pub fn config_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.paths.push(path.into());
        self
    }

    /// Defer loading and flag derivation to the first parse.
    pub fn lazy(mut self, lazy: bool) -> Self {
        self.lazy = lazy;
        self
    }

    /// Program name shown in usage and help.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn about(mut self, about: impl Into<String>) -> Self {
        self.about = Some(about.into());
        self
    }

    pub fn skip_timestamp(mut self, skip: bool) -> Self {
        self.skip_timestamp = skip;
        self
    }

    pub fn skip_git_info(mut self, skip: bool) -> Self {
        self.skip_git_info = skip;
        self
    }

    /// Build the parser. In eager mode, `-c` paths are read from the live
    /// process arguments when no path was given to the builder.
    pub fn build(self) -> Result<ConfigParser, ConfigError> {
        let args: Vec<OsString> = std::env::args_os().skip(1).collect();
        self.build_with(&args)
    }

    /// Like [`build`](Self::build), reading `-c` paths from `args` instead.
    /// The first element is the program name, as with
    /// [`ConfigParser::try_parse_from`].
    pub fn build_from<I, T>(self, args: I) -> Result<ConfigParser, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        let args: Vec<OsString> = args.into_iter().skip(1).map(Into::into).collect();
        self.build_with(&args)
    }

    fn build_with(self, args: &[OsString]) -> Result<ConfigParser, ConfigError> {
        let name = self
            .name
            .unwrap_or_else(|| env!("CARGO_PKG_NAME").to_string());
        let mut command = Command::new(name).arg(config_arg(self.paths.is_empty()));
        if let Some(about) = self.about {
            command = command.about(about);
        }

        let mut parser = ConfigParser {
            command,
            flags: Vec::new(),
            explicit_paths: self.paths,
            snapshot: Mapping::new(),
            handle: None,
            skip_timestamp: self.skip_timestamp,
            skip_git_info: self.skip_git_info,
        };

        if !self.lazy {
            let paths = if parser.explicit_paths.is_empty() {
                scan_config_paths(args)
            } else {
                parser.explicit_paths.clone()
            };
            if paths.is_empty() {
                return Err(ConfigError::MissingConfigPath);
            }
            parser.load(paths)?;
        }
        Ok(parser)
    }
}

/// Command-line parser synchronized with the active configuration.
#[derive(Debug)]
pub struct ConfigParser {
    command: Command,
    flags: Vec<FlagSpec>,
    explicit_paths: Vec<PathBuf>,
    snapshot: Mapping,
    handle: Option<ConfigHandle>,
    skip_timestamp: bool,
    skip_git_info: bool,
}

impl ConfigParser {
    pub fn builder() -> ConfigParserBuilder {
        ConfigParserBuilder::new()
    }

    /// Register a caller-defined flag. The value type is taken from
    /// `default`; a `null` default gives an optional string flag.
    ///
    /// Fails with [`ConfigError::FlagConflict`] if the flag id or long name
    /// is already taken.
    pub fn add_argument(
        &mut self,
        name: &str,
        default: impl Into<Value>,
        help: Option<&str>,
    ) -> Result<(), ConfigError> {
        let long = name.trim_start_matches('-');
        let flag = FlagSpec::new(
            long.replace('-', "_"),
            long.to_string(),
            default.into(),
            FlagOrigin::Added,
            help.map(str::to_string),
        );
        self.register(flag)
    }

    /// Parse the live process arguments, exiting on usage errors.
    pub fn parse(&mut self) -> ParsedArgs {
        self.parse_from(std::env::args_os())
    }

    /// Parse `args`, exiting with a diagnostic on any error.
    pub fn parse_from<I, T>(&mut self, args: I) -> ParsedArgs
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        match self.try_parse_from(args) {
            Ok(parsed) => parsed,
            Err(ConfigError::Usage(err)) => err.exit(),
            Err(other) => self.command.error(ErrorKind::Io, other).exit(),
        }
    }

    pub fn try_parse(&mut self) -> Result<ParsedArgs, ConfigError> {
        self.try_parse_from(std::env::args_os())
    }

    /// Parse `args` (first element is the program name) and write the
    /// resolved values back into the configuration.
    pub fn try_parse_from<I, T>(&mut self, args: I) -> Result<ParsedArgs, ConfigError>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        let args: Vec<OsString> = args.into_iter().map(Into::into).collect();

        if self.handle.is_none() {
            let mut paths = scan_config_paths(args.get(1..).unwrap_or_default());
            if paths.is_empty() {
                paths = self.explicit_paths.clone();
            }
            if paths.is_empty() {
                return Err(self
                    .command
                    .error(
                        ErrorKind::MissingRequiredArgument,
                        "the following required arguments were not provided:\n  --config <PATH>...",
                    )
                    .into());
            }
            self.load(paths)?;
        }

        let matches = self.command.try_get_matches_from_mut(args)?;
        let config: Vec<PathBuf> = matches
            .get_many::<PathBuf>(CONFIG_ID)
            .map(|paths| paths.cloned().collect())
            .unwrap_or_default();
        let mut values = Mapping::new();
        for flag in &self.flags {
            values.insert(Value::from(flag.id.clone()), flag.resolve(&matches));
        }

        if let Some(handle) = &self.handle {
            let mut target = handle.borrow_mut();
            self.write_back(&mut target, &values);
        }

        Ok(ParsedArgs { config, values })
    }

    /// Rendered `--help` text.
    pub fn render_help(&mut self) -> String {
        self.command.render_help().to_string()
    }

    /// The configuration this parser writes into, once loaded.
    pub fn config(&self) -> Option<ConfigHandle> {
        self.handle.clone()
    }

    /// Ids of every registered flag, derived ones first in walk order.
    pub fn flag_ids(&self) -> impl Iterator<Item = &str> {
        self.flags.iter().map(|flag| flag.id.as_str())
    }

    /// Load, derive and check every flag before anything is committed. On
    /// error the registry, the command and the flag list are left untouched.
    fn load(&mut self, paths: Vec<PathBuf>) -> Result<(), ConfigError> {
        if registry::is_active() {
            return Err(ConfigError::SingletonViolation);
        }
        let config = Config::builder()
            .paths(paths)
            .skip_timestamp(self.skip_timestamp)
            .skip_git_info(self.skip_git_info)
            .load()?;

        let derived = derive_flags(config.mapping());
        for (i, flag) in derived.iter().enumerate() {
            self.check_available(flag, &derived[..i])?;
        }

        let snapshot = config.mapping().clone();
        let handle = registry::install(config)?;
        self.snapshot = snapshot;
        self.handle = Some(handle);
        for flag in derived {
            self.commit(flag);
        }
        info!(flags = self.flags.len(), "derived command-line flags");
        Ok(())
    }

    fn register(&mut self, flag: FlagSpec) -> Result<(), ConfigError> {
        self.check_available(&flag, &[])?;
        self.commit(flag);
        Ok(())
    }

    /// Fail if `flag` collides with a reserved name or with any registered
    /// or `pending` flag.
    fn check_available(&self, flag: &FlagSpec, pending: &[FlagSpec]) -> Result<(), ConfigError> {
        let taken = RESERVED_IDS.contains(&flag.id.as_str())
            || RESERVED_IDS.contains(&flag.long.as_str())
            || self
                .flags
                .iter()
                .chain(pending)
                .any(|other| other.id == flag.id || other.long == flag.long);
        if taken {
            return Err(ConfigError::FlagConflict {
                flag: flag.long.clone(),
            });
        }
        Ok(())
    }

    fn commit(&mut self, flag: FlagSpec) {
        debug!(flag = %flag.long, "registering flag");
        self.command = std::mem::take(&mut self.command).arg(flag.to_arg());
        self.flags.push(flag);
    }

    fn write_back(&self, config: &mut Config, values: &Mapping) {
        for (key, original) in &self.snapshot {
            let Some(segment) = key_segment(key) else {
                continue;
            };
            if is_metadata_key(&segment) {
                continue;
            }
            let rebuilt = rebuild(&segment, original, values);
            config.mapping_mut().insert(key.clone(), rebuilt);
        }

        for flag in self.flags.iter().filter(|f| f.origin == FlagOrigin::Added) {
            if let Some(value) = values.get(flag.id.as_str()) {
                config.set_path(&id_segments(&flag.id), value.clone());
            }
        }
    }
}

/// Rebuild `original` from parsed flag values. Leaves read the flag `id`;
/// mappings recurse with `_`-joined ids. Nested metadata keys are kept as is.
fn rebuild(id: &str, original: &Value, values: &Mapping) -> Value {
    match original {
        Value::Mapping(children) => {
            let mut out = Mapping::new();
            for (key, child) in children {
                let value = match key_segment(key) {
                    Some(segment) if !is_metadata_key(&segment) => {
                        rebuild(&format!("{id}_{segment}"), child, values)
                    }
                    _ => child.clone(),
                };
                out.insert(key.clone(), value);
            }
            Value::Mapping(out)
        }
        _ => values.get(id).cloned().unwrap_or_else(|| original.clone()),
    }
}

/// Values of one successful parse, keyed by flag id (`_`-joined path).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedArgs {
    config: Vec<PathBuf>,
    values: Mapping,
}

impl ParsedArgs {
    pub fn get(&self, id: &str) -> Option<&Value> {
        self.values.get(id)
    }

    /// Paths given to `-c/--config`, empty if the flag was absent.
    pub fn config_paths(&self) -> &[PathBuf] {
        &self.config
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.values
            .iter()
            .filter_map(|(key, value)| key.as_str().map(|key| (key, value)))
    }
}

fn config_arg(required: bool) -> Arg {
    Arg::new(CONFIG_ID)
        .short('c')
        .long(CONFIG_ID)
        .value_name("PATH")
        .num_args(1..)
        .value_parser(clap::value_parser!(PathBuf))
        .required(required)
        .help("set config filepath")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LeafKind {
    String,
    Integer,
    Float,
    Boolean,
}

impl LeafKind {
    fn of(value: &Value) -> Self {
        match value {
            Value::Bool(_) => Self::Boolean,
            Value::Number(n) if n.is_f64() => Self::Float,
            Value::Number(_) => Self::Integer,
            Value::Tagged(tagged) => Self::of(&tagged.value),
            _ => Self::String,
        }
    }

    fn name(self) -> &'static str {
        match self {
            Self::String => "str",
            Self::Integer => "int",
            Self::Float => "float",
            Self::Boolean => "bool",
        }
    }

    fn value_parser(self) -> ValueParser {
        match self {
            Self::String => ValueParser::new(parse_string),
            Self::Integer => ValueParser::new(parse_integer),
            Self::Float => ValueParser::new(parse_float),
            Self::Boolean => ValueParser::new(parse_boolean),
        }
    }

    fn is_numeric(self) -> bool {
        matches!(self, Self::Integer | Self::Float)
    }
}

fn parse_string(raw: &str) -> Result<Value, String> {
    Ok(Value::from(raw))
}

fn parse_integer(raw: &str) -> Result<Value, String> {
    raw.parse::<i64>()
        .map(Value::from)
        .map_err(|_| format!("invalid int value: '{raw}'"))
}

fn parse_float(raw: &str) -> Result<Value, String> {
    raw.parse::<f64>()
        .map(Value::from)
        .map_err(|_| format!("invalid float value: '{raw}'"))
}

fn parse_boolean(raw: &str) -> Result<Value, String> {
    match raw.to_ascii_lowercase().as_str() {
        "yes" | "true" | "t" | "y" | "1" => Ok(Value::Bool(true)),
        "no" | "false" | "f" | "n" | "0" => Ok(Value::Bool(false)),
        _ => Err(format!("boolean value expected, got '{raw}'")),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlagShape {
    Scalar(LeafKind),
    /// Zero or more values, typed by the first element of the default.
    List(LeafKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlagOrigin {
    Derived,
    Added,
}

#[derive(Debug, Clone)]
struct FlagSpec {
    id: String,
    long: String,
    shape: FlagShape,
    default: Value,
    help: String,
    origin: FlagOrigin,
}

impl FlagSpec {
    fn new(
        id: String,
        long: String,
        default: Value,
        origin: FlagOrigin,
        help: Option<String>,
    ) -> Self {
        let shape = match &default {
            Value::Sequence(items) => {
                FlagShape::List(items.first().map(LeafKind::of).unwrap_or(LeafKind::String))
            }
            other => FlagShape::Scalar(LeafKind::of(other)),
        };
        let help = help.unwrap_or_else(|| match shape {
            FlagShape::Scalar(kind) => {
                format!("set {} value (default:{})", kind.name(), display_value(&default))
            }
            FlagShape::List(kind) => {
                format!("set {} list (default:{})", kind.name(), display_value(&default))
            }
        });
        Self {
            id,
            long,
            shape,
            default,
            help,
            origin,
        }
    }

    fn derived(path: &[String], default: &Value) -> Self {
        Self::new(
            path.join("_"),
            path.join(PATH_SEPARATOR),
            default.clone(),
            FlagOrigin::Derived,
            None,
        )
    }

    fn to_arg(&self) -> Arg {
        let arg = Arg::new(self.id.clone())
            .long(self.long.clone())
            .help(self.help.clone());
        match self.shape {
            FlagShape::Scalar(kind) => arg
                .num_args(1)
                .value_parser(kind.value_parser())
                .allow_negative_numbers(kind.is_numeric()),
            FlagShape::List(kind) => arg
                .num_args(0..)
                .value_parser(kind.value_parser())
                .allow_negative_numbers(kind.is_numeric()),
        }
    }

    /// The command-line value if given, else the default.
    fn resolve(&self, matches: &ArgMatches) -> Value {
        if matches.value_source(&self.id) != Some(ValueSource::CommandLine) {
            return self.default.clone();
        }
        match self.shape {
            FlagShape::Scalar(_) => matches
                .get_one::<Value>(&self.id)
                .cloned()
                .unwrap_or_else(|| self.default.clone()),
            FlagShape::List(_) => Value::Sequence(
                matches
                    .get_many::<Value>(&self.id)
                    .map(|values| values.cloned().collect())
                    .unwrap_or_default(),
            ),
        }
    }
}

/// One flag per non-metadata leaf, in mapping order.
fn derive_flags(mapping: &Mapping) -> Vec<FlagSpec> {
    let mut flags = Vec::new();
    collect_flags(mapping, &mut Vec::new(), &mut flags);
    flags
}

fn collect_flags(mapping: &Mapping, prefix: &mut Vec<String>, out: &mut Vec<FlagSpec>) {
    for (key, value) in mapping {
        let Some(segment) = key_segment(key) else {
            continue;
        };
        if is_metadata_key(&segment) {
            continue;
        }
        prefix.push(segment);
        match value {
            Value::Mapping(child) => collect_flags(child, prefix, out),
            leaf => out.push(FlagSpec::derived(prefix, leaf)),
        }
        prefix.pop();
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.clone(),
        Value::Sequence(items) => {
            let items: Vec<String> = items.iter().map(display_value).collect();
            format!("[{}]", items.join(", "))
        }
        Value::Mapping(_) => serde_yaml::to_string(value)
            .map(|text| text.trim_end().to_string())
            .unwrap_or_default(),
        Value::Tagged(tagged) => display_value(&tagged.value),
    }
}

/// Collect `-c/--config` values from `args` (program name excluded).
///
/// Accepts `-c a b`, `-ca`, `-c=a`, `--config a b` and `--config=a`.
/// Separate values are collected until the next token starting with `-`.
fn scan_config_paths(args: &[OsString]) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    let mut collecting = false;

    for arg in args {
        let Some(text) = arg.to_str() else {
            if collecting {
                paths.push(PathBuf::from(arg));
            }
            continue;
        };
        if text == "--" {
            break;
        }
        if text == "-c" || text == "--config" {
            collecting = true;
            continue;
        }

        let attached = text.strip_prefix("--config=").or_else(|| {
            text.strip_prefix("-c")
                .filter(|_| !text.starts_with("--"))
                .map(|rest| rest.strip_prefix('=').unwrap_or(rest))
        });
        if let Some(value) = attached {
            paths.push(PathBuf::from(value));
            collecting = false;
            continue;
        }

        if text.starts_with('-') && text.len() > 1 {
            collecting = false;
        } else if collecting {
            paths.push(PathBuf::from(text));
        }
    }
    paths
}
