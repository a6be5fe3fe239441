//! # confsync sample program
//!
//! Loads the YAML files given with `-c`, derives one flag per leaf key, and
//! prints the parsed flags and the synchronized configuration.
//!
//! ```sh
//! cargo run --bin confsync-sample -- -c conf/base.yaml conf/local.yaml --model-depth 101
//! cargo run --bin confsync-sample -- -c conf/base.yaml --dump out/config.yaml
//! RUST_LOG=debug cargo run --bin confsync-sample -- -c conf/base.yaml --help
//! ```
//!
//! Two flags are added on top of the derived ones: `--added`, which lands in
//! the configuration as a new top-level key, and `--dump`, which writes the
//! final configuration to a file.

use std::path::PathBuf;

use confsync::{AverageMeter, ConfigError, ConfigParser, MetricsSink, registry};
use serde_yaml::Value;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Prints averaged metrics the way an experiment tracker would receive them.
struct StdoutSink;

impl MetricsSink for StdoutSink {
    fn log_metrics(&mut self, metrics: &[(String, f64)], step: u64) {
        for (name, value) in metrics {
            println!("step {step}: {name}={value:.3}");
        }
    }
}

fn main() -> Result<(), ConfigError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let mut parser = ConfigParser::builder()
        .name("confsync-sample")
        .about("Print a YAML configuration synchronized with command-line flags")
        .build()?;
    parser.add_argument("added", "NOT_EXIST_CONFIG", Some("added argument"))?;
    parser.add_argument("dump", Value::Null, Some("write the final configuration here"))?;

    let args = parser.parse();
    println!(
        "{}",
        serde_json::to_string_pretty(&args).unwrap_or_else(|e| format!("<{e}>"))
    );

    let config = registry::get_instance();
    print!("{}", config.borrow_mut().dump(None)?);

    if let Some(target) = args.get("dump").and_then(Value::as_str) {
        let target = PathBuf::from(target);
        config.borrow_mut().dump(Some(target.as_path()))?;
        info!(path = %target.display(), "wrote configuration");
    }

    let flat = config.borrow().flatten(None)?;
    let numeric = flat.iter().filter_map(|(key, value)| {
        value.as_f64().map(|v| (key.as_str(), v))
    });
    let mut meter = AverageMeter::new(["numeric"]).with_sink(StdoutSink);
    for (key, value) in numeric {
        info!(key, value, "numeric leaf");
        meter.update("numeric", value, 1);
    }
    meter.reset(None, Some("config"));
    Ok(())
}
