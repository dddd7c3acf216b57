//! Logging configuration and initialization for feedbot.

use std::fs::{self, File};
use std::path::Path;
use std::sync::Arc;

use tracing::Level;
use tracing_subscriber::fmt::writer::{BoxMakeWriter, MakeWriterExt};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::Result;

/// Parse log level string to tracing Level.
fn parse_level(level: &str) -> Level {
    match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// Dependencies whose info-level output would drown feedbot's own lines.
///
/// sqlx logs every statement at info.
const QUIET_DEPENDENCIES: [&str; 4] = ["sqlx=warn", "hyper=warn", "reqwest=warn", "rustls=warn"];

/// Build the filter for the configured level, with noisy dependencies capped.
fn build_filter(level: Level) -> EnvFilter {
    QUIET_DEPENDENCIES
        .iter()
        .filter_map(|directive| directive.parse().ok())
        .fold(
            EnvFilter::from_default_env().add_directive(level.into()),
            EnvFilter::add_directive,
        )
}

/// Initialize the logging system with the given configuration.
///
/// Log lines go to the configured file, and to stdout unless
/// `console = false`.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let filter = build_filter(parse_level(&config.level));

    if let Some(parent) = Path::new(&config.file).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }

    let log_file = Arc::new(File::create(&config.file)?);
    let writer = if config.console {
        BoxMakeWriter::new(std::io::stdout.and(log_file))
    } else {
        BoxMakeWriter::new(log_file)
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true),
        )
        .with(filter)
        .init();

    Ok(())
}

/// Initialize console-only logging.
pub fn init_console_only(level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stdout)
                .with_ansi(true)
                .with_target(true),
        )
        .with(build_filter(parse_level(level)))
        .init();
}
