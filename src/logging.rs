//! Structured logging setup
//!
//! Provides JSON-formatted and human-readable logging with optional file output.
//! Debug mode is a plain configuration flag passed in here, never a global
//! switch flipped at runtime.

use crate::config::LoggingConfig;
use anyhow::Result;
use std::fs::OpenOptions;
use std::sync::Arc;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter directive derived from configuration
///
/// # Examples
///
/// ```
/// use camera_timelapse::config::LoggingConfig;
/// use camera_timelapse::logging::filter_directive;
///
/// let mut config = LoggingConfig::default();
/// assert_eq!(filter_directive(&config), "info");
///
/// config.debug = true;
/// assert_eq!(filter_directive(&config), "info,camera_timelapse=debug");
/// ```
pub fn filter_directive(config: &LoggingConfig) -> String {
    if config.debug {
        format!("{},camera_timelapse=debug", config.level)
    } else {
        config.level.clone()
    }
}

/// Initialize logging based on configuration.
///
/// `RUST_LOG` takes precedence over the configured level. Output always
/// goes to STDOUT and additionally to `file_path` when set.
///
/// # Errors
///
/// Returns an error if the filter is invalid, the log file cannot be
/// opened, or a global subscriber is already installed
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(filter_directive(config)))?;

    let registry = tracing_subscriber::registry().with(env_filter);

    if config.json_format {
        let stdout_layer = fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true);

        if let Some(file_path) = &config.file_path {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(file_path)?;

            let file_layer = fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .with_writer(Arc::new(file));

            registry.with(stdout_layer).with(file_layer).try_init()?;
        } else {
            registry.with(stdout_layer).try_init()?;
        }
    } else {
        let stdout_layer = fmt::layer().with_target(true).with_level(true);

        if let Some(file_path) = &config.file_path {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(file_path)?;

            let file_layer = fmt::layer()
                .with_target(true)
                .with_level(true)
                .with_ansi(false)
                .with_writer(Arc::new(file));

            registry.with(stdout_layer).with(file_layer).try_init()?;
        } else {
            registry.with(stdout_layer).try_init()?;
        }
    }

    Ok(())
}
