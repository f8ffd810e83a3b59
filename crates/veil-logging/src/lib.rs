//! Structured logging for Veil
//!
//! Installs a global `tracing` subscriber with an `EnvFilter`, a console
//! layer (pretty or JSON lines) and an optional JSON-lines file layer backed
//! by `tracing-appender`.
//!
//! # Quick Start
//!
//! ```ignore
//! use veil_logging::{LogConfig, VeilSubscriberBuilder};
//!
//! // Keep the guard alive until exit so buffered file output is flushed
//! let _guard = VeilSubscriberBuilder::new()
//!     .with_config(LogConfig::development())
//!     .init()?;
//! ```

pub mod config;

pub use config::{ConsoleConfig, FileConfig, LogConfig, LogFormat, RotationStrategy};
pub use tracing_appender::non_blocking::WorkerGuard;

use std::fs::{self, File};

use thiserror::Error;
use tracing_appender::non_blocking::NonBlocking;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Errors raised while installing the subscriber
#[derive(Debug, Error)]
pub enum LoggingError {
    /// Log directory or file could not be created
    #[error("Failed to set up log file: {0}")]
    File(String),

    /// A global subscriber is already installed
    #[error("Failed to install subscriber: {0}")]
    Init(String),
}

/// Result type for logging setup
pub type LoggingResult<T> = Result<T, LoggingError>;

/// Builder for configuring and initializing the Veil logging subscriber
#[derive(Debug, Default)]
pub struct VeilSubscriberBuilder {
    config: LogConfig,
}

impl VeilSubscriberBuilder {
    /// Create a new subscriber builder with default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a specific configuration
    pub fn with_config(mut self, config: LogConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the default log level
    pub fn with_level(mut self, level: impl Into<String>) -> Self {
        self.config.default_level = level.into();
        self
    }

    /// Set the console line format
    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.config.console.format = format;
        self
    }

    /// Enable or disable console output
    pub fn with_console(mut self, enabled: bool) -> Self {
        self.config.console.enabled = enabled;
        self
    }

    /// Configure file output
    pub fn with_file_output(mut self, config: FileConfig) -> Self {
        self.config.file = Some(config);
        self
    }

    /// The configuration that `init` will apply
    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    /// Build the level filter; `RUST_LOG` wins over the configured level
    pub fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(&self.config.default_level))
    }

    /// Initialize the subscriber globally
    ///
    /// Returns a guard when file output is configured; it must be kept
    /// alive for the duration of the program so buffered lines are flushed.
    pub fn init(self) -> LoggingResult<Option<WorkerGuard>> {
        let env_filter = self.env_filter();
        let console = &self.config.console;

        let pretty_layer = (console.enabled && console.format == LogFormat::Pretty).then(|| {
            fmt::layer()
                .with_ansi(console.ansi)
                .with_target(true)
                .with_writer(std::io::stderr)
        });

        let json_layer = (console.enabled && console.format == LogFormat::Json).then(|| {
            fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .flatten_event(true)
                .with_writer(std::io::stderr)
        });

        let (file_layer, guard) = match &self.config.file {
            Some(file_config) => {
                let (writer, guard) = file_writer(file_config)?;
                let layer = fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true)
                    .flatten_event(true)
                    .with_file(true)
                    .with_line_number(true)
                    .with_writer(writer);
                (Some(layer), Some(guard))
            }
            None => (None, None),
        };

        tracing_subscriber::registry()
            .with(env_filter)
            .with(pretty_layer)
            .with(json_layer)
            .with(file_layer)
            .try_init()
            .map_err(|e| LoggingError::Init(e.to_string()))?;

        tracing::debug!(
            level = %self.config.default_level,
            file_output = guard.is_some(),
            "Logging initialised"
        );
        Ok(guard)
    }
}

/// Create a non-blocking writer for file output
///
/// `Never` truncates a single `<prefix>.log`; the other strategies append to
/// rolling files.
fn file_writer(config: &FileConfig) -> LoggingResult<(NonBlocking, WorkerGuard)> {
    fs::create_dir_all(&config.directory)
        .map_err(|e| LoggingError::File(format!("{}: {}", config.directory.display(), e)))?;

    let rotation = match config.rotation {
        RotationStrategy::Never => {
            let path = config.directory.join(format!("{}.log", config.prefix));
            let file = File::create(&path)
                .map_err(|e| LoggingError::File(format!("{}: {}", path.display(), e)))?;
            return Ok(tracing_appender::non_blocking(file));
        }
        RotationStrategy::Daily => Rotation::DAILY,
        RotationStrategy::Hourly => Rotation::HOURLY,
    };

    let appender = RollingFileAppender::builder()
        .rotation(rotation)
        .filename_prefix(&config.prefix)
        .filename_suffix("log")
        .build(&config.directory)
        .map_err(|e| LoggingError::File(e.to_string()))?;

    Ok(tracing_appender::non_blocking(appender))
}
