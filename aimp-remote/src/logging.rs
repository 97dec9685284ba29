//! Logging setup for applications embedding the session engine
//!
//! The engine itself only emits `tracing` events; nothing is printed until
//! the application installs a subscriber, either through [`init_logging`] or
//! its own.

use tracing_subscriber::{fmt, EnvFilter, Registry};

/// Logging mode for different use cases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggingMode {
    /// No subscriber; for UIs that own the terminal
    Silent,
    /// Compact stderr output
    Development,
    /// Verbose output with thread ids and source locations
    Debug,
}

/// Logging configuration error
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Failed to initialize tracing subscriber: {0}")]
    TracingInit(String),

    #[error("Invalid environment variable: {0}")]
    InvalidEnv(String),
}

/// Install a global subscriber for the given mode
///
/// # Environment Variables
///
/// - `AIMP_LOG_LEVEL`: filter directive (e.g. `debug`, `aimp_remote=trace`)
/// - `RUST_LOG`: used when `AIMP_LOG_LEVEL` is not set
///
/// An already installed global subscriber is kept as is.
pub fn init_logging(mode: LoggingMode) -> Result<(), LoggingError> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    if mode != LoggingMode::Silent && is_initialized() {
        return Ok(());
    }

    match mode {
        LoggingMode::Silent => Ok(()),
        LoggingMode::Development => {
            let filter = create_env_filter("info")?;

            Registry::default()
                .with(
                    fmt::layer()
                        .with_target(false)
                        .with_thread_ids(false)
                        .with_file(false)
                        .with_line_number(false)
                        .compact(),
                )
                .with(filter)
                .try_init()
                .map_err(|e| LoggingError::TracingInit(e.to_string()))
        }
        LoggingMode::Debug => {
            let filter = create_env_filter("debug")?;

            Registry::default()
                .with(
                    fmt::layer()
                        .pretty()
                        .with_thread_ids(true)
                        .with_file(true)
                        .with_line_number(true),
                )
                .with(filter)
                .try_init()
                .map_err(|e| LoggingError::TracingInit(e.to_string()))
        }
    }
}

/// Pick the mode from `AIMP_LOG_MODE` ("silent", "development", "debug")
///
/// Defaults to silent when unset; an unknown value is an error.
pub fn init_logging_from_env() -> Result<(), LoggingError> {
    let mode = match std::env::var("AIMP_LOG_MODE") {
        Ok(value) => parse_mode(&value)?,
        Err(_) => LoggingMode::Silent,
    };

    init_logging(mode)
}

fn parse_mode(value: &str) -> Result<LoggingMode, LoggingError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "" | "silent" => Ok(LoggingMode::Silent),
        "development" | "dev" => Ok(LoggingMode::Development),
        "debug" => Ok(LoggingMode::Debug),
        other => Err(LoggingError::InvalidEnv(format!("AIMP_LOG_MODE={}", other))),
    }
}

fn create_env_filter(default_level: &str) -> Result<EnvFilter, LoggingError> {
    let directives = std::env::var("AIMP_LOG_LEVEL")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| default_level.to_string());

    EnvFilter::try_new(&directives)
        .map_err(|e| LoggingError::InvalidEnv(format!("{}: {}", directives, e)))
}

/// Whether a global subscriber is already installed
pub fn is_initialized() -> bool {
    tracing::dispatcher::has_been_set()
}
