//! Logging infrastructure for the media source engine
//!
//! The engine only emits `tracing` records. Applications pick how those
//! records are rendered (or dropped) with the helpers below.

use tracing_subscriber::{fmt, EnvFilter, Registry};

/// Logging mode for different use cases
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggingMode {
    /// No output, for UI hosts that own the terminal
    Silent,
    /// Compact stderr output for development
    Development,
    /// Verbose diagnostics with source locations
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

/// Initialize logging with the specified mode
///
/// Call this once, before the engine is built.
///
/// # Environment Variables
///
/// - `MEDIA_SOURCE_LOG_LEVEL`: Override the filter (e.g. "media_source=trace")
/// - `RUST_LOG`: Used when `MEDIA_SOURCE_LOG_LEVEL` is not set
pub fn init_logging(mode: LoggingMode) -> Result<(), LoggingError> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

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

/// Initialize logging from the `MEDIA_SOURCE_LOG_MODE` environment variable
///
/// - "silent" -> LoggingMode::Silent
/// - "development" -> LoggingMode::Development
/// - "debug" -> LoggingMode::Debug
///
/// Unset means silent. Any other value is rejected.
pub fn init_logging_from_env() -> Result<(), LoggingError> {
    let mode = match std::env::var("MEDIA_SOURCE_LOG_MODE") {
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
        other => Err(LoggingError::InvalidEnv(format!(
            "MEDIA_SOURCE_LOG_MODE={}",
            other
        ))),
    }
}

/// Create an environment filter with fallback to default level
fn create_env_filter(default_level: &str) -> Result<EnvFilter, LoggingError> {
    if let Ok(level) = std::env::var("MEDIA_SOURCE_LOG_LEVEL") {
        return EnvFilter::try_new(&level)
            .map_err(|e| LoggingError::InvalidEnv(format!("MEDIA_SOURCE_LOG_LEVEL: {}", e)));
    }
    if let Ok(rust_log) = std::env::var("RUST_LOG") {
        return EnvFilter::try_new(&rust_log)
            .map_err(|e| LoggingError::InvalidEnv(format!("RUST_LOG: {}", e)));
    }
    Ok(EnvFilter::new(default_level))
}

/// Check if a global subscriber has been installed
pub fn is_initialized() -> bool {
    tracing::dispatcher::has_been_set()
}

/// Equivalent to `init_logging(LoggingMode::Silent)`
pub fn init_silent() -> Result<(), LoggingError> {
    init_logging(LoggingMode::Silent)
}
