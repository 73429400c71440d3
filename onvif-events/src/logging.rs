//! Logging setup for the event service
//!
//! Every component logs through `tracing`. This module installs a subscriber
//! suited to where the emulator runs: silent for embedding, compact for
//! development, verbose for debugging and JSON lines for log collectors.

use std::str::FromStr;

use tracing_subscriber::{fmt, EnvFilter, Registry};

/// Environment variable overriding the log filter.
pub const LOG_LEVEL_ENV: &str = "ONVIF_LOG_LEVEL";

/// Environment variable selecting the logging mode.
pub const LOG_MODE_ENV: &str = "ONVIF_LOG_MODE";

/// Logging mode for different use cases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LoggingMode {
    /// No subscriber installed
    #[default]
    Silent,
    /// Compact stderr output for development
    Development,
    /// Verbose diagnostics with thread ids and source locations
    Debug,
    /// One JSON object per event
    Json,
}

impl FromStr for LoggingMode {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "silent" => Ok(Self::Silent),
            "development" | "dev" => Ok(Self::Development),
            "debug" => Ok(Self::Debug),
            "json" => Ok(Self::Json),
            other => Err(LoggingError::InvalidMode(other.to_string())),
        }
    }
}

/// Logging configuration error
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    #[error("Failed to initialize tracing subscriber: {0}")]
    TracingInit(String),

    #[error("Unknown logging mode: {0}")]
    InvalidMode(String),
}

/// Initialize logging with the specified mode
///
/// Call once, early, before the notifications manager starts.
///
/// # Environment Variables
///
/// - `ONVIF_LOG_LEVEL`: filter directive (e.g. `debug`, `onvif_events=trace`),
///   checked before `RUST_LOG`
pub fn init_logging(mode: LoggingMode) -> Result<(), LoggingError> {
    init_logging_with_level(mode, None)
}

/// Initialize logging with an explicit default filter.
///
/// `default_level` is used only when neither `ONVIF_LOG_LEVEL` nor
/// `RUST_LOG` is set.
pub fn init_logging_with_level(
    mode: LoggingMode,
    default_level: Option<&str>,
) -> Result<(), LoggingError> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    match mode {
        LoggingMode::Silent => Ok(()),
        LoggingMode::Development => {
            let filter = create_env_filter(default_level.unwrap_or("info"));

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
            let filter = create_env_filter(default_level.unwrap_or("debug"));

            Registry::default()
                .with(
                    fmt::layer()
                        .pretty()
                        .with_thread_ids(true)
                        .with_thread_names(true)
                        .with_file(true)
                        .with_line_number(true),
                )
                .with(filter)
                .try_init()
                .map_err(|e| LoggingError::TracingInit(e.to_string()))
        }
        LoggingMode::Json => {
            let filter = create_env_filter(default_level.unwrap_or("info"));

            Registry::default()
                .with(fmt::layer().json().with_current_span(false))
                .with(filter)
                .try_init()
                .map_err(|e| LoggingError::TracingInit(e.to_string()))
        }
    }
}

/// Initialize logging from `ONVIF_LOG_MODE`.
///
/// Unset or unrecognized values fall back to silent.
pub fn init_logging_from_env() -> Result<(), LoggingError> {
    let mode = std::env::var(LOG_MODE_ENV)
        .ok()
        .and_then(|mode| mode.parse().ok())
        .unwrap_or_default();

    init_logging(mode)
}

/// Create an environment filter with fallback to default level
fn create_env_filter(default_level: &str) -> EnvFilter {
    if let Ok(level) = std::env::var(LOG_LEVEL_ENV) {
        EnvFilter::new(level)
    } else if let Ok(rust_log) = std::env::var("RUST_LOG") {
        EnvFilter::new(rust_log)
    } else {
        EnvFilter::new(default_level)
    }
}

/// Check if logging has been initialized
pub fn is_initialized() -> bool {
    tracing::dispatcher::has_been_set()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn test_silent_mode() {
        assert!(init_logging(LoggingMode::Silent).is_ok());
    }

    #[rstest]
    #[case("silent", LoggingMode::Silent)]
    #[case("development", LoggingMode::Development)]
    #[case("DEV", LoggingMode::Development)]
    #[case("debug", LoggingMode::Debug)]
    #[case("json", LoggingMode::Json)]
    fn test_parse_mode(#[case] input: &str, #[case] expected: LoggingMode) {
        assert_eq!(input.parse::<LoggingMode>().unwrap(), expected);
    }

    #[test]
    fn test_parse_unknown_mode() {
        let error = "chatty".parse::<LoggingMode>().unwrap_err();
        assert_eq!(error.to_string(), "Unknown logging mode: chatty");
    }

    #[test]
    fn test_default_mode_is_silent() {
        assert_eq!(LoggingMode::default(), LoggingMode::Silent);
    }
}
