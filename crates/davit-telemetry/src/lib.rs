#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]

//! Logging initialisation.
//!
//! # Design
//! - One entry point installs the global subscriber; everything else logs
//!   through `tracing` macros.
//! - `RUST_LOG` wins when set; the configured level is the fallback.
//! - Pretty output for debug builds, JSON lines for release, overridable.

use thiserror::Error;
use tracing_subscriber::EnvFilter;

/// Default logging target when `RUST_LOG` is not provided.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Telemetry setup failures.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The global subscriber was already installed.
    #[error("tracing subscriber installation failed")]
    SubscriberInit {
        /// Human-readable reason from the subscriber builder.
        reason: String,
    },
}

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LoggingConfig<'a> {
    /// Log level directive used when `RUST_LOG` is absent.
    pub level: &'a str,
    /// Output format selection.
    pub format: LogFormat,
}

impl Default for LoggingConfig<'_> {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL,
            format: LogFormat::infer(),
        }
    }
}

/// Available output formats for the logger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    /// Structured JSON lines.
    Json,
    /// Human-readable output.
    Pretty,
}

impl LogFormat {
    /// Choose a sensible default for the current build profile.
    #[must_use]
    pub const fn infer() -> Self {
        if cfg!(debug_assertions) {
            Self::Pretty
        } else {
            Self::Json
        }
    }
}

/// Configure and install the global tracing subscriber.
///
/// # Errors
///
/// Returns [`TelemetryError::SubscriberInit`] if a subscriber is already
/// installed globally.
pub fn init_logging(config: &LoggingConfig<'_>) -> Result<(), TelemetryError> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let result = match config.format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.try_init(),
    };
    result.map_err(|err| TelemetryError::SubscriberInit {
        reason: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_uses_the_documented_level() {
        let config = LoggingConfig::default();
        assert_eq!(config.level, DEFAULT_LOG_LEVEL);
        assert_eq!(config.format, LogFormat::infer());
    }

    #[test]
    fn format_inference_tracks_the_build_profile() {
        let format = LogFormat::infer();
        if cfg!(debug_assertions) {
            assert_eq!(format, LogFormat::Pretty);
        } else {
            assert_eq!(format, LogFormat::Json);
        }
    }

    #[test]
    fn double_initialisation_reports_an_error() {
        let config = LoggingConfig::default();
        let first = init_logging(&config);
        let second = init_logging(&config);
        assert!(first.is_ok() || second.is_err());
    }
}
