//! # Design
//!
//! - Centralize application-level errors for bootstrap and shutdown.
//! - Keep error messages constant while carrying context fields.
//! - Preserve source errors without re-logging at call sites.

use std::error::Error;
use std::io;
use std::path::PathBuf;

use thiserror::Error as ThisError;

/// Result alias for application operations.
pub type AppResult<T> = Result<T, AppError>;

/// Application-level error type.
#[derive(Debug, ThisError)]
pub enum AppError {
    /// Configuration loading failed.
    #[error("configuration loading failed")]
    Config {
        /// Operation identifier.
        operation: &'static str,
        /// Source configuration error.
        #[source]
        source: davit_config::ConfigError,
    },
    /// Telemetry setup failed.
    #[error("telemetry setup failed")]
    Telemetry {
        /// Operation identifier.
        operation: &'static str,
        /// Source telemetry error.
        #[source]
        source: davit_telemetry::TelemetryError,
    },
    /// API server operations failed.
    #[error("api server operation failed")]
    ApiServer {
        /// Operation identifier.
        operation: &'static str,
        /// Source API server error.
        #[source]
        source: davit_api::ApiServerError,
    },
    /// Engine construction failed.
    #[error("engine setup failed")]
    Engine {
        /// Operation identifier.
        operation: &'static str,
        /// Underlying failure.
        #[source]
        source: Box<dyn Error + Send + Sync>,
    },
    /// Callback transport construction failed.
    #[error("callback transport setup failed")]
    Callback {
        /// Operation identifier.
        operation: &'static str,
        /// Source callback error.
        #[source]
        source: davit_callback::CallbackError,
    },
    /// IO operations failed.
    #[error("io operation failed")]
    Io {
        /// Operation identifier.
        operation: &'static str,
        /// Optional path involved in the failure.
        path: Option<PathBuf>,
        /// Source IO error.
        #[source]
        source: io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variants_preserve_their_sources() {
        let config = AppError::Config {
            operation: "config.from_env",
            source: davit_config::ConfigError::MissingEnv {
                name: "WORKER_CLUSTER_TOKEN",
            },
        };
        assert!(config.source().is_some());

        let io = AppError::Io {
            operation: "download_root.create",
            path: Some(PathBuf::from("/data/downloads")),
            source: io::Error::other("disk gone"),
        };
        assert!(matches!(io, AppError::Io { path: Some(_), .. }));
    }
}
