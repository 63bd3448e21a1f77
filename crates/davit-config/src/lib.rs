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

//! Environment configuration for the agent.
//!
//! All settings are read once at bootstrap. Invalid values refuse startup
//! with a structured error rather than falling back silently; optional
//! settings have documented defaults.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Default HTTP port.
const DEFAULT_PORT: u16 = 3001;
/// Default root for job download directories.
const DEFAULT_DOWNLOAD_DIR: &str = "/data/downloads";
/// Default capacity denominator reported by the health route.
const DEFAULT_MAX_CONCURRENT_JOBS: usize = 5;
/// Default retention for job directories, in days.
const DEFAULT_RETENTION_DAYS: u64 = 2;
/// Default scanner binary, resolved via `PATH`.
const DEFAULT_SCANNER_BINARY: &str = "clamscan";

/// Result alias for configuration loading.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration loading failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable was absent.
    #[error("missing environment configuration")]
    MissingEnv {
        /// Name of the missing variable.
        name: &'static str,
    },
    /// A variable was present but unusable.
    #[error("invalid environment configuration")]
    InvalidValue {
        /// Name of the offending variable.
        name: &'static str,
        /// Value as received.
        value: String,
        /// Machine-readable reason.
        reason: &'static str,
    },
}

/// Agent settings resolved from the environment.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Port the control API listens on (`PORT`).
    pub port: u16,
    /// Shared bearer token gating the API (`WORKER_CLUSTER_TOKEN`).
    pub cluster_token: String,
    /// Root directory for job downloads (`DOWNLOAD_DIR`).
    pub download_root: PathBuf,
    /// Capacity denominator for health reporting (`MAX_CONCURRENT_JOBS`).
    pub max_concurrent_jobs: usize,
    /// Identifier stamped into callbacks (`WORKER_ID`).
    pub worker_id: String,
    /// Age after which job directories are purged
    /// (`DOWNLOAD_RETENTION_DAYS`).
    pub retention: Duration,
    /// Scanner binary path (`CLAMSCAN_PATH`).
    pub scanner_binary: PathBuf,
}

impl AgentConfig {
    /// Load the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when `WORKER_CLUSTER_TOKEN` is absent or any
    /// numeric setting fails to parse.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load the configuration from an injectable lookup, used by tests.
    ///
    /// # Errors
    ///
    /// Same contract as [`AgentConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ConfigResult<Self> {
        let fetch = |name: &str| lookup(name).filter(|value| !value.is_empty());

        let cluster_token = fetch("WORKER_CLUSTER_TOKEN").ok_or(ConfigError::MissingEnv {
            name: "WORKER_CLUSTER_TOKEN",
        })?;
        let port = parse_or("PORT", fetch("PORT"), DEFAULT_PORT)?;
        let max_concurrent_jobs = parse_or(
            "MAX_CONCURRENT_JOBS",
            fetch("MAX_CONCURRENT_JOBS"),
            DEFAULT_MAX_CONCURRENT_JOBS,
        )?;
        let retention_days = parse_or(
            "DOWNLOAD_RETENTION_DAYS",
            fetch("DOWNLOAD_RETENTION_DAYS"),
            DEFAULT_RETENTION_DAYS,
        )?;
        let download_root =
            PathBuf::from(fetch("DOWNLOAD_DIR").unwrap_or_else(|| DEFAULT_DOWNLOAD_DIR.to_string()));
        let worker_id = fetch("WORKER_ID").unwrap_or_else(|| format!("agent-{port}"));
        let scanner_binary = PathBuf::from(
            fetch("CLAMSCAN_PATH").unwrap_or_else(|| DEFAULT_SCANNER_BINARY.to_string()),
        );

        Ok(Self {
            port,
            cluster_token,
            download_root,
            max_concurrent_jobs,
            worker_id,
            retention: Duration::from_secs(retention_days * 24 * 60 * 60),
            scanner_binary,
        })
    }
}

fn parse_or<T: std::str::FromStr>(
    name: &'static str,
    value: Option<String>,
    default: T,
) -> ConfigResult<T> {
    match value {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
            name,
            value: raw,
            reason: "not_a_number",
        }),
    }
}
