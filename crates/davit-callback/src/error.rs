//! Error types for callback construction and transport setup.

use thiserror::Error;

/// Failures local to the callback machinery.
///
/// Delivery failures are intentionally absent: the client retries and then
/// drops the event, it never surfaces delivery errors to its caller.
#[derive(Debug, Error)]
pub enum CallbackError {
    /// Event payload could not be serialised to JSON.
    #[error("callback payload serialization failed")]
    Serialize {
        /// Source serialisation error.
        #[source]
        source: serde_json::Error,
    },
    /// The signing secret was rejected by the HMAC implementation.
    #[error("callback signing secret rejected")]
    InvalidSecret,
    /// The HTTP transport could not be constructed.
    #[error("callback transport construction failed")]
    Transport {
        /// Source HTTP client error.
        #[source]
        source: reqwest::Error,
    },
}
