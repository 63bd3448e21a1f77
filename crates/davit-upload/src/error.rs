//! Error types for the upload client. Every variant aborts the upload;
//! nothing here is retried.

use thiserror::Error;

/// Failures surfaced by the object-storage client.
#[derive(Debug, Error)]
pub enum UploadError {
    /// Object-store settings were only partially provided.
    #[error("object store configuration incomplete")]
    Config {
        /// First missing environment variable.
        missing: &'static str,
    },
    /// The configured endpoint could not be parsed as a URL.
    #[error("invalid object store endpoint")]
    Endpoint {
        /// Offending endpoint value.
        endpoint: String,
    },
    /// The HTTP client could not be constructed.
    #[error("upload transport construction failed")]
    Transport {
        /// Source HTTP client error.
        #[source]
        source: reqwest::Error,
    },
    /// An HTTP request failed at the transport level.
    #[error("upload http request failed")]
    Http {
        /// Upload step identifier.
        operation: &'static str,
        /// Source HTTP client error.
        #[source]
        source: reqwest::Error,
    },
    /// An upload step was rejected with a non-success status.
    #[error("upload step rejected")]
    Status {
        /// Upload step identifier.
        operation: &'static str,
        /// HTTP status returned by the store.
        status: u16,
    },
    /// A part upload was rejected with a non-success status.
    #[error("part upload rejected")]
    PartStatus {
        /// 1-based part number.
        part_number: u32,
        /// HTTP status returned by the store.
        status: u16,
    },
    /// A part upload response carried no `ETag` header.
    #[error("part upload response missing etag")]
    MissingEtag {
        /// 1-based part number.
        part_number: u32,
    },
    /// A response body could not be interpreted.
    #[error("object store response malformed")]
    MalformedResponse {
        /// Upload step identifier.
        operation: &'static str,
        /// Machine-readable reason.
        reason: &'static str,
    },
}
