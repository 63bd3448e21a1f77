//! API error type with JSON problem bodies.

use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Serialize;
use thiserror::Error;

/// Errors surfaced by the control API.
#[derive(Debug, Error)]
pub enum ApiError {
    /// The request body failed validation.
    #[error("request validation failed: {0}")]
    Validation(String),
    /// No bearer token was presented.
    #[error("authorization header missing")]
    MissingToken,
    /// The presented token does not match the cluster token.
    #[error("authorization token rejected")]
    ForbiddenToken,
    /// The requested job or file is unknown.
    #[error("resource not found: {0}")]
    NotFound(String),
    /// The requested path escapes the job's directory.
    #[error("path escapes the job directory")]
    PathTraversal,
    /// A job with the same id is already active.
    #[error("job already active: {0}")]
    Conflict(String),
    /// Unexpected internal failure.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    /// HTTP status the error maps to.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::MissingToken => StatusCode::UNAUTHORIZED,
            Self::ForbiddenToken | Self::PathTraversal => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Stable machine-readable code for the problem body.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "INVALID_REQUEST",
            Self::MissingToken => "MISSING_TOKEN",
            Self::ForbiddenToken => "FORBIDDEN",
            Self::NotFound(_) => "NOT_FOUND",
            Self::PathTraversal => "FORBIDDEN_PATH",
            Self::Conflict(_) => "CONFLICT",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let body = ErrorBody {
            code: self.code(),
            message: self.to_string(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_match_the_error_taxonomy() {
        assert_eq!(
            ApiError::Validation("x".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ApiError::MissingToken.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::ForbiddenToken.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::PathTraversal.status_code(), StatusCode::FORBIDDEN);
        assert_eq!(
            ApiError::NotFound("x".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Conflict("x".into()).status_code(),
            StatusCode::CONFLICT
        );
    }
}
