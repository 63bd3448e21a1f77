//! Bearer-token gate applied to every route.

use axum::extract::{Request, State};
use axum::http::header::AUTHORIZATION;
use axum::middleware::Next;
use axum::response::Response;

use crate::error::ApiError;
use crate::state::AgentState;

/// Reject requests without a valid cluster token before any job logic runs:
/// missing bearer is a 401, a mismatch a 403.
pub(crate) async fn require_bearer(
    State(state): State<AgentState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(ApiError::MissingToken)?;
    if token != state.settings.cluster_token {
        return Err(ApiError::ForbiddenToken);
    }
    Ok(next.run(request).await)
}
