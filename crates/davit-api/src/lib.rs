//! HTTP control surface for the agent.
//!
//! Routes: `POST /start`, `POST /stop/{job_id}`, `GET /status/{job_id}`,
//! `GET /files/{job_id}`, `GET /download/{job_id}/{*path}`,
//! `DELETE /cleanup/{job_id}`, `GET /health`. Every route sits behind the
//! shared cluster bearer token: a missing token is a 401, a mismatched one
//! a 403.

use std::future::Future;
use std::net::SocketAddr;

use axum::Router;
use axum::middleware;
use axum::routing::{delete, get, post};
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

mod auth;
mod error;
mod handlers;
mod state;

pub use error::ApiError;
pub use state::{AgentState, ApiSettings};

/// Failures while hosting the control surface.
#[derive(Debug, Error)]
pub enum ApiServerError {
    /// The listener socket could not be bound.
    #[error("failed to bind api listener")]
    Bind {
        /// Address the bind was attempted on.
        addr: SocketAddr,
        /// Source IO error.
        #[source]
        source: std::io::Error,
    },
    /// The server loop terminated with an error.
    #[error("api server terminated")]
    Serve {
        /// Source IO error.
        #[source]
        source: std::io::Error,
    },
}

/// Axum router wrapper hosting the agent's control API.
pub struct ApiServer {
    router: Router,
}

impl ApiServer {
    /// Build the router around shared application state.
    #[must_use]
    pub fn new(state: AgentState) -> Self {
        let router = Router::new()
            .route("/start", post(handlers::start_job))
            .route("/stop/{job_id}", post(handlers::stop_job))
            .route("/status/{job_id}", get(handlers::job_status))
            .route("/files/{job_id}", get(handlers::list_files))
            .route("/download/{job_id}/{*path}", get(handlers::download_file))
            .route("/cleanup/{job_id}", delete(handlers::cleanup_job))
            .route("/health", get(handlers::health))
            .layer(middleware::from_fn_with_state(
                state.clone(),
                auth::require_bearer,
            ))
            .layer(TraceLayer::new_for_http())
            .with_state(state);
        Self { router }
    }

    /// Consume the server, exposing the router (used by in-process tests).
    #[must_use]
    pub fn into_router(self) -> Router {
        self.router
    }

    /// Serve until the shutdown future resolves.
    ///
    /// # Errors
    ///
    /// Returns [`ApiServerError`] when the listener cannot be bound or the
    /// server loop fails.
    pub async fn serve(
        self,
        addr: SocketAddr,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> Result<(), ApiServerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ApiServerError::Bind { addr, source })?;
        info!(%addr, "agent api listening");
        axum::serve(listener, self.router)
            .with_graceful_shutdown(shutdown)
            .await
            .map_err(|source| ApiServerError::Serve { source })
    }
}
