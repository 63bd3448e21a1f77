//! Shared application state threaded through the router.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use davit_pipeline::JobPipeline;

/// Settings the API needs at request time.
pub struct ApiSettings {
    /// Shared cluster bearer token gating every route.
    pub cluster_token: String,
    /// Root directory job downloads live under.
    pub download_root: PathBuf,
    /// Capacity denominator reported by `/health`.
    pub max_concurrent_jobs: usize,
    /// Identifier reported by `/health`.
    pub worker_id: String,
}

/// Cloneable state handed to every handler.
#[derive(Clone)]
pub struct AgentState {
    /// Job pipeline the handlers delegate to.
    pub pipeline: Arc<JobPipeline>,
    /// Request-time settings.
    pub settings: Arc<ApiSettings>,
    /// Process start instant, for the uptime report.
    pub started_at: Instant,
}

impl AgentState {
    /// Bundle the pipeline and settings into router state.
    #[must_use]
    pub fn new(pipeline: Arc<JobPipeline>, settings: ApiSettings) -> Self {
        Self {
            pipeline,
            settings: Arc::new(settings),
            started_at: Instant::now(),
        }
    }
}
