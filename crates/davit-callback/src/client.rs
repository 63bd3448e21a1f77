//! Callback delivery client with bounded retry.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::header::CONTENT_TYPE;
use tokio::time::{sleep, timeout};
use tracing::{debug, error, warn};

use crate::error::CallbackError;
use crate::event::CallbackEvent;
use crate::sign::sign_payload;

const MAX_ATTEMPTS: u32 = 5;
const ATTEMPT_TIMEOUT: Duration = Duration::from_secs(10);
const BACKOFF_BASE_MS: u64 = 1_000;
const BACKOFF_CAP_MS: u64 = 16_000;

/// Transport seam for callback delivery.
///
/// Production uses [`HttpTransport`]; tests substitute doubles that count
/// attempts and simulate failures.
#[async_trait]
pub trait DeliveryTransport: Send + Sync {
    /// POST the signed payload and return the response status code.
    async fn deliver(
        &self,
        url: &str,
        headers: &[(&'static str, String)],
        body: &str,
    ) -> anyhow::Result<u16>;
}

/// Production transport backed by `reqwest`.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Construct the transport with its own connection pool.
    ///
    /// # Errors
    ///
    /// Returns [`CallbackError::Transport`] if the HTTP client cannot be
    /// built.
    pub fn new() -> Result<Self, CallbackError> {
        let client = reqwest::Client::builder()
            .timeout(ATTEMPT_TIMEOUT)
            .build()
            .map_err(|source| CallbackError::Transport { source })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl DeliveryTransport for HttpTransport {
    async fn deliver(
        &self,
        url: &str,
        headers: &[(&'static str, String)],
        body: &str,
    ) -> anyhow::Result<u16> {
        let mut request = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/json")
            .body(body.to_string());
        for (name, value) in headers {
            request = request.header(*name, value);
        }
        let response = request.send().await?;
        Ok(response.status().as_u16())
    }
}

/// Signs and delivers callback events for one job.
///
/// Delivery is best-effort by contract: after the final attempt fails the
/// event is logged and dropped, never raised to the pipeline. The control
/// plane is expected to deduplicate on `X-Idempotency-Key` and to fall back
/// to polling the agent when a terminal event goes missing.
pub struct CallbackClient {
    transport: Arc<dyn DeliveryTransport>,
    url: String,
    secret: String,
    correlation_id: String,
}

impl CallbackClient {
    /// Construct a client bound to one job's callback endpoint.
    #[must_use]
    pub fn new(
        transport: Arc<dyn DeliveryTransport>,
        url: impl Into<String>,
        secret: impl Into<String>,
        correlation_id: impl Into<String>,
    ) -> Self {
        Self {
            transport,
            url: url.into(),
            secret: secret.into(),
            correlation_id: correlation_id.into(),
        }
    }

    /// Deliver one event, retrying on any non-2xx response or transport
    /// error. Infallible by design; see the type-level docs.
    pub async fn send(&self, event: &CallbackEvent) {
        let body = match serde_json::to_string(event) {
            Ok(body) => body,
            Err(source) => {
                let err = CallbackError::Serialize { source };
                error!(event = event.kind(), error = %err, "callback event dropped");
                return;
            }
        };

        for attempt in 1..=MAX_ATTEMPTS {
            let timestamp = Utc::now().timestamp();
            let signature = match sign_payload(&self.secret, timestamp, &body) {
                Ok(signature) => signature,
                Err(err) => {
                    error!(event = event.kind(), error = %err, "callback event dropped");
                    return;
                }
            };
            let headers = [
                ("Authorization", format!("Bearer {signature}")),
                ("X-Timestamp", timestamp.to_string()),
                ("X-Correlation-ID", self.correlation_id.clone()),
                ("X-Idempotency-Key", event.idempotency_key().to_string()),
            ];

            match timeout(
                ATTEMPT_TIMEOUT,
                self.transport.deliver(&self.url, &headers, &body),
            )
            .await
            {
                Ok(Ok(status)) if (200..300).contains(&status) => {
                    debug!(event = event.kind(), attempt, "callback delivered");
                    return;
                }
                Ok(Ok(status)) => {
                    warn!(event = event.kind(), attempt, status, "callback rejected");
                }
                Ok(Err(err)) => {
                    warn!(event = event.kind(), attempt, error = %err, "callback delivery failed");
                }
                Err(_) => {
                    warn!(event = event.kind(), attempt, "callback attempt timed out");
                }
            }

            if attempt < MAX_ATTEMPTS {
                sleep(backoff_delay(attempt)).await;
            }
        }

        error!(
            event = event.kind(),
            idempotency_key = event.idempotency_key(),
            "callback delivery exhausted, event dropped"
        );
    }
}

/// Delay before the attempt following `attempt`, capped at 16 seconds.
fn backoff_delay(attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(63);
    let millis = BACKOFF_BASE_MS
        .saturating_mul(1u64 << exponent)
        .min(BACKOFF_CAP_MS);
    Duration::from_millis(millis)
}
