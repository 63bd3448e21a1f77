//! Signed callback protocol between the agent and its control plane.
//!
//! Every lifecycle event a job produces is delivered as a `POST` to the
//! job's callback URL, signed with HMAC-SHA256 over
//! `"<unixSeconds>.<jsonBody>"` and deduplicated on the receiver side via
//! per-event idempotency keys. Delivery is retried with exponential backoff
//! and, deliberately, never escalates to the caller: a control plane that
//! stays down through the whole retry window loses the event and must poll
//! the agent's status route instead.

pub mod client;
pub mod error;
pub mod event;
pub mod sign;

pub use client::{CallbackClient, DeliveryTransport, HttpTransport};
pub use error::CallbackError;
pub use event::{CallbackEvent, EventMeta, ScanOutcome, ScanReport};
pub use sign::sign_payload;
