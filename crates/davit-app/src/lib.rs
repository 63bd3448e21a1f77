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

//! Application wiring for the download agent: configuration and logging
//! bootstrap, engine/pipeline construction, the background disk-hygiene
//! sweep, and the API server lifecycle.

mod bootstrap;
mod error;
mod purge;

pub use bootstrap::run_app;
pub use error::{AppError, AppResult};
