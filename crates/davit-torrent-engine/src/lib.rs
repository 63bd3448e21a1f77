#![deny(unsafe_code)]
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

//! Production download engine adapter.
//!
//! The adapter owns a background worker task that drives a
//! [`session::TorrentSession`], the boundary behind which the external
//! download library lives, and folds its push-style events into per-job
//! progress channels consumed through
//! [`davit_torrent_core::ProgressStream`].

mod command;
mod engine;
/// Session boundary to the external download library, plus the simulated
/// session used by tests and library-less builds.
pub mod session;
mod worker;

pub use engine::{SessionEngine, UPLOAD_CAP_BPS};
pub use session::{SimSession, TorrentSession, create_session};
