//! tle-backend: in-process orchestration service
//!
//! Implements the `tle-core` client and worker traits without a network.
//! Each workflow instance runs on its own tokio task (see
//! [`tle_core::workflow::spawn_instance`]); the service keeps the run
//! registry, applies ID conflict policies and records per-run history.
//!
//! ```ignore
//! let backend = LocalBackend::new(BackendConfig::default())?;
//! let client = backend.client()?;
//! let mut worker = backend.worker("tle");
//! ```

#![warn(missing_docs)]

mod client;
mod history;
mod service;
mod worker;

pub use client::LocalClient;
pub use history::RunHistory;
pub use service::LocalBackend;
pub use worker::LocalWorker;
