//! Experiment driver: top-level run lifecycle
//!
//! The driver pairs an experiment with its workflow definition, registers
//! that definition on the worker, runs the iteration loop against the client
//! and summarizes the latencies.
//!
//! # Example
//!
//! ```ignore
//! use tle_core::{DriverBuilder, ExperimentConfig, ExperimentKind};
//!
//! let driver = DriverBuilder::new()
//!     .experiment(ExperimentKind::SignalQuery)
//!     .config(ExperimentConfig::new(100))
//!     .client(client)
//!     .worker(worker)
//!     .build()?;
//!
//! let outcome = driver.run().await?;
//! eprintln!("p90: {:.1}", outcome.summary.p90_ms());
//! ```

mod builder;
mod executor;

pub use builder::DriverBuilder;
pub use executor::{Driver, RunOutcome};

#[cfg(test)]
mod tests;
