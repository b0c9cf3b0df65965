//! tle-core: experiment engine for orchestration latency experiments
//!
//! This crate provides everything the harness needs except a concrete
//! orchestration service:
//!
//! - Durable state machines and their single-task event loop ([`workflow`])
//! - Experiment strategies and the shared iteration loop ([`experiment`])
//! - The top-level run lifecycle ([`driver`])
//! - Quantile aggregation and the per-run report ([`metrics`], [`results`])
//! - Client and worker seam traits implemented by backends ([`traits`])

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod driver;
pub mod error;
pub mod experiment;
pub mod history;
pub mod metrics;
pub mod results;
pub mod scenarios;
pub mod traits;
pub mod workflow;

pub use config::{
    BackendConfig, ConfigError, ConflictPolicySchedule, ConnectionConfig, ConsistencyMode,
    ExperimentConfig, RemoteEndpoint,
};
pub use driver::{Driver, DriverBuilder, RunOutcome};
pub use error::{Error, Result};
pub use experiment::{run_experiment, ExperimentKind, InstanceScope};
pub use history::{count_workflow_tasks, workflow_task_count, EventType, HistorySink};
pub use metrics::{ns_to_ms, quantile, LatencySummary, QuantileError};
pub use results::{Anomaly, AnomalyKind, Report, ResultAccumulator, Sample};
pub use scenarios::{Pacing, Scenario};
pub use traits::*;
pub use workflow::{WorkflowDefinition, WorkflowError};
