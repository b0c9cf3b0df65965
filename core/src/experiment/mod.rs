//! Experiment registry and per-iteration strategies
//!
//! Every experiment shares the loop in [`runner`]: restart the instance on the
//! cadence boundary, time the strategy's remote calls, accumulate the sample,
//! pace. A [`Strategy`] only decides which calls one iteration makes.

mod query;
mod runner;
mod signal;
mod signal_query;
mod signal_query_poll;
mod update;
mod update_and_start;
mod update_with_start;


pub use runner::run_experiment;

use crate::config::ExperimentConfig;
use crate::error::{Error, Result};
use crate::results::AnomalyKind;
use crate::traits::{ClientError, ConflictPolicy, OrchestrationClient, WorkflowRun};
use crate::workflow::{
    AccumulatorWorkflow, CounterWorkflow, OnceUpdateWorkflow, WorkflowDefinition,
};
use async_trait::async_trait;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Registered experiments
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExperimentKind {
    /// Query a long-lived instance
    Query,
    /// Signal a long-lived instance; time the acknowledgement
    Signal,
    /// Signal and query concurrently; check the query saw the signal
    SignalQuery,
    /// Signal, then query until the counter converges
    SignalQueryPoll,
    /// Synchronous update on a long-lived instance
    Update,
    /// Start a fresh instance, then update it
    UpdateAndStart,
    /// Start a fresh instance and update it in one call
    UpdateWithStart,
}

/// Whether iterations share one long-lived instance or each start their own
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstanceScope {
    /// One instance per restart cycle, completed with `Done` after the loop
    Shared,
    /// A fresh workflow ID every iteration
    PerIteration,
}

impl ExperimentKind {
    /// All experiments, in listing order
    pub const ALL: [ExperimentKind; 7] = [
        ExperimentKind::Query,
        ExperimentKind::Signal,
        ExperimentKind::SignalQuery,
        ExperimentKind::SignalQueryPoll,
        ExperimentKind::Update,
        ExperimentKind::UpdateAndStart,
        ExperimentKind::UpdateWithStart,
    ];

    /// Registry name
    pub fn name(&self) -> &'static str {
        match self {
            ExperimentKind::Query => "query",
            ExperimentKind::Signal => "signal",
            ExperimentKind::SignalQuery => "signalquery",
            ExperimentKind::SignalQueryPoll => "signalquerypoll",
            ExperimentKind::Update => "update",
            ExperimentKind::UpdateAndStart => "updateandstart",
            ExperimentKind::UpdateWithStart => "updatewithstart",
        }
    }

    /// One-line description for `--list`
    pub fn description(&self) -> &'static str {
        match self {
            ExperimentKind::Query => "query a running instance and wait for the response",
            ExperimentKind::Signal => "send a signal and wait for the acknowledgement",
            ExperimentKind::SignalQuery => {
                "send a signal and a query concurrently; check the query read the signal's write"
            }
            ExperimentKind::SignalQueryPoll => {
                "send a signal, then query until the counter reflects it"
            }
            ExperimentKind::Update => "execute an update and wait for its result",
            ExperimentKind::UpdateAndStart => {
                "start a fresh instance, then execute its first update"
            }
            ExperimentKind::UpdateWithStart => {
                "start a fresh instance and execute its first update in one call"
            }
        }
    }

    /// Instance lifecycle used by this experiment
    pub fn scope(&self) -> InstanceScope {
        match self {
            ExperimentKind::UpdateAndStart | ExperimentKind::UpdateWithStart => {
                InstanceScope::PerIteration
            }
            _ => InstanceScope::Shared,
        }
    }

    /// Workflow definition the worker must host
    pub fn definition(&self, config: &ExperimentConfig) -> WorkflowDefinition {
        match self {
            ExperimentKind::Query
            | ExperimentKind::Signal
            | ExperimentKind::SignalQuery
            | ExperimentKind::SignalQueryPoll => CounterWorkflow::definition(),
            ExperimentKind::Update => AccumulatorWorkflow::definition(),
            ExperimentKind::UpdateAndStart | ExperimentKind::UpdateWithStart => {
                OnceUpdateWorkflow::definition(config.update_completion_timeout)
            }
        }
    }

    /// Per-iteration strategy
    pub fn strategy(&self) -> Box<dyn Strategy> {
        match self {
            ExperimentKind::Query => Box::new(query::QueryStrategy),
            ExperimentKind::Signal => Box::new(signal::SignalStrategy),
            ExperimentKind::SignalQuery => Box::new(signal_query::SignalQueryStrategy),
            ExperimentKind::SignalQueryPoll => {
                Box::new(signal_query_poll::SignalQueryPollStrategy)
            }
            ExperimentKind::Update => Box::new(update::UpdateStrategy),
            ExperimentKind::UpdateAndStart => Box::new(update_and_start::UpdateAndStartStrategy),
            ExperimentKind::UpdateWithStart => {
                Box::new(update_with_start::UpdateWithStartStrategy)
            }
        }
    }

    /// Comma-separated registry names
    pub fn available() -> String {
        Self::ALL
            .iter()
            .map(|kind| kind.name())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for ExperimentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ExperimentKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.name() == s)
            .ok_or_else(|| Error::UnknownExperiment {
                name: s.to_string(),
                available: Self::available(),
            })
    }
}

/// What one iteration targets
#[derive(Debug, Clone)]
pub struct Iteration {
    /// Zero-based iteration index
    pub index: usize,
    /// Iterations since the shared instance was (re)created
    pub cycle_index: usize,
    /// Conflict policy for any start issued this iteration
    pub conflict_policy: ConflictPolicy,
    /// Workflow ID targeted this iteration
    pub workflow_id: String,
    /// Current run of the shared instance; `None` for per-iteration scope
    pub run: Option<WorkflowRun>,
}

impl Iteration {
    /// Run ID to target, empty for "latest"
    pub fn run_id(&self) -> &str {
        self.run.as_ref().map_or("", |run| run.run_id.as_str())
    }

    /// Update ID for this iteration
    pub fn update_id(&self) -> String {
        self.index.to_string()
    }

    /// Counter value the shared counter instance holds after this iteration's signal
    pub fn expected_counter(&self) -> i64 {
        self.cycle_index as i64 + 1
    }
}

/// Shared state handed to a strategy
pub struct StrategyContext<'a> {
    /// Client under test
    pub client: &'a Arc<dyn OrchestrationClient>,
    /// Run configuration
    pub config: &'a ExperimentConfig,
}

/// Result of one iteration's remote calls
#[derive(Debug, Default)]
pub struct Measurement {
    /// Queries issued before convergence
    pub poll_count: Option<u32>,
    /// Query-reported time since the last signal
    pub query_age_ns: Option<i64>,
    /// Non-fatal observation
    pub anomaly: Option<AnomalyKind>,
    /// Run started during this iteration
    pub run: Option<WorkflowRun>,
    /// Call still in flight when the measured call returned; joined after the clock stops
    pub pending: Option<JoinHandle<std::result::Result<(), ClientError>>>,
}

/// One interaction pattern
#[async_trait]
pub trait Strategy: Send + Sync {
    /// Experiment this strategy implements
    fn kind(&self) -> ExperimentKind;

    /// Issue one iteration's remote calls; the caller times this call
    async fn measure(&self, ctx: &StrategyContext<'_>, iteration: &Iteration)
        -> Result<Measurement>;
}
