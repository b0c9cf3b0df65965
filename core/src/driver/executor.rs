//! Driver execution logic

use std::sync::Arc;
use std::time::Instant;

use crate::config::ExperimentConfig;
use crate::error::{Error, Result};
use crate::experiment::{run_experiment, ExperimentKind};
use crate::metrics::LatencySummary;
use crate::results::Report;
use crate::traits::{OrchestrationClient, WorkflowWorker};

/// Completed run
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Full per-iteration report
    pub report: Report,
    /// Latency percentiles
    pub summary: LatencySummary,
}

/// Driver owns one experiment run
pub struct Driver {
    experiment: ExperimentKind,
    config: ExperimentConfig,
    client: Arc<dyn OrchestrationClient>,
    worker: Box<dyn WorkflowWorker>,
}

impl Driver {
    /// Create a new driver
    ///
    /// Use `DriverBuilder` for a more ergonomic construction.
    pub fn new(
        experiment: ExperimentKind,
        config: ExperimentConfig,
        client: Arc<dyn OrchestrationClient>,
        worker: Box<dyn WorkflowWorker>,
    ) -> Self {
        Self {
            experiment,
            config,
            client,
            worker,
        }
    }

    /// Get the experiment configuration
    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    /// Selected experiment
    pub fn experiment(&self) -> ExperimentKind {
        self.experiment
    }

    /// Run the experiment
    ///
    /// The worker is started before the first iteration and stopped after the
    /// last one, including when the run fails.
    pub async fn run(mut self) -> Result<RunOutcome> {
        let start = Instant::now();

        self.worker
            .register(self.experiment.definition(&self.config))
            .map_err(|e| Error::client("register", e))?;
        self.worker
            .start()
            .await
            .map_err(|e| Error::client("worker start", e))?;

        tracing::info!(
            experiment = %self.experiment,
            iterations = self.config.iterations,
            task_queue = %self.worker.task_queue(),
            "Starting experiment"
        );

        let result = run_experiment(self.experiment, &self.client, &self.config).await;
        self.worker.stop().await;

        let report = result?;
        let summary = LatencySummary::from_latencies(&report.latencies_ns)?;

        tracing::info!(
            elapsed_secs = start.elapsed().as_secs_f64(),
            samples = summary.count,
            min_ms = crate::metrics::ns_to_ms(summary.min_ns),
            p50_ms = crate::metrics::ns_to_ms(summary.p50_ns),
            p90_ms = summary.p90_ms(),
            p99_ms = crate::metrics::ns_to_ms(summary.p99_ns),
            max_ms = crate::metrics::ns_to_ms(summary.max_ns),
            anomalies = report.anomalies.len(),
            "Experiment completed"
        );

        Ok(RunOutcome { report, summary })
    }
}
