//! Iteration loop shared by every experiment

use super::{ExperimentKind, InstanceScope, Iteration, StrategyContext};
use crate::config::ExperimentConfig;
use crate::error::{Error, Result};
use crate::history::count_workflow_tasks;
use crate::results::{Anomaly, Report, ResultAccumulator, Sample};
use crate::traits::{OrchestrationClient, Payload, StartOptions, WorkflowRun};
use crate::workflow::{DONE_SIGNAL_NAME, WORKFLOW_ID};
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Arc;
use std::time::Instant;
use tokio::time::sleep;
use tracing::{debug, info};
use uuid::Uuid;

/// Run `config.iterations` iterations of `kind` and collect the report
///
/// Any remote-call failure aborts the run; no partial report is returned.
pub async fn run_experiment(
    kind: ExperimentKind,
    client: &Arc<dyn OrchestrationClient>,
    config: &ExperimentConfig,
) -> Result<Report> {
    config.validate()?;

    let strategy = kind.strategy();
    let definition = kind.definition(config);
    let mut pacing = config.pacing.scenario()?;
    let ctx = StrategyContext { client, config };

    let pb = progress_bar(config);
    let mut results = ResultAccumulator::with_capacity(config.iterations);
    let mut shared_run: Option<WorkflowRun> = None;
    let started_at = Utc::now();

    info!(
        experiment = %kind,
        iterations = config.iterations,
        endpoint = client.endpoint(),
        "experiment starting"
    );

    for index in 0..config.iterations {
        let cycle_index = index % config.restart_cadence;
        let conflict_policy = config.conflict_policy_for(index);

        let iteration = match kind.scope() {
            InstanceScope::Shared => {
                if cycle_index == 0 {
                    let options = StartOptions::new(WORKFLOW_ID, &config.task_queue, definition.name())
                        .with_conflict_policy(conflict_policy);
                    let run = client
                        .start_workflow(options)
                        .await
                        .map_err(|e| Error::client("start", e))?;
                    debug!(index, run_id = %run.run_id, "started shared instance");
                    shared_run = Some(run);
                }
                Iteration {
                    index,
                    cycle_index,
                    conflict_policy,
                    workflow_id: WORKFLOW_ID.to_string(),
                    run: shared_run.clone(),
                }
            }
            InstanceScope::PerIteration => Iteration {
                index,
                cycle_index,
                conflict_policy,
                workflow_id: fresh_workflow_id(kind),
                run: None,
            },
        };

        let start = Instant::now();
        let measurement = strategy.measure(&ctx, &iteration).await?;
        let latency_ns = i64::try_from(start.elapsed().as_nanos()).unwrap_or(i64::MAX);

        if let Some(pending) = measurement.pending {
            pending.await?.map_err(|e| Error::client("signal", e))?;
        }

        let workflow_task_count = if config.count_workflow_tasks {
            let run = measurement.run.as_ref().or(iteration.run.as_ref());
            let (workflow_id, run_id) = match run {
                Some(run) => (run.workflow_id.as_str(), run.run_id.as_str()),
                None => (iteration.workflow_id.as_str(), ""),
            };
            let count = count_workflow_tasks(client.as_ref(), workflow_id, run_id)
                .await
                .map_err(|e| Error::client("history", e))?;
            Some(count)
        } else {
            None
        };

        if let Some(kind) = measurement.anomaly {
            results.record_anomaly(Anomaly {
                iteration: index,
                kind,
            });
        }

        results.push(Sample {
            latency_ns,
            poll_count: measurement.poll_count,
            workflow_task_count,
            query_age_ns: measurement.query_age_ns,
        });
        debug!(index, latency_ns, "iteration complete");
        pb.inc(1);

        if index + 1 < config.iterations {
            let delay = pacing.next_delay();
            if !delay.is_zero() {
                sleep(delay).await;
            }
        }
    }

    if let Some(run) = shared_run {
        client
            .signal_workflow(&run.workflow_id, &run.run_id, DONE_SIGNAL_NAME, Payload::Null)
            .await
            .map_err(|e| Error::client("done signal", e))?;
    }

    pb.finish_and_clear();
    let report = results.finish(kind.name(), started_at);
    info!(experiment = %kind, samples = report.latencies_ns.len(), "experiment finished");
    Ok(report)
}

fn fresh_workflow_id(kind: ExperimentKind) -> String {
    let prefix = match kind {
        ExperimentKind::UpdateWithStart => "update-with-start",
        _ => "update-and-start",
    };
    format!("{prefix}-{}", Uuid::new_v4())
}

fn progress_bar(config: &ExperimentConfig) -> ProgressBar {
    if !config.show_progress {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(config.iterations as u64);
    let style = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
        .map(|style| style.progress_chars("#>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb
}
