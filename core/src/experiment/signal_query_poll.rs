use super::{ExperimentKind, Iteration, Measurement, Strategy, StrategyContext};
use crate::error::{Error, Result};
use crate::results::AnomalyKind;
use crate::traits::Payload;
use crate::workflow::{QueryResult, QUERY_NAME, SIGNAL_NAME};
use async_trait::async_trait;
use std::sync::Arc;

/// Send a signal, then query until the counter reflects it
///
/// Counts polls including the one that converged. Exceeding the anomaly
/// threshold is recorded; exceeding the hard limit aborts the run.
pub(super) struct SignalQueryPollStrategy;

#[async_trait]
impl Strategy for SignalQueryPollStrategy {
    fn kind(&self) -> ExperimentKind {
        ExperimentKind::SignalQueryPoll
    }

    async fn measure(&self, ctx: &StrategyContext<'_>, iteration: &Iteration) -> Result<Measurement> {
        let client = Arc::clone(ctx.client);
        let workflow_id = iteration.workflow_id.clone();
        let run_id = iteration.run_id().to_string();
        let payload = Payload::from(iteration.index);
        let pending = tokio::spawn(async move {
            client
                .signal_workflow(&workflow_id, &run_id, SIGNAL_NAME, payload)
                .await
        });

        let expected = iteration.expected_counter();
        let limit = ctx.config.poll_limit;

        for polls in 1..=limit {
            let value = ctx
                .client
                .query_workflow(&iteration.workflow_id, iteration.run_id(), QUERY_NAME)
                .await
                .map_err(|e| Error::client("query", e))?;
            let result: QueryResult =
                serde_json::from_value(value).map_err(|e| Error::payload("query result", e))?;

            if result.counter >= expected {
                let anomaly = (polls > ctx.config.poll_anomaly_threshold)
                    .then_some(AnomalyKind::SlowConvergence { polls });
                return Ok(Measurement {
                    poll_count: Some(polls),
                    anomaly,
                    pending: Some(pending),
                    ..Default::default()
                });
            }

            // Lets the signal task run on a single-threaded runtime
            tokio::task::yield_now().await;
        }

        Err(Error::PollLimitExceeded {
            iteration: iteration.index,
            expected,
            limit,
        })
    }
}
