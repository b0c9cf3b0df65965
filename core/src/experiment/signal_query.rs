use super::{ExperimentKind, Iteration, Measurement, Strategy, StrategyContext};
use crate::config::ConsistencyMode;
use crate::error::{Error, Result};
use crate::results::AnomalyKind;
use crate::traits::Payload;
use crate::workflow::{QueryResult, QUERY_NAME, SIGNAL_NAME};
use async_trait::async_trait;
use std::sync::Arc;

/// Send a signal and, without waiting for its acknowledgement, a query
///
/// Times the query. The signal's handle is returned unjoined so the runner
/// can wait for it after the clock stops. Whether the query observed the
/// signal's write is backend-determined; a miss is either recorded or fatal
/// depending on [`ConsistencyMode`].
pub(super) struct SignalQueryStrategy;

#[async_trait]
impl Strategy for SignalQueryStrategy {
    fn kind(&self) -> ExperimentKind {
        ExperimentKind::SignalQuery
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

        let value = ctx
            .client
            .query_workflow(&iteration.workflow_id, iteration.run_id(), QUERY_NAME)
            .await
            .map_err(|e| Error::client("query", e))?;
        let result: QueryResult =
            serde_json::from_value(value).map_err(|e| Error::payload("query result", e))?;

        let mut measurement = Measurement {
            query_age_ns: Some(result.query_time),
            pending: Some(pending),
            ..Default::default()
        };

        let expected = iteration.expected_counter();
        if result.counter != expected {
            match ctx.config.consistency {
                ConsistencyMode::Strict => {
                    return Err(Error::ConsistencyViolation {
                        iteration: iteration.index,
                        expected,
                        observed: result.counter,
                    })
                }
                ConsistencyMode::Observational => {
                    measurement.anomaly = Some(AnomalyKind::StaleQuery {
                        expected,
                        observed: result.counter,
                    });
                }
            }
        }

        Ok(measurement)
    }
}
