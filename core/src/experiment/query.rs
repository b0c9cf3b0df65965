use super::{ExperimentKind, Iteration, Measurement, Strategy, StrategyContext};
use crate::error::{Error, Result};
use crate::workflow::{QueryResult, QUERY_NAME};
use async_trait::async_trait;

/// Time from sending a query to its response
pub(super) struct QueryStrategy;

#[async_trait]
impl Strategy for QueryStrategy {
    fn kind(&self) -> ExperimentKind {
        ExperimentKind::Query
    }

    async fn measure(&self, ctx: &StrategyContext<'_>, iteration: &Iteration) -> Result<Measurement> {
        let value = ctx
            .client
            .query_workflow(&iteration.workflow_id, iteration.run_id(), QUERY_NAME)
            .await
            .map_err(|e| Error::client("query", e))?;
        // Decoded only to confirm the response shape
        let _: QueryResult =
            serde_json::from_value(value).map_err(|e| Error::payload("query result", e))?;
        Ok(Measurement::default())
    }
}
