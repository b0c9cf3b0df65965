use super::{ExperimentKind, Iteration, Measurement, Strategy, StrategyContext};
use crate::error::{Error, Result};
use crate::traits::{Payload, UpdateOptions, WaitForStage};
use crate::workflow::UPDATE_NAME;
use async_trait::async_trait;

/// Execute an update on the shared instance and wait for its result
///
/// Each update adds 1, so the result equals the cycle's iteration count.
pub(super) struct UpdateStrategy;

#[async_trait]
impl Strategy for UpdateStrategy {
    fn kind(&self) -> ExperimentKind {
        ExperimentKind::Update
    }

    async fn measure(&self, ctx: &StrategyContext<'_>, iteration: &Iteration) -> Result<Measurement> {
        let options = UpdateOptions::new(&iteration.workflow_id, UPDATE_NAME, iteration.update_id())
            .with_run_id(iteration.run_id())
            .with_args(Payload::from(1))
            .with_wait_for_stage(WaitForStage::Completed);

        let handle = ctx
            .client
            .update_workflow(options)
            .await
            .map_err(|e| Error::client("update", e))?;
        let value = handle.get().await.map_err(|e| Error::client("update", e))?;
        let _: i64 = serde_json::from_value(value).map_err(|e| Error::payload("update result", e))?;

        Ok(Measurement::default())
    }
}
