use super::{ExperimentKind, Iteration, Measurement, Strategy, StrategyContext};
use crate::error::{Error, Result};
use crate::traits::{Payload, StartOptions, UpdateOptions, WaitForStage};
use crate::workflow::{OnceUpdateWorkflow, UPDATE_NAME};
use async_trait::async_trait;

/// Start a fresh instance, then update it, as two sequential calls
pub(super) struct UpdateAndStartStrategy;

#[async_trait]
impl Strategy for UpdateAndStartStrategy {
    fn kind(&self) -> ExperimentKind {
        ExperimentKind::UpdateAndStart
    }

    async fn measure(&self, ctx: &StrategyContext<'_>, iteration: &Iteration) -> Result<Measurement> {
        let start = StartOptions::new(
            &iteration.workflow_id,
            &ctx.config.task_queue,
            OnceUpdateWorkflow::NAME,
        )
        .with_conflict_policy(iteration.conflict_policy);

        let run = ctx
            .client
            .start_workflow(start)
            .await
            .map_err(|e| Error::client("start", e))?;

        let update = UpdateOptions::new(&run.workflow_id, UPDATE_NAME, iteration.update_id())
            .with_run_id(&run.run_id)
            .with_args(Payload::Null)
            .with_wait_for_stage(WaitForStage::Completed);
        let handle = ctx
            .client
            .update_workflow(update)
            .await
            .map_err(|e| Error::client("update", e))?;
        handle.get().await.map_err(|e| Error::client("update", e))?;

        Ok(Measurement {
            run: Some(run),
            ..Default::default()
        })
    }
}
