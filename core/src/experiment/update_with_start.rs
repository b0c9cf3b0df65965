use super::{ExperimentKind, Iteration, Measurement, Strategy, StrategyContext};
use crate::error::{Error, Result};
use crate::traits::{StartOptions, UpdateOptions, WaitForStage};
use crate::workflow::{OnceUpdateWorkflow, UPDATE_NAME};
use async_trait::async_trait;
use tracing::debug;

/// Start a fresh instance and deliver its first update in one call
///
/// Clients without a native combined operation fall back to two sequential
/// calls inside [`OrchestrationClient::update_with_start`].
///
/// [`OrchestrationClient::update_with_start`]: crate::traits::OrchestrationClient::update_with_start
pub(super) struct UpdateWithStartStrategy;

#[async_trait]
impl Strategy for UpdateWithStartStrategy {
    fn kind(&self) -> ExperimentKind {
        ExperimentKind::UpdateWithStart
    }

    async fn measure(&self, ctx: &StrategyContext<'_>, iteration: &Iteration) -> Result<Measurement> {
        if iteration.index == 0 && !ctx.client.supports_update_with_start() {
            debug!("client has no native update-with-start; issuing start and update separately");
        }

        let start = StartOptions::new(
            &iteration.workflow_id,
            &ctx.config.task_queue,
            OnceUpdateWorkflow::NAME,
        )
        .with_conflict_policy(iteration.conflict_policy);
        let update = UpdateOptions::new(&iteration.workflow_id, UPDATE_NAME, iteration.update_id())
            .with_wait_for_stage(WaitForStage::Completed);

        let (run, handle) = ctx
            .client
            .update_with_start(start, update)
            .await
            .map_err(|e| Error::client("update-with-start", e))?;
        handle
            .get()
            .await
            .map_err(|e| Error::client("update-with-start", e))?;

        Ok(Measurement {
            run: Some(run),
            ..Default::default()
        })
    }
}
