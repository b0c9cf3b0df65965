use super::{ExperimentKind, Iteration, Measurement, Strategy, StrategyContext};
use crate::error::{Error, Result};
use crate::traits::Payload;
use crate::workflow::SIGNAL_NAME;
use async_trait::async_trait;

/// Time from sending a signal to its acknowledgement
///
/// The acknowledgement does not wait for the instance to process the signal.
pub(super) struct SignalStrategy;

#[async_trait]
impl Strategy for SignalStrategy {
    fn kind(&self) -> ExperimentKind {
        ExperimentKind::Signal
    }

    async fn measure(&self, ctx: &StrategyContext<'_>, iteration: &Iteration) -> Result<Measurement> {
        ctx.client
            .signal_workflow(
                &iteration.workflow_id,
                iteration.run_id(),
                SIGNAL_NAME,
                Payload::from(iteration.index),
            )
            .await
            .map_err(|e| Error::client("signal", e))?;
        Ok(Measurement::default())
    }
}
