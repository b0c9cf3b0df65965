use super::{
    HandlerKind, HandlerSet, Workflow, WorkflowDefinition, WorkflowError, DONE_SIGNAL_NAME,
    UPDATE_NAME,
};
use crate::traits::Payload;

/// Adds each `my-update` argument to a running total and returns it
#[derive(Debug, Default)]
pub struct AccumulatorWorkflow {
    counter: i64,
    done: bool,
}

impl AccumulatorWorkflow {
    /// Registered type name
    pub const NAME: &'static str = "AccumulatorWorkflow";

    /// Definition for worker registration
    pub fn definition() -> WorkflowDefinition {
        WorkflowDefinition::new(Self::NAME, |_| Ok(Box::<AccumulatorWorkflow>::default()))
    }
}

impl Workflow for AccumulatorWorkflow {
    fn register(&self, handlers: &mut HandlerSet) -> Result<(), WorkflowError> {
        handlers.update(UPDATE_NAME)?;
        handlers.signal(DONE_SIGNAL_NAME)
    }

    fn handle_signal(&mut self, name: &str, _payload: Payload) -> Result<(), WorkflowError> {
        if name != DONE_SIGNAL_NAME {
            return Err(WorkflowError::UnknownHandler {
                kind: HandlerKind::Signal,
                name: name.to_string(),
            });
        }
        self.done = true;
        Ok(())
    }

    fn handle_query(&self, name: &str) -> Result<Payload, WorkflowError> {
        Err(WorkflowError::UnknownHandler {
            kind: HandlerKind::Query,
            name: name.to_string(),
        })
    }

    fn handle_update(&mut self, _name: &str, args: Payload) -> Result<Payload, WorkflowError> {
        let value: i64 = serde_json::from_value(args)?;
        self.counter = self
            .counter
            .checked_add(value)
            .ok_or_else(|| WorkflowError::Failed(format!("counter overflow adding {value}")))?;
        Ok(Payload::from(self.counter))
    }

    fn completion(&self) -> Option<Payload> {
        self.done.then(|| Payload::from(self.counter))
    }
}
