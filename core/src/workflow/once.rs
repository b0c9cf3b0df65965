use super::{HandlerKind, HandlerSet, Workflow, WorkflowDefinition, WorkflowError, UPDATE_NAME};
use crate::traits::Payload;
use std::time::Duration;

/// Completes after its first `my-update`, or after a bounded wait
#[derive(Debug)]
pub struct OnceUpdateWorkflow {
    timeout: Duration,
    done: bool,
}

impl OnceUpdateWorkflow {
    /// Registered type name
    pub const NAME: &'static str = "OnceUpdateWorkflow";

    /// Fresh instance that gives up waiting after `timeout`
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            done: false,
        }
    }

    /// Definition for worker registration
    pub fn definition(timeout: Duration) -> WorkflowDefinition {
        WorkflowDefinition::new(Self::NAME, move |_| {
            Ok(Box::new(OnceUpdateWorkflow::new(timeout)))
        })
    }
}

impl Workflow for OnceUpdateWorkflow {
    fn register(&self, handlers: &mut HandlerSet) -> Result<(), WorkflowError> {
        handlers.update(UPDATE_NAME)
    }

    fn handle_signal(&mut self, name: &str, _payload: Payload) -> Result<(), WorkflowError> {
        Err(WorkflowError::UnknownHandler {
            kind: HandlerKind::Signal,
            name: name.to_string(),
        })
    }

    fn handle_query(&self, name: &str) -> Result<Payload, WorkflowError> {
        Err(WorkflowError::UnknownHandler {
            kind: HandlerKind::Query,
            name: name.to_string(),
        })
    }

    fn handle_update(&mut self, _name: &str, _args: Payload) -> Result<Payload, WorkflowError> {
        self.done = true;
        Ok(Payload::Null)
    }

    fn completion(&self) -> Option<Payload> {
        self.done.then_some(Payload::Null)
    }

    fn completion_timeout(&self) -> Option<Duration> {
        Some(self.timeout)
    }
}
