use super::{
    HandlerKind, HandlerSet, Workflow, WorkflowDefinition, WorkflowError, DONE_SIGNAL_NAME,
    QUERY_NAME, SIGNAL_NAME,
};
use crate::traits::Payload;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Result of `my-query`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    /// Signals processed so far
    pub counter: i64,
    /// Nanoseconds since the last signal (or since start, before any signal)
    pub query_time: i64,
}

/// Counts `my-signal` deliveries until `Done`
///
/// The signal payload must be an integer; its value is not used.
#[derive(Debug)]
pub struct CounterWorkflow {
    counter: i64,
    last_signal_at: Instant,
    done: bool,
}

impl CounterWorkflow {
    /// Registered type name
    pub const NAME: &'static str = "CounterWorkflow";

    /// Fresh instance with a zero counter
    pub fn new() -> Self {
        Self {
            counter: 0,
            last_signal_at: Instant::now(),
            done: false,
        }
    }

    /// Definition for worker registration
    pub fn definition() -> WorkflowDefinition {
        WorkflowDefinition::new(Self::NAME, |_| Ok(Box::new(CounterWorkflow::new())))
    }
}

impl Default for CounterWorkflow {
    fn default() -> Self {
        Self::new()
    }
}

impl Workflow for CounterWorkflow {
    fn register(&self, handlers: &mut HandlerSet) -> Result<(), WorkflowError> {
        handlers.signal(SIGNAL_NAME)?;
        handlers.signal(DONE_SIGNAL_NAME)?;
        handlers.query(QUERY_NAME)
    }

    fn handle_signal(&mut self, name: &str, payload: Payload) -> Result<(), WorkflowError> {
        match name {
            SIGNAL_NAME => {
                self.last_signal_at = Instant::now();
                let _value: i64 = serde_json::from_value(payload)?;
                self.counter += 1;
            }
            DONE_SIGNAL_NAME => self.done = true,
            _ => {
                return Err(WorkflowError::UnknownHandler {
                    kind: HandlerKind::Signal,
                    name: name.to_string(),
                })
            }
        }
        Ok(())
    }

    fn handle_query(&self, name: &str) -> Result<Payload, WorkflowError> {
        if name != QUERY_NAME {
            return Err(WorkflowError::UnknownHandler {
                kind: HandlerKind::Query,
                name: name.to_string(),
            });
        }
        let result = QueryResult {
            counter: self.counter,
            query_time: self.last_signal_at.elapsed().as_nanos() as i64,
        };
        Ok(serde_json::to_value(result)?)
    }

    fn completion(&self) -> Option<Payload> {
        self.done.then(|| Payload::from(self.counter))
    }
}
