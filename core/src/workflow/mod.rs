//! Durable state machines and the event loop that hosts them
//!
//! A [`Workflow`] is a single-owner state object. It is never shared: the
//! backend hands it to [`spawn_instance`], which moves it into one tokio task
//! and exposes only message-passing entry points through [`InstanceHandle`].
//! Signals, queries and updates are dequeued and handled one at a time, so a
//! query always observes the state between two handler executions.
//!
//! Three definitions are provided:
//!
//! - [`CounterWorkflow`]: counts `my-signal` deliveries, answers `my-query`
//! - [`AccumulatorWorkflow`]: `my-update` adds its argument and returns the sum
//! - [`OnceUpdateWorkflow`]: completes after its first `my-update` or a timeout

mod accumulator;
mod counter;
mod event_loop;
mod once;

#[cfg(test)]
mod tests;

pub use accumulator::AccumulatorWorkflow;
pub use counter::{CounterWorkflow, QueryResult};
pub use event_loop::{spawn_instance, Event, InstanceHandle, Termination};
pub use once::OnceUpdateWorkflow;

use crate::traits::Payload;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Signal that increments the counter
pub const SIGNAL_NAME: &str = "my-signal";

/// Query returning the counter and time since the last signal
pub const QUERY_NAME: &str = "my-query";

/// Update handled by the update-bearing workflows
pub const UPDATE_NAME: &str = "my-update";

/// Signal that completes a long-lived instance
pub const DONE_SIGNAL_NAME: &str = "Done";

/// Workflow ID shared by the long-lived experiments
pub const WORKFLOW_ID: &str = "my-workflow-id";

/// Default task queue
pub const TASK_QUEUE: &str = "tle";

/// Handler category
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandlerKind {
    /// Asynchronous, no result
    Signal,
    /// Read-only, returns a value
    Query,
    /// Mutating, returns a value
    Update,
}

impl fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HandlerKind::Signal => "signal",
            HandlerKind::Query => "query",
            HandlerKind::Update => "update",
        };
        f.write_str(s)
    }
}

/// Errors raised by workflow code
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Two handlers of the same kind share a name
    #[error("duplicate {kind} handler: {name}")]
    DuplicateHandler {
        /// Handler kind
        kind: HandlerKind,
        /// Handler name
        name: String,
    },

    /// No handler of this kind is registered under the name
    #[error("no {kind} handler named {name}")]
    UnknownHandler {
        /// Handler kind
        kind: HandlerKind,
        /// Handler name
        name: String,
    },

    /// A payload or argument did not decode
    #[error("payload decode failed: {0}")]
    Payload(#[from] serde_json::Error),

    /// Workflow code failed
    #[error("{0}")]
    Failed(String),
}

/// Handler names a workflow declares at startup
#[derive(Debug, Default)]
pub struct HandlerSet {
    handlers: HashSet<(HandlerKind, String)>,
}

impl HandlerSet {
    /// Declare a handler; fails if one of the same kind and name exists
    pub fn register(&mut self, kind: HandlerKind, name: &str) -> Result<(), WorkflowError> {
        if !self.handlers.insert((kind, name.to_string())) {
            return Err(WorkflowError::DuplicateHandler {
                kind,
                name: name.to_string(),
            });
        }
        Ok(())
    }

    /// Declare a signal handler
    pub fn signal(&mut self, name: &str) -> Result<(), WorkflowError> {
        self.register(HandlerKind::Signal, name)
    }

    /// Declare a query handler
    pub fn query(&mut self, name: &str) -> Result<(), WorkflowError> {
        self.register(HandlerKind::Query, name)
    }

    /// Declare an update handler
    pub fn update(&mut self, name: &str) -> Result<(), WorkflowError> {
        self.register(HandlerKind::Update, name)
    }

    /// Whether a handler is declared
    pub fn has(&self, kind: HandlerKind, name: &str) -> bool {
        self.handlers.contains(&(kind, name.to_string()))
    }
}

/// A durable state machine
///
/// Handlers run to completion on the instance's own task and are never
/// re-entered. Only handlers declared in [`Workflow::register`] are invoked.
pub trait Workflow: Send + 'static {
    /// Declare handlers; an error fails the start
    fn register(&self, handlers: &mut HandlerSet) -> Result<(), WorkflowError>;

    /// Apply a signal
    fn handle_signal(&mut self, name: &str, payload: Payload) -> Result<(), WorkflowError>;

    /// Evaluate a query against committed state
    fn handle_query(&self, name: &str) -> Result<Payload, WorkflowError>;

    /// Apply an update and return its result
    fn handle_update(&mut self, _name: &str, _args: Payload) -> Result<Payload, WorkflowError> {
        Err(WorkflowError::Failed("updates are not supported".into()))
    }

    /// `Some(result)` once the workflow has finished
    fn completion(&self) -> Option<Payload>;

    /// Upper bound on how long the instance waits to finish
    fn completion_timeout(&self) -> Option<Duration> {
        None
    }

    /// Result returned when the completion timeout elapses
    fn on_timeout(&mut self) -> Payload {
        Payload::Null
    }
}

/// Constructor for a workflow instance from its start input
pub type WorkflowFactory =
    dyn Fn(&Payload) -> Result<Box<dyn Workflow>, WorkflowError> + Send + Sync;

/// Named, registrable workflow type
#[derive(Clone)]
pub struct WorkflowDefinition {
    name: String,
    factory: Arc<WorkflowFactory>,
}

impl WorkflowDefinition {
    /// Create a definition
    pub fn new<F>(name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(&Payload) -> Result<Box<dyn Workflow>, WorkflowError> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            factory: Arc::new(factory),
        }
    }

    /// Workflow type name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Build a fresh instance
    pub fn instantiate(&self, input: &Payload) -> Result<Box<dyn Workflow>, WorkflowError> {
        (self.factory)(input)
    }
}

impl fmt::Debug for WorkflowDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkflowDefinition")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
