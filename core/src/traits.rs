//! Core traits for orchestration clients and workers
//!
//! These traits are defined in core so that experiment strategies can be
//! written against them without depending on any particular backend.
//! Implementations live in their respective crates (backend/).

use crate::history::EventType;
use crate::workflow::WorkflowDefinition;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

/// Opaque value carried by signals, queries and updates
pub type Payload = serde_json::Value;

// ============================================================================
// Call options
// ============================================================================

/// Rule applied when a start request names a workflow ID that already has a
/// running instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicy {
    /// Reject the start request
    Fail,
    /// Terminate the running instance and start a new run in its place
    TerminateExisting,
}

/// Lifecycle stage an update call waits for before returning its handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WaitForStage {
    /// Return once the instance has accepted the update
    Accepted,
    /// Return once the update handler has run to completion
    Completed,
}

/// Options for starting a workflow instance
#[derive(Debug, Clone)]
pub struct StartOptions {
    /// Workflow ID
    pub id: String,
    /// Task queue the instance is routed to
    pub task_queue: String,
    /// Registered workflow type to instantiate
    pub workflow: String,
    /// Conflict policy against a running instance with the same ID
    pub conflict_policy: ConflictPolicy,
    /// Input handed to the workflow definition
    pub input: Payload,
}

impl StartOptions {
    /// Create start options with the `Fail` conflict policy and no input
    pub fn new(
        id: impl Into<String>,
        task_queue: impl Into<String>,
        workflow: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            task_queue: task_queue.into(),
            workflow: workflow.into(),
            conflict_policy: ConflictPolicy::Fail,
            input: Payload::Null,
        }
    }

    /// Set the conflict policy
    pub fn with_conflict_policy(mut self, policy: ConflictPolicy) -> Self {
        self.conflict_policy = policy;
        self
    }

    /// Set the workflow input
    pub fn with_input(mut self, input: Payload) -> Self {
        self.input = input;
        self
    }
}

/// Identity of a started run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowRun {
    /// Workflow ID
    pub workflow_id: String,
    /// Run ID assigned by the service
    pub run_id: String,
}

/// Options for an update call
#[derive(Debug, Clone)]
pub struct UpdateOptions {
    /// Target workflow ID
    pub workflow_id: String,
    /// Target run; empty means the latest run
    pub run_id: String,
    /// Registered update handler name
    pub update_name: String,
    /// Caller-chosen update ID
    pub update_id: String,
    /// Update argument
    pub args: Payload,
    /// Stage to wait for before returning
    pub wait_for_stage: WaitForStage,
}

impl UpdateOptions {
    /// Create update options targeting the latest run, waiting for completion
    pub fn new(
        workflow_id: impl Into<String>,
        update_name: impl Into<String>,
        update_id: impl Into<String>,
    ) -> Self {
        Self {
            workflow_id: workflow_id.into(),
            run_id: String::new(),
            update_name: update_name.into(),
            update_id: update_id.into(),
            args: Payload::Null,
            wait_for_stage: WaitForStage::Completed,
        }
    }

    /// Set the update argument
    pub fn with_args(mut self, args: Payload) -> Self {
        self.args = args;
        self
    }

    /// Pin the update to a run
    pub fn with_run_id(mut self, run_id: impl Into<String>) -> Self {
        self.run_id = run_id.into();
        self
    }

    /// Set the stage to wait for
    pub fn with_wait_for_stage(mut self, stage: WaitForStage) -> Self {
        self.wait_for_stage = stage;
        self
    }
}

/// Handle to an in-flight or completed update
#[derive(Debug)]
pub struct UpdateHandle {
    update_id: String,
    outcome: UpdateOutcome,
}

#[derive(Debug)]
enum UpdateOutcome {
    Ready(Result<Payload, ClientError>),
    Pending(oneshot::Receiver<Result<Payload, ClientError>>),
}

impl UpdateHandle {
    /// Handle whose result is already known
    pub fn completed(update_id: impl Into<String>, result: Result<Payload, ClientError>) -> Self {
        Self {
            update_id: update_id.into(),
            outcome: UpdateOutcome::Ready(result),
        }
    }

    /// Handle whose result will arrive on `rx`
    pub fn pending(
        update_id: impl Into<String>,
        rx: oneshot::Receiver<Result<Payload, ClientError>>,
    ) -> Self {
        Self {
            update_id: update_id.into(),
            outcome: UpdateOutcome::Pending(rx),
        }
    }

    /// The update ID this handle tracks
    pub fn update_id(&self) -> &str {
        &self.update_id
    }

    /// Wait for the update result
    pub async fn get(self) -> Result<Payload, ClientError> {
        match self.outcome {
            UpdateOutcome::Ready(result) => result,
            UpdateOutcome::Pending(rx) => rx.await.map_err(|_| ClientError::Terminated {
                workflow_id: String::new(),
                reason: format!("instance closed before update {} completed", self.update_id),
            })?,
        }
    }
}

// ============================================================================
// Orchestration Client Trait
// ============================================================================

/// Client for the orchestration service under test
///
/// Implementations own connection handling, serialization and any retry
/// policy. Strategies call these methods and treat every error as fatal.
#[async_trait]
pub trait OrchestrationClient: Send + Sync {
    /// Human-readable endpoint description (e.g. "local", "host:7233")
    fn endpoint(&self) -> &str;

    /// Start a workflow instance
    async fn start_workflow(&self, options: StartOptions) -> Result<WorkflowRun, ClientError>;

    /// Deliver a signal; returns once the service has accepted it
    async fn signal_workflow(
        &self,
        workflow_id: &str,
        run_id: &str,
        signal_name: &str,
        payload: Payload,
    ) -> Result<(), ClientError>;

    /// Evaluate a query against the instance's committed state
    async fn query_workflow(
        &self,
        workflow_id: &str,
        run_id: &str,
        query_name: &str,
    ) -> Result<Payload, ClientError>;

    /// Issue an update; returns once `options.wait_for_stage` is reached
    async fn update_workflow(&self, options: UpdateOptions) -> Result<UpdateHandle, ClientError>;

    /// Whether `update_with_start` is a single native operation
    fn supports_update_with_start(&self) -> bool {
        false
    }

    /// Start an instance and deliver its first update
    ///
    /// The default implementation issues the two calls in sequence. Backends
    /// with a combined operation override this and `supports_update_with_start`.
    async fn update_with_start(
        &self,
        start: StartOptions,
        update: UpdateOptions,
    ) -> Result<(WorkflowRun, UpdateHandle), ClientError> {
        let run = self.start_workflow(start).await?;
        let handle = self
            .update_workflow(update.with_run_id(run.run_id.clone()))
            .await?;
        Ok((run, handle))
    }

    /// Read the event types recorded in a run's history
    async fn get_workflow_history(
        &self,
        workflow_id: &str,
        run_id: &str,
    ) -> Result<Vec<EventType>, ClientError>;
}

// ============================================================================
// Worker Trait
// ============================================================================

/// Worker process hosting workflow definitions on a task queue
#[async_trait]
pub trait WorkflowWorker: Send + Sync {
    /// Task queue this worker polls
    fn task_queue(&self) -> &str;

    /// Register a workflow definition; must be called before `start`
    fn register(&mut self, definition: WorkflowDefinition) -> Result<(), ClientError>;

    /// Begin polling the task queue
    async fn start(&mut self) -> Result<(), ClientError>;

    /// Stop polling; running instances are left to the service
    async fn stop(&mut self);
}

/// Client-side errors
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ClientError {
    /// A running instance already holds the workflow ID
    #[error("workflow already started: {workflow_id}")]
    AlreadyStarted {
        /// Workflow ID
        workflow_id: String,
    },

    /// No instance (or run) matches the workflow ID
    #[error("workflow not found: {workflow_id}")]
    NotFound {
        /// Workflow ID
        workflow_id: String,
    },

    /// Instance is no longer running
    #[error("workflow {workflow_id} is closed: {reason}")]
    Terminated {
        /// Workflow ID
        workflow_id: String,
        /// Why the instance closed
        reason: String,
    },

    /// No worker polls the task queue for this workflow type
    #[error("no worker on task queue {task_queue} hosts workflow {workflow}")]
    NoPoller {
        /// Task queue
        task_queue: String,
        /// Workflow type
        workflow: String,
    },

    /// The instance failed during handler registration
    #[error("workflow {workflow_id} failed to start: {reason}")]
    StartFailed {
        /// Workflow ID
        workflow_id: String,
        /// Registration failure
        reason: String,
    },

    /// Query handler missing or failed
    #[error("query {query} failed: {reason}")]
    QueryFailed {
        /// Query name
        query: String,
        /// Failure reason
        reason: String,
    },

    /// Update was not accepted by the instance
    #[error("update {update} rejected: {reason}")]
    UpdateRejected {
        /// Update name
        update: String,
        /// Rejection reason
        reason: String,
    },

    /// Update was accepted but its handler failed
    #[error("update {update} failed: {reason}")]
    UpdateFailed {
        /// Update name
        update: String,
        /// Failure reason
        reason: String,
    },

    /// A worker registration or lifecycle call was invalid
    #[error("worker error: {0}")]
    Worker(String),

    /// Connection or transport failure
    #[error("transport error: {0}")]
    Transport(String),
}

impl ClientError {
    /// Check if this error could succeed on retry
    pub fn is_retryable(&self) -> bool {
        matches!(self, ClientError::Transport(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_client_error_retryable() {
        assert!(ClientError::Transport("connection reset".into()).is_retryable());
        assert!(!ClientError::AlreadyStarted {
            workflow_id: "w".into()
        }
        .is_retryable());
        assert!(!ClientError::QueryFailed {
            query: "my-query".into(),
            reason: "boom".into()
        }
        .is_retryable());
    }

    #[test]
    fn test_start_options_defaults() {
        let opts = StartOptions::new("wid", "tle", "CounterWorkflow");
        assert_eq!(opts.conflict_policy, ConflictPolicy::Fail);
        assert_eq!(opts.input, Payload::Null);

        let opts = opts.with_conflict_policy(ConflictPolicy::TerminateExisting);
        assert_eq!(opts.conflict_policy, ConflictPolicy::TerminateExisting);
    }

    #[test]
    fn test_update_options_builder() {
        let opts = UpdateOptions::new("wid", "my-update", "3")
            .with_args(json!(2))
            .with_run_id("run-1")
            .with_wait_for_stage(WaitForStage::Accepted);
        assert_eq!(opts.run_id, "run-1");
        assert_eq!(opts.args, json!(2));
        assert_eq!(opts.wait_for_stage, WaitForStage::Accepted);
    }

    #[tokio::test]
    async fn test_update_handle_ready() {
        let handle = UpdateHandle::completed("7", Ok(json!(10)));
        assert_eq!(handle.update_id(), "7");
        assert_eq!(handle.get().await.unwrap(), json!(10));
    }

    #[tokio::test]
    async fn test_update_handle_pending_dropped_sender() {
        let (tx, rx) = oneshot::channel();
        let handle = UpdateHandle::pending("1", rx);
        drop(tx);
        let err = handle.get().await.unwrap_err();
        assert!(matches!(err, ClientError::Terminated { .. }));
    }
}
