//! Single-task dispatcher that owns a workflow instance

use super::{HandlerKind, HandlerSet, Workflow, WorkflowError};
use crate::history::{EventType, HistorySink};
use crate::traits::{ClientError, Payload, UpdateHandle, WaitForStage};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::Instant;
use tracing::{debug, warn};

/// Message delivered to an instance's mailbox
#[derive(Debug)]
pub enum Event {
    /// Fire-and-forget signal
    Signal {
        /// Signal name
        name: String,
        /// Signal payload
        payload: Payload,
    },
    /// Read of committed state
    Query {
        /// Query name
        name: String,
        /// Reply channel
        reply: oneshot::Sender<Result<Payload, ClientError>>,
    },
    /// Mutating call with a result
    Update {
        /// Update name
        name: String,
        /// Caller-chosen ID
        update_id: String,
        /// Update argument
        args: Payload,
        /// Resolved once the update is accepted or rejected
        accepted: oneshot::Sender<Result<(), ClientError>>,
        /// Resolved with the handler's result
        completed: oneshot::Sender<Result<Payload, ClientError>>,
    },
}

/// How an instance closed
#[derive(Debug, Clone, PartialEq)]
pub enum Termination {
    /// Workflow returned a result
    Completed(Payload),
    /// A handler failed
    Failed(String),
    /// Terminated from outside
    Terminated(String),
    /// Every handle was dropped
    Abandoned,
}

/// Cloneable handle to a running instance
#[derive(Debug, Clone)]
pub struct InstanceHandle {
    workflow_id: String,
    mailbox: mpsc::Sender<Event>,
    terminate: Arc<watch::Sender<Option<String>>>,
    status: watch::Receiver<Option<Termination>>,
}

impl InstanceHandle {
    /// Workflow ID of the instance
    pub fn workflow_id(&self) -> &str {
        &self.workflow_id
    }

    /// Enqueue a signal; returns once it is in the mailbox
    pub async fn signal(&self, name: &str, payload: Payload) -> Result<(), ClientError> {
        self.send(Event::Signal {
            name: name.to_string(),
            payload,
        })
        .await
    }

    /// Evaluate a query between two event-loop steps
    pub async fn query(&self, name: &str) -> Result<Payload, ClientError> {
        let (reply, rx) = oneshot::channel();
        self.send(Event::Query {
            name: name.to_string(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| self.closed_error())?
    }

    /// Submit an update and wait for `stage`
    pub async fn update(
        &self,
        name: &str,
        update_id: &str,
        args: Payload,
        stage: WaitForStage,
    ) -> Result<UpdateHandle, ClientError> {
        let (accepted, accepted_rx) = oneshot::channel();
        let (completed, completed_rx) = oneshot::channel();
        self.send(Event::Update {
            name: name.to_string(),
            update_id: update_id.to_string(),
            args,
            accepted,
            completed,
        })
        .await?;

        accepted_rx.await.map_err(|_| self.closed_error())??;

        match stage {
            WaitForStage::Accepted => Ok(UpdateHandle::pending(update_id, completed_rx)),
            WaitForStage::Completed => {
                let result = completed_rx.await.map_err(|_| self.closed_error())?;
                Ok(UpdateHandle::completed(update_id, result))
            }
        }
    }

    /// Ask the instance to stop; a no-op once it has closed
    pub fn terminate(&self, reason: impl Into<String>) {
        let reason = reason.into();
        self.terminate.send_if_modified(|current| {
            if current.is_some() {
                return false;
            }
            *current = Some(reason);
            true
        });
    }

    /// Whether the instance is still running
    pub fn is_running(&self) -> bool {
        self.status.borrow().is_none()
    }

    /// How the instance closed, if it has
    pub fn termination(&self) -> Option<Termination> {
        self.status.borrow().clone()
    }

    /// Wait until the instance closes
    pub async fn wait(&self) -> Termination {
        let mut status = self.status.clone();
        loop {
            if let Some(termination) = status.borrow_and_update().clone() {
                return termination;
            }
            if status.changed().await.is_err() {
                return status.borrow().clone().unwrap_or(Termination::Abandoned);
            }
        }
    }

    async fn send(&self, event: Event) -> Result<(), ClientError> {
        if !self.is_running() {
            return Err(self.closed_error());
        }
        self.mailbox
            .send(event)
            .await
            .map_err(|_| self.closed_error())
    }

    fn closed_error(&self) -> ClientError {
        let reason = match self.termination() {
            Some(Termination::Completed(_)) => "completed".to_string(),
            Some(Termination::Failed(reason)) => format!("failed: {reason}"),
            Some(Termination::Terminated(reason)) => format!("terminated: {reason}"),
            Some(Termination::Abandoned) | None => "closed".to_string(),
        };
        ClientError::Terminated {
            workflow_id: self.workflow_id.clone(),
            reason,
        }
    }
}

/// Register a workflow's handlers and start its event loop
///
/// Registration runs before this returns, so a failure surfaces to the caller
/// that attempted the start. Records `WorkflowExecutionStarted` and the first
/// `WorkflowTaskCompleted` on success.
pub fn spawn_instance(
    workflow_id: impl Into<String>,
    workflow: Box<dyn Workflow>,
    sink: Arc<dyn HistorySink>,
    mailbox_capacity: usize,
) -> Result<InstanceHandle, WorkflowError> {
    let workflow_id = workflow_id.into();
    let mut handlers = HandlerSet::default();
    workflow.register(&mut handlers)?;

    sink.record(EventType::WorkflowExecutionStarted);
    sink.record(EventType::WorkflowTaskCompleted);

    let (mailbox_tx, mailbox_rx) = mpsc::channel(mailbox_capacity.max(1));
    let (terminate_tx, terminate_rx) = watch::channel(None);
    let (status_tx, status_rx) = watch::channel(None);

    let instance = Instance {
        workflow_id: workflow_id.clone(),
        workflow,
        handlers,
        sink,
    };
    tokio::spawn(instance.run(mailbox_rx, terminate_rx, status_tx));

    Ok(InstanceHandle {
        workflow_id,
        mailbox: mailbox_tx,
        terminate: Arc::new(terminate_tx),
        status: status_rx,
    })
}

struct Instance {
    workflow_id: String,
    workflow: Box<dyn Workflow>,
    handlers: HandlerSet,
    sink: Arc<dyn HistorySink>,
}

impl Instance {
    async fn run(
        mut self,
        mut mailbox: mpsc::Receiver<Event>,
        mut terminate: watch::Receiver<Option<String>>,
        status: watch::Sender<Option<Termination>>,
    ) {
        let deadline = self
            .workflow
            .completion_timeout()
            .map(|timeout| Instant::now() + timeout);

        let termination = loop {
            if let Some(result) = self.workflow.completion() {
                break Termination::Completed(result);
            }

            // Termination wins over queued events
            tokio::select! {
                biased;

                changed = terminate.changed() => {
                    let reason = terminate.borrow().clone();
                    match (changed, reason) {
                        (_, Some(reason)) => break Termination::Terminated(reason),
                        (Err(_), None) => break Termination::Abandoned,
                        (Ok(()), None) => {}
                    }
                }

                event = mailbox.recv() => match event {
                    Some(event) => {
                        if let Err(e) = self.dispatch(event) {
                            warn!(workflow_id = %self.workflow_id, error = %e, "workflow task failed");
                            break Termination::Failed(e.to_string());
                        }
                    }
                    None => break Termination::Abandoned,
                },

                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                    debug!(workflow_id = %self.workflow_id, "completion wait timed out");
                    self.sink.record(EventType::WorkflowTaskCompleted);
                    break Termination::Completed(self.workflow.on_timeout());
                }
            }
        };

        self.sink.record(match termination {
            Termination::Completed(_) => EventType::WorkflowExecutionCompleted,
            Termination::Failed(_) => EventType::WorkflowExecutionFailed,
            Termination::Terminated(_) | Termination::Abandoned => {
                EventType::WorkflowExecutionTerminated
            }
        });
        debug!(workflow_id = %self.workflow_id, ?termination, "instance closed");

        // Unprocessed events are dropped with the mailbox; their reply
        // channels close and callers see a Terminated error.
        mailbox.close();
        let _ = status.send(Some(termination));
    }

    fn dispatch(&mut self, event: Event) -> Result<(), WorkflowError> {
        match event {
            Event::Signal { name, payload } => {
                self.sink.record(EventType::WorkflowExecutionSignaled);
                if !self.handlers.has(HandlerKind::Signal, &name) {
                    warn!(workflow_id = %self.workflow_id, signal = %name, "dropping signal with no handler");
                    return Ok(());
                }
                self.workflow.handle_signal(&name, payload)?;
                self.sink.record(EventType::WorkflowTaskCompleted);
            }

            Event::Query { name, reply } => {
                let result = if self.handlers.has(HandlerKind::Query, &name) {
                    self.workflow.handle_query(&name)
                } else {
                    Err(WorkflowError::UnknownHandler {
                        kind: HandlerKind::Query,
                        name: name.clone(),
                    })
                };
                let _ = reply.send(result.map_err(|e| ClientError::QueryFailed {
                    query: name,
                    reason: e.to_string(),
                }));
            }

            Event::Update {
                name,
                update_id,
                args,
                accepted,
                completed,
            } => {
                if !self.handlers.has(HandlerKind::Update, &name) {
                    let _ = accepted.send(Err(ClientError::UpdateRejected {
                        update: name.clone(),
                        reason: format!("no update handler named {name}"),
                    }));
                    return Ok(());
                }
                self.sink.record(EventType::WorkflowExecutionUpdateAccepted);
                let _ = accepted.send(Ok(()));

                let result = self.workflow.handle_update(&name, args);
                self.sink.record(EventType::WorkflowExecutionUpdateCompleted);
                self.sink.record(EventType::WorkflowTaskCompleted);
                debug!(workflow_id = %self.workflow_id, %update_id, ok = result.is_ok(), "update handled");

                let _ = completed.send(result.map_err(|e| ClientError::UpdateFailed {
                    update: name,
                    reason: e.to_string(),
                }));
            }
        }
        Ok(())
    }
}
