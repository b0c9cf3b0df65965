//! Workflow history event types and workflow-task accounting

use crate::traits::{ClientError, OrchestrationClient};
use serde::{Deserialize, Serialize};

/// Event types recorded in a run's durable history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    /// Run was created
    WorkflowExecutionStarted,
    /// One unit of event-loop progress ran workflow code
    WorkflowTaskCompleted,
    /// A signal was delivered
    WorkflowExecutionSignaled,
    /// An update passed validation
    WorkflowExecutionUpdateAccepted,
    /// An update handler returned
    WorkflowExecutionUpdateCompleted,
    /// Run reached its terminal state normally
    WorkflowExecutionCompleted,
    /// A handler failed and took the run down
    WorkflowExecutionFailed,
    /// Run was superseded or explicitly terminated
    WorkflowExecutionTerminated,
}

impl EventType {
    /// Whether this event closes the run
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            EventType::WorkflowExecutionCompleted
                | EventType::WorkflowExecutionFailed
                | EventType::WorkflowExecutionTerminated
        )
    }
}

/// Destination for history events emitted by a running instance
pub trait HistorySink: Send + Sync {
    /// Append one event
    fn record(&self, event: EventType);
}

/// Count completed workflow tasks in a list of history events
pub fn workflow_task_count(events: &[EventType]) -> u32 {
    events
        .iter()
        .filter(|e| **e == EventType::WorkflowTaskCompleted)
        .count() as u32
}

/// Fetch a run's history and count its completed workflow tasks
pub async fn count_workflow_tasks(
    client: &dyn OrchestrationClient,
    workflow_id: &str,
    run_id: &str,
) -> Result<u32, ClientError> {
    let events = client.get_workflow_history(workflow_id, run_id).await?;
    Ok(workflow_task_count(&events))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workflow_task_count() {
        let events = [
            EventType::WorkflowExecutionStarted,
            EventType::WorkflowTaskCompleted,
            EventType::WorkflowExecutionSignaled,
            EventType::WorkflowTaskCompleted,
            EventType::WorkflowExecutionSignaled,
            EventType::WorkflowTaskCompleted,
            EventType::WorkflowExecutionCompleted,
        ];
        assert_eq!(workflow_task_count(&events), 3);
        assert_eq!(workflow_task_count(&[]), 0);
    }

    #[test]
    fn test_terminal_events() {
        assert!(EventType::WorkflowExecutionTerminated.is_terminal());
        assert!(EventType::WorkflowExecutionCompleted.is_terminal());
        assert!(!EventType::WorkflowTaskCompleted.is_terminal());
    }
}
