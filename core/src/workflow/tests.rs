//! Tests for the workflow module

use super::*;
use crate::history::{workflow_task_count, EventType, HistorySink};
use crate::traits::{ClientError, WaitForStage};
use serde_json::json;
use std::sync::Mutex;
use std::time::Duration;

// ============================================================================
// Helpers
// ============================================================================

#[derive(Default)]
struct RecordingSink {
    events: Mutex<Vec<EventType>>,
}

impl RecordingSink {
    fn events(&self) -> Vec<EventType> {
        self.events.lock().unwrap().clone()
    }
}

impl HistorySink for RecordingSink {
    fn record(&self, event: EventType) {
        self.events.lock().unwrap().push(event);
    }
}

fn spawn(workflow: Box<dyn Workflow>) -> (InstanceHandle, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::default());
    let handle = spawn_instance("wf-test", workflow, sink.clone(), 16).unwrap();
    (handle, sink)
}

async fn query_counter(handle: &InstanceHandle) -> QueryResult {
    let value = handle.query(QUERY_NAME).await.unwrap();
    serde_json::from_value(value).unwrap()
}

/// Declares the same signal twice
struct BrokenWorkflow;

impl Workflow for BrokenWorkflow {
    fn register(&self, handlers: &mut HandlerSet) -> Result<(), WorkflowError> {
        handlers.signal(SIGNAL_NAME)?;
        handlers.signal(SIGNAL_NAME)
    }

    fn handle_signal(&mut self, _name: &str, _payload: Payload) -> Result<(), WorkflowError> {
        Ok(())
    }

    fn handle_query(&self, _name: &str) -> Result<Payload, WorkflowError> {
        Ok(Payload::Null)
    }

    fn completion(&self) -> Option<Payload> {
        None
    }
}

// ============================================================================
// HandlerSet
// ============================================================================

#[test]
fn test_handler_set_rejects_duplicates() {
    let mut handlers = HandlerSet::default();
    handlers.signal("a").unwrap();
    handlers.query("a").unwrap();
    assert!(matches!(
        handlers.signal("a"),
        Err(WorkflowError::DuplicateHandler {
            kind: HandlerKind::Signal,
            ..
        })
    ));
    assert!(handlers.has(HandlerKind::Query, "a"));
    assert!(!handlers.has(HandlerKind::Update, "a"));
}

#[test]
fn test_definition_names() {
    assert_eq!(CounterWorkflow::definition().name(), "CounterWorkflow");
    assert_eq!(AccumulatorWorkflow::definition().name(), "AccumulatorWorkflow");
    assert_eq!(
        OnceUpdateWorkflow::definition(Duration::from_secs(1)).name(),
        "OnceUpdateWorkflow"
    );
}

// ============================================================================
// Counter workflow
// ============================================================================

#[tokio::test]
async fn test_sequential_signals_then_query() {
    let (handle, _sink) = spawn(Box::new(CounterWorkflow::new()));

    for v in [1, 1, 1] {
        handle.signal(SIGNAL_NAME, json!(v)).await.unwrap();
    }

    assert_eq!(query_counter(&handle).await.counter, 3);
}

#[tokio::test]
async fn test_query_is_monotonic() {
    let (handle, _sink) = spawn(Box::new(CounterWorkflow::new()));

    let mut last = 0;
    for j in 1..=20 {
        handle.signal(SIGNAL_NAME, json!(j)).await.unwrap();
        let observed = query_counter(&handle).await.counter;
        assert!(observed >= last, "counter went backwards");
        assert!(observed >= j, "query after signal {j} saw {observed}");
        last = observed;
    }
}

#[tokio::test]
async fn test_query_time_before_any_signal_measures_from_start() {
    let (handle, _sink) = spawn(Box::new(CounterWorkflow::new()));
    tokio::time::sleep(Duration::from_millis(5)).await;

    let result = query_counter(&handle).await;
    assert_eq!(result.counter, 0);
    assert!(result.query_time >= 5_000_000);
}

#[tokio::test]
async fn test_done_completes_with_counter() {
    let (handle, sink) = spawn(Box::new(CounterWorkflow::new()));

    handle.signal(SIGNAL_NAME, json!(0)).await.unwrap();
    handle.signal(SIGNAL_NAME, json!(1)).await.unwrap();
    handle.signal(DONE_SIGNAL_NAME, Payload::Null).await.unwrap();

    assert_eq!(handle.wait().await, Termination::Completed(json!(2)));
    assert!(!handle.is_running());

    let events = sink.events();
    assert_eq!(events.first(), Some(&EventType::WorkflowExecutionStarted));
    assert_eq!(events.last(), Some(&EventType::WorkflowExecutionCompleted));
    // start + two counter signals + Done
    assert_eq!(workflow_task_count(&events), 4);

    let err = handle.signal(SIGNAL_NAME, json!(2)).await.unwrap_err();
    assert!(matches!(err, ClientError::Terminated { .. }));
}

#[tokio::test]
async fn test_bad_signal_payload_fails_instance() {
    let (handle, sink) = spawn(Box::new(CounterWorkflow::new()));

    handle
        .signal(SIGNAL_NAME, json!("not a number"))
        .await
        .unwrap();

    assert!(matches!(handle.wait().await, Termination::Failed(_)));
    assert_eq!(
        sink.events().last(),
        Some(&EventType::WorkflowExecutionFailed)
    );
}

#[tokio::test]
async fn test_unknown_signal_is_dropped() {
    let (handle, _sink) = spawn(Box::new(CounterWorkflow::new()));

    handle.signal("no-such-signal", json!(1)).await.unwrap();
    handle.signal(SIGNAL_NAME, json!(1)).await.unwrap();

    assert_eq!(query_counter(&handle).await.counter, 1);
    assert!(handle.is_running());
}

#[tokio::test]
async fn test_unknown_query_fails_without_closing() {
    let (handle, _sink) = spawn(Box::new(CounterWorkflow::new()));

    let err = handle.query("no-such-query").await.unwrap_err();
    assert!(matches!(err, ClientError::QueryFailed { .. }));
    assert!(handle.is_running());
}

#[tokio::test]
async fn test_terminate() {
    let (handle, sink) = spawn(Box::new(CounterWorkflow::new()));

    handle.terminate("superseded");
    handle.terminate("ignored");

    assert_eq!(
        handle.wait().await,
        Termination::Terminated("superseded".into())
    );
    assert_eq!(
        sink.events().last(),
        Some(&EventType::WorkflowExecutionTerminated)
    );

    let err = handle.query(QUERY_NAME).await.unwrap_err();
    match err {
        ClientError::Terminated { workflow_id, reason } => {
            assert_eq!(workflow_id, "wf-test");
            assert!(reason.contains("superseded"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_registration_failure_prevents_start() {
    let sink = Arc::new(RecordingSink::default());
    let result = spawn_instance("wf-broken", Box::new(BrokenWorkflow), sink.clone(), 16);

    assert!(matches!(
        result,
        Err(WorkflowError::DuplicateHandler { .. })
    ));
    assert!(sink.events().is_empty());
}

// ============================================================================
// Update workflows
// ============================================================================

#[tokio::test]
async fn test_accumulator_updates_are_cumulative() {
    let (handle, sink) = spawn(Box::new(AccumulatorWorkflow::default()));

    let mut last = Payload::Null;
    for (i, v) in [2, 3, 5].into_iter().enumerate() {
        let update = handle
            .update(UPDATE_NAME, &i.to_string(), json!(v), WaitForStage::Completed)
            .await
            .unwrap();
        last = update.get().await.unwrap();
    }
    assert_eq!(last, json!(10));

    let events = sink.events();
    let accepted = events
        .iter()
        .filter(|e| **e == EventType::WorkflowExecutionUpdateAccepted)
        .count();
    assert_eq!(accepted, 3);

    handle.signal(DONE_SIGNAL_NAME, Payload::Null).await.unwrap();
    assert_eq!(handle.wait().await, Termination::Completed(json!(10)));
}

#[tokio::test]
async fn test_accumulator_wait_for_accepted() {
    let (handle, _sink) = spawn(Box::new(AccumulatorWorkflow::default()));

    let update = handle
        .update(UPDATE_NAME, "0", json!(4), WaitForStage::Accepted)
        .await
        .unwrap();
    assert_eq!(update.update_id(), "0");
    assert_eq!(update.get().await.unwrap(), json!(4));
}

#[tokio::test]
async fn test_accumulator_bad_argument_fails_update_only() {
    let (handle, _sink) = spawn(Box::new(AccumulatorWorkflow::default()));

    let update = handle
        .update(UPDATE_NAME, "0", json!("x"), WaitForStage::Completed)
        .await
        .unwrap();
    assert!(matches!(
        update.get().await,
        Err(ClientError::UpdateFailed { .. })
    ));
    assert!(handle.is_running());
}

#[tokio::test]
async fn test_unknown_update_rejected() {
    let (handle, _sink) = spawn(Box::new(CounterWorkflow::new()));

    let err = handle
        .update(UPDATE_NAME, "0", json!(1), WaitForStage::Completed)
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::UpdateRejected { .. }));
}

#[tokio::test]
async fn test_once_update_completes_instance() {
    let (handle, sink) = spawn(Box::new(OnceUpdateWorkflow::new(Duration::from_secs(60))));

    let update = handle
        .update(UPDATE_NAME, "0", Payload::Null, WaitForStage::Completed)
        .await
        .unwrap();
    assert_eq!(update.get().await.unwrap(), Payload::Null);

    assert_eq!(handle.wait().await, Termination::Completed(Payload::Null));
    assert_eq!(
        sink.events().last(),
        Some(&EventType::WorkflowExecutionCompleted)
    );
}

#[tokio::test]
async fn test_once_update_times_out() {
    let (handle, sink) = spawn(Box::new(OnceUpdateWorkflow::new(Duration::from_millis(20))));

    let termination = tokio::time::timeout(Duration::from_secs(5), handle.wait())
        .await
        .unwrap();
    assert_eq!(termination, Termination::Completed(Payload::Null));
    assert_eq!(
        sink.events().last(),
        Some(&EventType::WorkflowExecutionCompleted)
    );
}
