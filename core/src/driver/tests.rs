//! Tests for the Driver module

use super::builder::DriverBuilder;
use crate::config::ExperimentConfig;
use crate::error::Error;
use crate::experiment::ExperimentKind;
use crate::history::EventType;
use crate::scenarios::Pacing;
use crate::traits::{
    ClientError, OrchestrationClient, Payload, StartOptions, UpdateHandle, UpdateOptions,
    WorkflowRun, WorkflowWorker,
};
use crate::workflow::{QueryResult, WorkflowDefinition};

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ============================================================================
// Mock OrchestrationClient
// ============================================================================

#[derive(Default)]
struct MockClient {
    calls: AtomicUsize,
    fail_signals: bool,
}

#[async_trait]
impl OrchestrationClient for MockClient {
    fn endpoint(&self) -> &str {
        "mock"
    }

    async fn start_workflow(&self, options: StartOptions) -> Result<WorkflowRun, ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(WorkflowRun {
            workflow_id: options.id,
            run_id: "run-1".into(),
        })
    }

    async fn signal_workflow(
        &self,
        workflow_id: &str,
        _run_id: &str,
        _signal_name: &str,
        _payload: Payload,
    ) -> Result<(), ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_signals {
            return Err(ClientError::NotFound {
                workflow_id: workflow_id.to_string(),
            });
        }
        Ok(())
    }

    async fn query_workflow(
        &self,
        _workflow_id: &str,
        _run_id: &str,
        _query_name: &str,
    ) -> Result<Payload, ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(serde_json::to_value(QueryResult {
            counter: 0,
            query_time: 0,
        })
        .unwrap())
    }

    async fn update_workflow(&self, options: UpdateOptions) -> Result<UpdateHandle, ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(UpdateHandle::completed(options.update_id, Ok(Payload::from(1))))
    }

    async fn get_workflow_history(
        &self,
        _workflow_id: &str,
        _run_id: &str,
    ) -> Result<Vec<EventType>, ClientError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(Vec::new())
    }
}

// ============================================================================
// Mock WorkflowWorker
// ============================================================================

#[derive(Default)]
struct WorkerFlags {
    registered: Mutex<Vec<String>>,
    started: AtomicBool,
    stopped: AtomicBool,
}

struct MockWorker {
    flags: Arc<WorkerFlags>,
    fail_start: bool,
}

impl MockWorker {
    fn new(flags: &Arc<WorkerFlags>) -> Box<Self> {
        Box::new(Self {
            flags: Arc::clone(flags),
            fail_start: false,
        })
    }
}

#[async_trait]
impl WorkflowWorker for MockWorker {
    fn task_queue(&self) -> &str {
        "tle"
    }

    fn register(&mut self, definition: WorkflowDefinition) -> Result<(), ClientError> {
        self.flags
            .registered
            .lock()
            .unwrap()
            .push(definition.name().to_string());
        Ok(())
    }

    async fn start(&mut self) -> Result<(), ClientError> {
        if self.fail_start {
            return Err(ClientError::Worker("no task queue".into()));
        }
        self.flags.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&mut self) {
        self.flags.stopped.store(true, Ordering::SeqCst);
    }
}

fn fast_config(iterations: usize) -> ExperimentConfig {
    ExperimentConfig::new(iterations).with_pacing(Pacing::NONE)
}

// ============================================================================
// Builder
// ============================================================================

#[test]
fn test_builder_requires_components() {
    let flags = Arc::new(WorkerFlags::default());

    let err = DriverBuilder::new()
        .client(Arc::new(MockClient::default()))
        .worker(MockWorker::new(&flags))
        .build()
        .err()
        .unwrap();
    assert!(matches!(err, Error::MissingComponent("experiment")));

    let err = DriverBuilder::new()
        .experiment(ExperimentKind::Query)
        .worker(MockWorker::new(&flags))
        .build()
        .err()
        .unwrap();
    assert!(matches!(err, Error::MissingComponent("client")));

    let err = DriverBuilder::new()
        .experiment(ExperimentKind::Query)
        .client(Arc::new(MockClient::default()))
        .build()
        .err()
        .unwrap();
    assert!(matches!(err, Error::MissingComponent("worker")));
}

#[test]
fn test_builder_validates_config() {
    let flags = Arc::new(WorkerFlags::default());
    let err = DriverBuilder::new()
        .experiment(ExperimentKind::Query)
        .config(fast_config(5))
        .iterations(0)
        .client(Arc::new(MockClient::default()))
        .worker(MockWorker::new(&flags))
        .build()
        .err()
        .unwrap();
    assert!(matches!(err, Error::Config(_)));
}

// ============================================================================
// Run lifecycle
// ============================================================================

#[tokio::test]
async fn test_run_registers_paired_workflow() {
    let flags = Arc::new(WorkerFlags::default());
    let driver = DriverBuilder::new()
        .experiment(ExperimentKind::Update)
        .config(fast_config(4))
        .client(Arc::new(MockClient::default()))
        .worker(MockWorker::new(&flags))
        .build()
        .unwrap();
    assert_eq!(driver.experiment(), ExperimentKind::Update);

    let outcome = driver.run().await.unwrap();

    assert_eq!(
        *flags.registered.lock().unwrap(),
        vec!["AccumulatorWorkflow".to_string()]
    );
    assert!(flags.started.load(Ordering::SeqCst));
    assert!(flags.stopped.load(Ordering::SeqCst));
    assert_eq!(outcome.report.latencies_ns.len(), 4);
    assert_eq!(outcome.summary.count, 4);
    assert!(outcome.summary.min_ns <= outcome.summary.p90_ns);
    assert!(outcome.summary.p90_ns <= outcome.summary.max_ns);
}

#[tokio::test]
async fn test_worker_stopped_when_run_fails() {
    let flags = Arc::new(WorkerFlags::default());
    let client = Arc::new(MockClient {
        fail_signals: true,
        ..Default::default()
    });
    let driver = DriverBuilder::new()
        .experiment(ExperimentKind::Signal)
        .config(fast_config(3))
        .client(client)
        .worker(MockWorker::new(&flags))
        .build()
        .unwrap();

    let err = driver.run().await.unwrap_err();

    assert!(matches!(err, Error::Client { operation: "signal", .. }));
    assert!(flags.stopped.load(Ordering::SeqCst));
}

#[tokio::test]
async fn test_worker_start_failure_makes_no_remote_calls() {
    let flags = Arc::new(WorkerFlags::default());
    let client = Arc::new(MockClient::default());
    let worker = Box::new(MockWorker {
        flags: Arc::clone(&flags),
        fail_start: true,
    });
    let driver = DriverBuilder::new()
        .experiment(ExperimentKind::Query)
        .config(fast_config(3))
        .client(client.clone())
        .worker(worker)
        .build()
        .unwrap();

    let err = driver.run().await.unwrap_err();

    assert!(matches!(err, Error::Client { operation: "worker start", .. }));
    assert_eq!(client.calls.load(Ordering::SeqCst), 0);
}
