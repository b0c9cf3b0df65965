//! Instance registry, run IDs and conflict policies

use crate::client::LocalClient;
use crate::history::RunHistory;
use crate::worker::LocalWorker;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tle_core::workflow::{spawn_instance, InstanceHandle};
use tle_core::{
    BackendConfig, ClientError, ConfigError, ConflictPolicy, EventType, StartOptions,
    WorkflowDefinition, WorkflowRun,
};
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

/// In-process orchestration service
///
/// Cheap to clone; clones share one registry. Clients and workers are
/// created from it with [`LocalBackend::client`] and [`LocalBackend::worker`].
#[derive(Clone)]
pub struct LocalBackend {
    state: Arc<ServiceState>,
    config: BackendConfig,
}

#[derive(Default)]
struct ServiceState {
    workflows: Mutex<Registry>,
    /// Definitions hosted per task queue by started workers
    pollers: Mutex<HashMap<String, HashMap<String, WorkflowDefinition>>>,
}

struct RunRecord {
    run_id: String,
    handle: InstanceHandle,
    history: Arc<RunHistory>,
}

/// Runs per workflow ID
///
/// Each ID keeps its latest run and the one that run replaced. Once more than
/// the configured number of IDs are closed, the earliest-created are dropped.
#[derive(Default)]
struct Registry {
    /// Oldest first; at most two entries
    runs: HashMap<String, Vec<RunRecord>>,
    /// Workflow IDs in creation order
    order: VecDeque<String>,
}

impl Registry {
    fn latest_running(&self, workflow_id: &str) -> Option<&RunRecord> {
        self.runs
            .get(workflow_id)
            .and_then(|runs| runs.last())
            .filter(|run| run.handle.is_running())
    }

    fn insert(&mut self, workflow_id: &str, run: RunRecord) {
        match self.runs.get_mut(workflow_id) {
            Some(runs) => {
                let stale = runs.len().saturating_sub(1);
                runs.drain(..stale);
                runs.push(run);
            }
            None => {
                self.runs.insert(workflow_id.to_string(), vec![run]);
                self.order.push_back(workflow_id.to_string());
            }
        }
    }

    /// Evict the earliest-created closed IDs until at most `retain` remain
    fn prune(&mut self, retain: usize) {
        let closed = self
            .runs
            .keys()
            .filter(|id| self.latest_running(id).is_none())
            .count();
        let mut excess = closed.saturating_sub(retain);
        if excess == 0 {
            return;
        }

        let runs = &mut self.runs;
        self.order.retain(|id| {
            let running = runs
                .get(id)
                .and_then(|runs| runs.last())
                .is_some_and(|run| run.handle.is_running());
            if excess == 0 || running {
                return true;
            }
            runs.remove(id);
            excess -= 1;
            false
        });
        debug!(retained = runs.len(), "pruned closed workflows");
    }
}

impl LocalBackend {
    /// Create a service
    pub fn new(config: BackendConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            state: Arc::new(ServiceState::default()),
            config,
        })
    }

    /// Create a client; each client samples its own simulated latency
    pub fn client(&self) -> Result<LocalClient, ConfigError> {
        let latency = self
            .config
            .rpc_latency
            .as_ref()
            .map(|pacing| pacing.scenario())
            .transpose()?;
        Ok(LocalClient::new(self.clone(), latency))
    }

    /// Create a worker for `task_queue`
    pub fn worker(&self, task_queue: impl Into<String>) -> LocalWorker {
        LocalWorker::new(self.clone(), task_queue)
    }

    /// Number of instances currently running
    pub async fn running_instances(&self) -> usize {
        self.state
            .workflows
            .lock()
            .await
            .runs
            .values()
            .filter_map(|runs| runs.last())
            .filter(|run| run.handle.is_running())
            .count()
    }

    /// Number of workflow IDs whose runs are still readable
    pub async fn retained_workflows(&self) -> usize {
        self.state.workflows.lock().await.runs.len()
    }

    pub(crate) async fn attach_worker(
        &self,
        task_queue: &str,
        definitions: HashMap<String, WorkflowDefinition>,
    ) {
        debug!(task_queue, workflows = definitions.len(), "worker polling");
        self.state
            .pollers
            .lock()
            .await
            .insert(task_queue.to_string(), definitions);
    }

    pub(crate) async fn detach_worker(&self, task_queue: &str) {
        debug!(task_queue, "worker stopped");
        self.state.pollers.lock().await.remove(task_queue);
    }

    pub(crate) async fn start(&self, options: StartOptions) -> Result<WorkflowRun, ClientError> {
        let definition = self
            .state
            .pollers
            .lock()
            .await
            .get(&options.task_queue)
            .and_then(|definitions| definitions.get(&options.workflow))
            .cloned()
            .ok_or_else(|| ClientError::NoPoller {
                task_queue: options.task_queue.clone(),
                workflow: options.workflow.clone(),
            })?;

        loop {
            let superseded = {
                let mut workflows = self.state.workflows.lock().await;

                match workflows.latest_running(&options.id) {
                    Some(_) if options.conflict_policy == ConflictPolicy::Fail => {
                        return Err(ClientError::AlreadyStarted {
                            workflow_id: options.id.clone(),
                        });
                    }
                    Some(run) => run.handle.clone(),
                    None => {
                        let run = self.spawn_run(&options, &definition)?;
                        let workflow_run = WorkflowRun {
                            workflow_id: options.id.clone(),
                            run_id: run.run_id.clone(),
                        };
                        workflows.insert(&options.id, run);
                        workflows.prune(self.config.closed_retention);
                        return Ok(workflow_run);
                    }
                }
            };

            // Closing the old run records WorkflowExecutionTerminated before
            // the new run is created
            debug!(workflow_id = %options.id, "terminating running instance");
            superseded.terminate("superseded by a new run");
            superseded.wait().await;
        }
    }

    fn spawn_run(
        &self,
        options: &StartOptions,
        definition: &WorkflowDefinition,
    ) -> Result<RunRecord, ClientError> {
        let start_failed = |e: tle_core::WorkflowError| ClientError::StartFailed {
            workflow_id: options.id.clone(),
            reason: e.to_string(),
        };

        let run_id = Uuid::new_v4().to_string();
        let history = Arc::new(RunHistory::default());
        let workflow = definition.instantiate(&options.input).map_err(start_failed)?;
        let handle = spawn_instance(
            options.id.clone(),
            workflow,
            history.clone(),
            self.config.mailbox_capacity,
        )
        .map_err(start_failed)?;

        debug!(workflow_id = %options.id, %run_id, workflow = %options.workflow, "instance started");
        Ok(RunRecord {
            run_id,
            handle,
            history,
        })
    }

    /// Resolve a run; an empty `run_id` means the latest run
    pub(crate) async fn instance(
        &self,
        workflow_id: &str,
        run_id: &str,
    ) -> Result<InstanceHandle, ClientError> {
        self.with_run(workflow_id, run_id, |run| run.handle.clone())
            .await
    }

    pub(crate) async fn history(
        &self,
        workflow_id: &str,
        run_id: &str,
    ) -> Result<Vec<EventType>, ClientError> {
        self.with_run(workflow_id, run_id, |run| run.history.snapshot())
            .await
    }

    async fn with_run<T>(
        &self,
        workflow_id: &str,
        run_id: &str,
        f: impl FnOnce(&RunRecord) -> T,
    ) -> Result<T, ClientError> {
        let workflows = self.state.workflows.lock().await;
        let run = workflows.runs.get(workflow_id).and_then(|runs| {
            if run_id.is_empty() {
                runs.last()
            } else {
                runs.iter().find(|run| run.run_id == run_id)
            }
        });
        run.map(f).ok_or_else(|| ClientError::NotFound {
            workflow_id: workflow_id.to_string(),
        })
    }
}
