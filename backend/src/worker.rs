//! `WorkflowWorker` over the in-process service

use crate::service::LocalBackend;
use async_trait::async_trait;
use std::collections::HashMap;
use tle_core::{ClientError, WorkflowDefinition, WorkflowWorker};

/// Hosts workflow definitions on one task queue
///
/// Starts are routed to a task queue only while its worker is started.
pub struct LocalWorker {
    service: LocalBackend,
    task_queue: String,
    definitions: HashMap<String, WorkflowDefinition>,
    running: bool,
}

impl LocalWorker {
    pub(crate) fn new(service: LocalBackend, task_queue: impl Into<String>) -> Self {
        Self {
            service,
            task_queue: task_queue.into(),
            definitions: HashMap::new(),
            running: false,
        }
    }

    /// Whether the worker is polling
    pub fn is_running(&self) -> bool {
        self.running
    }
}

#[async_trait]
impl WorkflowWorker for LocalWorker {
    fn task_queue(&self) -> &str {
        &self.task_queue
    }

    fn register(&mut self, definition: WorkflowDefinition) -> Result<(), ClientError> {
        if self.running {
            return Err(ClientError::Worker(format!(
                "cannot register {} after the worker has started",
                definition.name()
            )));
        }
        if self.definitions.contains_key(definition.name()) {
            return Err(ClientError::Worker(format!(
                "workflow {} is already registered",
                definition.name()
            )));
        }
        self.definitions
            .insert(definition.name().to_string(), definition);
        Ok(())
    }

    async fn start(&mut self) -> Result<(), ClientError> {
        if self.running {
            return Ok(());
        }
        if self.definitions.is_empty() {
            return Err(ClientError::Worker(format!(
                "no workflows registered on task queue {}",
                self.task_queue
            )));
        }
        self.service
            .attach_worker(&self.task_queue, self.definitions.clone())
            .await;
        self.running = true;
        Ok(())
    }

    async fn stop(&mut self) {
        if self.running {
            self.service.detach_worker(&self.task_queue).await;
            self.running = false;
        }
    }
}
