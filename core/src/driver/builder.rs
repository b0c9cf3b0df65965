//! Builder pattern for Driver construction

use std::sync::Arc;

use crate::config::ExperimentConfig;
use crate::error::{Error, Result};
use crate::experiment::ExperimentKind;
use crate::traits::{OrchestrationClient, WorkflowWorker};

use super::executor::Driver;

/// Builder for creating a Driver
pub struct DriverBuilder {
    experiment: Option<ExperimentKind>,
    config: ExperimentConfig,
    client: Option<Arc<dyn OrchestrationClient>>,
    worker: Option<Box<dyn WorkflowWorker>>,
}

impl DriverBuilder {
    /// Create a new driver builder with default configuration
    pub fn new() -> Self {
        Self {
            experiment: None,
            config: ExperimentConfig::default(),
            client: None,
            worker: None,
        }
    }

    /// Select the experiment
    pub fn experiment(mut self, experiment: ExperimentKind) -> Self {
        self.experiment = Some(experiment);
        self
    }

    /// Set the full experiment configuration
    pub fn config(mut self, config: ExperimentConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the iteration count
    pub fn iterations(mut self, iterations: usize) -> Self {
        self.config.iterations = iterations;
        self
    }

    /// Set the orchestration client
    pub fn client(mut self, client: Arc<dyn OrchestrationClient>) -> Self {
        self.client = Some(client);
        self
    }

    /// Set the worker that hosts the experiment's workflow
    pub fn worker(mut self, worker: Box<dyn WorkflowWorker>) -> Self {
        self.worker = Some(worker);
        self
    }

    /// Build the driver
    ///
    /// # Errors
    ///
    /// Returns an error if the experiment, client or worker is not set, or if
    /// configuration validation fails.
    pub fn build(self) -> Result<Driver> {
        let experiment = self
            .experiment
            .ok_or(Error::MissingComponent("experiment"))?;
        let client = self.client.ok_or(Error::MissingComponent("client"))?;
        let worker = self.worker.ok_or(Error::MissingComponent("worker"))?;

        self.config.validate()?;

        Ok(Driver::new(experiment, self.config, client, worker))
    }
}

impl Default for DriverBuilder {
    fn default() -> Self {
        Self::new()
    }
}
