//! `OrchestrationClient` over the in-process service

use crate::service::LocalBackend;
use async_trait::async_trait;
use tle_core::{
    ClientError, EventType, OrchestrationClient, Payload, Scenario, StartOptions, UpdateHandle,
    UpdateOptions, WorkflowRun,
};
use tokio::sync::Mutex;
use tokio::time::sleep;

/// Client bound to a [`LocalBackend`]
///
/// Every call first waits for one sample of the configured latency scenario,
/// standing in for the network round trip.
pub struct LocalClient {
    service: LocalBackend,
    latency: Option<Mutex<Box<dyn Scenario>>>,
}

impl LocalClient {
    pub(crate) fn new(service: LocalBackend, latency: Option<Box<dyn Scenario>>) -> Self {
        Self {
            service,
            latency: latency.map(Mutex::new),
        }
    }

    async fn rpc_delay(&self) {
        if let Some(latency) = &self.latency {
            let delay = latency.lock().await.next_delay();
            if !delay.is_zero() {
                sleep(delay).await;
            }
        }
    }
}

#[async_trait]
impl OrchestrationClient for LocalClient {
    fn endpoint(&self) -> &str {
        "local"
    }

    async fn start_workflow(&self, options: StartOptions) -> Result<WorkflowRun, ClientError> {
        self.rpc_delay().await;
        self.service.start(options).await
    }

    async fn signal_workflow(
        &self,
        workflow_id: &str,
        run_id: &str,
        signal_name: &str,
        payload: Payload,
    ) -> Result<(), ClientError> {
        self.rpc_delay().await;
        self.service
            .instance(workflow_id, run_id)
            .await?
            .signal(signal_name, payload)
            .await
    }

    async fn query_workflow(
        &self,
        workflow_id: &str,
        run_id: &str,
        query_name: &str,
    ) -> Result<Payload, ClientError> {
        self.rpc_delay().await;
        self.service
            .instance(workflow_id, run_id)
            .await?
            .query(query_name)
            .await
    }

    async fn update_workflow(&self, options: UpdateOptions) -> Result<UpdateHandle, ClientError> {
        self.rpc_delay().await;
        self.service
            .instance(&options.workflow_id, &options.run_id)
            .await?
            .update(
                &options.update_name,
                &options.update_id,
                options.args,
                options.wait_for_stage,
            )
            .await
    }

    fn supports_update_with_start(&self) -> bool {
        true
    }

    async fn update_with_start(
        &self,
        start: StartOptions,
        update: UpdateOptions,
    ) -> Result<(WorkflowRun, UpdateHandle), ClientError> {
        self.rpc_delay().await;
        let run = self.service.start(start).await?;
        let handle = self
            .service
            .instance(&run.workflow_id, &run.run_id)
            .await?
            .update(
                &update.update_name,
                &update.update_id,
                update.args,
                update.wait_for_stage,
            )
            .await?;
        Ok((run, handle))
    }

    async fn get_workflow_history(
        &self,
        workflow_id: &str,
        run_id: &str,
    ) -> Result<Vec<EventType>, ClientError> {
        self.rpc_delay().await;
        self.service.history(workflow_id, run_id).await
    }
}
