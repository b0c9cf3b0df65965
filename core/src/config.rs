//! Experiment configuration types

use crate::scenarios::Pacing;
use crate::traits::ConflictPolicy;
use crate::workflow::TASK_QUEUE;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Default number of iterations between instance restarts
pub const DEFAULT_RESTART_CADENCE: usize = 2000;

/// Default poll count above which a convergence anomaly is recorded
pub const DEFAULT_POLL_ANOMALY_THRESHOLD: u32 = 50;

/// Default hard limit on polls per iteration
pub const DEFAULT_POLL_LIMIT: u32 = 100_000;

/// Default ceiling on the fire-once workflow's wait for its update
pub const DEFAULT_UPDATE_COMPLETION_TIMEOUT: Duration = Duration::from_secs(60);

/// Default number of closed workflow IDs the in-process backend keeps
pub const DEFAULT_CLOSED_RETENTION: usize = 1024;

/// Which conflict policy an instance creation uses at a given iteration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictPolicySchedule {
    /// Terminate-existing on restart-cadence boundaries, fail otherwise
    #[default]
    TerminateOnCadence,
    /// Always fail when the ID is in use
    AlwaysFail,
    /// Always terminate the running instance
    AlwaysTerminate,
}

impl ConflictPolicySchedule {
    /// Conflict policy for iteration `index`
    pub fn policy_for(&self, index: usize, cadence: usize) -> ConflictPolicy {
        match self {
            ConflictPolicySchedule::TerminateOnCadence if index % cadence == 0 => {
                ConflictPolicy::TerminateExisting
            }
            ConflictPolicySchedule::TerminateOnCadence => ConflictPolicy::Fail,
            ConflictPolicySchedule::AlwaysFail => ConflictPolicy::Fail,
            ConflictPolicySchedule::AlwaysTerminate => ConflictPolicy::TerminateExisting,
        }
    }
}

/// How the signal+query race treats a query that missed the concurrent signal
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsistencyMode {
    /// Record the stale read as an anomaly and keep going
    #[default]
    Observational,
    /// Abort the run on the first stale read
    Strict,
}

/// Experiment configuration
///
/// Immutable once a run starts. Defaults reproduce the reference harness:
/// restarts every 2000 iterations with terminate-on-cadence and a 100 ms
/// pause between iterations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExperimentConfig {
    /// Number of iterations to measure
    pub iterations: usize,

    /// Iterations between instance (re)creations
    pub restart_cadence: usize,

    /// Conflict policy schedule for instance creation
    pub conflict_policy: ConflictPolicySchedule,

    /// Delay between iterations
    pub pacing: Pacing,

    /// Race assertion handling
    pub consistency: ConsistencyMode,

    /// Polls above which an iteration is flagged as slow to converge
    pub poll_anomaly_threshold: u32,

    /// Polls above which the run aborts
    pub poll_limit: u32,

    /// Fetch history after each iteration and record workflow-task counts
    pub count_workflow_tasks: bool,

    /// Task queue instances are routed to
    pub task_queue: String,

    /// Ceiling on the fire-once workflow's completion wait
    #[serde(with = "duration_ms")]
    pub update_completion_timeout: Duration,

    /// Draw a progress bar on stderr
    #[serde(default)]
    pub show_progress: bool,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            iterations: 1,
            restart_cadence: DEFAULT_RESTART_CADENCE,
            conflict_policy: ConflictPolicySchedule::default(),
            pacing: Pacing::default(),
            consistency: ConsistencyMode::default(),
            poll_anomaly_threshold: DEFAULT_POLL_ANOMALY_THRESHOLD,
            poll_limit: DEFAULT_POLL_LIMIT,
            count_workflow_tasks: false,
            task_queue: TASK_QUEUE.to_string(),
            update_completion_timeout: DEFAULT_UPDATE_COMPLETION_TIMEOUT,
            show_progress: false,
        }
    }
}

impl ExperimentConfig {
    /// Create a new config with the given iteration count
    pub fn new(iterations: usize) -> Self {
        Self {
            iterations,
            ..Default::default()
        }
    }

    /// Set the restart cadence
    pub fn with_restart_cadence(mut self, cadence: usize) -> Self {
        self.restart_cadence = cadence;
        self
    }

    /// Set the conflict policy schedule
    pub fn with_conflict_policy(mut self, schedule: ConflictPolicySchedule) -> Self {
        self.conflict_policy = schedule;
        self
    }

    /// Set the inter-iteration pacing
    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.pacing = pacing;
        self
    }

    /// Set the consistency mode
    pub fn with_consistency(mut self, mode: ConsistencyMode) -> Self {
        self.consistency = mode;
        self
    }

    /// Set the poll anomaly threshold
    pub fn with_poll_anomaly_threshold(mut self, polls: u32) -> Self {
        self.poll_anomaly_threshold = polls;
        self
    }

    /// Set the hard poll limit
    pub fn with_poll_limit(mut self, polls: u32) -> Self {
        self.poll_limit = polls;
        self
    }

    /// Enable or disable workflow-task counting
    pub fn with_count_workflow_tasks(mut self, enabled: bool) -> Self {
        self.count_workflow_tasks = enabled;
        self
    }

    /// Set the task queue
    pub fn with_task_queue(mut self, task_queue: impl Into<String>) -> Self {
        self.task_queue = task_queue.into();
        self
    }

    /// Set the fire-once completion timeout
    pub fn with_update_completion_timeout(mut self, timeout: Duration) -> Self {
        self.update_completion_timeout = timeout;
        self
    }

    /// Enable or disable the progress bar
    pub fn with_progress(mut self, enabled: bool) -> Self {
        self.show_progress = enabled;
        self
    }

    /// Conflict policy for iteration `index`
    pub fn conflict_policy_for(&self, index: usize) -> ConflictPolicy {
        self.conflict_policy
            .policy_for(index, self.restart_cadence.max(1))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.iterations == 0 {
            return Err(ConfigError::InvalidIterations(
                "iterations must be at least 1".into(),
            ));
        }

        if self.restart_cadence == 0 {
            return Err(ConfigError::InvalidCadence(
                "restart cadence must be at least 1".into(),
            ));
        }

        if self.poll_limit == 0 || self.poll_anomaly_threshold > self.poll_limit {
            return Err(ConfigError::InvalidPollBounds {
                threshold: self.poll_anomaly_threshold,
                limit: self.poll_limit,
            });
        }

        if self.task_queue.is_empty() {
            return Err(ConfigError::InvalidTaskQueue);
        }

        // Building the sampler checks distribution parameters
        self.pacing.scenario()?;

        Ok(())
    }
}

/// Remote endpoint and TLS material
///
/// All four fields must be supplied together or not at all.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// host:port of the frontend
    pub address: Option<String>,
    /// Namespace
    pub namespace: Option<String>,
    /// Client certificate (PEM)
    pub client_cert: Option<PathBuf>,
    /// Client private key (PEM)
    pub client_key: Option<PathBuf>,
}

/// A fully specified remote endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEndpoint {
    /// host:port of the frontend
    pub address: String,
    /// Namespace
    pub namespace: String,
    /// Client certificate (PEM)
    pub client_cert: PathBuf,
    /// Client private key (PEM)
    pub client_key: PathBuf,
}

impl ConnectionConfig {
    /// Resolve to `None` (in-process backend) or a complete remote endpoint
    ///
    /// Certificate and key files must exist.
    pub fn resolve(&self) -> Result<Option<RemoteEndpoint>, ConfigError> {
        match (
            &self.address,
            &self.namespace,
            &self.client_cert,
            &self.client_key,
        ) {
            (None, None, None, None) => Ok(None),
            (Some(address), Some(namespace), Some(cert), Some(key)) => {
                for path in [cert, key] {
                    if !path.is_file() {
                        return Err(ConfigError::MissingFile(path.clone()));
                    }
                }
                Ok(Some(RemoteEndpoint {
                    address: address.clone(),
                    namespace: namespace.clone(),
                    client_cert: cert.clone(),
                    client_key: key.clone(),
                }))
            }
            _ => Err(ConfigError::PartialConnection),
        }
    }
}

/// In-process backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Delay applied to every client call before it reaches the service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rpc_latency: Option<Pacing>,

    /// Mailbox capacity of each workflow instance
    pub mailbox_capacity: usize,

    /// Closed workflow IDs kept readable, oldest evicted first
    #[serde(default = "default_closed_retention")]
    pub closed_retention: usize,
}

fn default_closed_retention() -> usize {
    DEFAULT_CLOSED_RETENTION
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            rpc_latency: None,
            mailbox_capacity: 1024,
            closed_retention: DEFAULT_CLOSED_RETENTION,
        }
    }
}

impl BackendConfig {
    /// Set the simulated RPC latency
    pub fn with_rpc_latency(mut self, latency: Pacing) -> Self {
        self.rpc_latency = Some(latency);
        self
    }

    /// Set the mailbox capacity
    pub fn with_mailbox_capacity(mut self, capacity: usize) -> Self {
        self.mailbox_capacity = capacity;
        self
    }

    /// Set how many closed workflow IDs stay readable
    pub fn with_closed_retention(mut self, retention: usize) -> Self {
        self.closed_retention = retention;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.mailbox_capacity == 0 {
            return Err(ConfigError::InvalidMailbox);
        }
        if let Some(latency) = &self.rpc_latency {
            latency.scenario()?;
        }
        Ok(())
    }
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Invalid iteration count
    #[error("Invalid iterations: {0}")]
    InvalidIterations(String),

    /// Invalid restart cadence
    #[error("Invalid restart cadence: {0}")]
    InvalidCadence(String),

    /// Invalid pacing or latency scenario
    #[error("Invalid pacing: {0}")]
    InvalidPacing(String),

    /// Poll threshold above the hard limit, or a zero limit
    #[error("Invalid poll bounds: threshold {threshold} with limit {limit}")]
    InvalidPollBounds {
        /// Anomaly threshold
        threshold: u32,
        /// Hard limit
        limit: u32,
    },

    /// Empty task queue name
    #[error("Task queue must not be empty")]
    InvalidTaskQueue,

    /// Zero mailbox capacity
    #[error("Mailbox capacity must be at least 1")]
    InvalidMailbox,

    /// Some but not all connection settings were given
    #[error("--address, --namespace, --client-cert and --client-key must be given together or not at all")]
    PartialConnection,

    /// A TLS file does not exist
    #[error("File not found: {}", .0.display())]
    MissingFile(PathBuf),

    /// A remote endpoint was requested but this build has no network transport
    #[error("Remote endpoint {0} is not supported by this build; omit connection flags to use the in-process service")]
    RemoteUnsupported(String),
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}
