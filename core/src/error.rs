//! Error types for tle-core

use thiserror::Error;

use crate::config::ConfigError;
use crate::metrics::QuantileError;
use crate::traits::ClientError;
use crate::workflow::WorkflowError;

/// Core error type
///
/// Every variant is fatal to the run that produced it. The harness never
/// retries on its own; retry policy belongs to the orchestration client.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error, reported before any remote call is made
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Requested experiment name is not registered
    #[error("unknown experiment: {name} (available: {available})")]
    UnknownExperiment {
        /// Name that was requested
        name: String,
        /// Comma-separated list of registered names
        available: String,
    },

    /// A remote call failed after the client's own retry policy was exhausted
    #[error("remote call failed during {operation}: {source}")]
    Client {
        /// Operation that was being attempted
        operation: &'static str,
        /// Underlying client error
        #[source]
        source: ClientError,
    },

    /// A workflow definition could not be instantiated or registered
    #[error("workflow error: {0}")]
    Workflow(#[from] WorkflowError),

    /// A query observed a counter that differs from the expected value (strict mode only)
    #[error(
        "iteration {iteration}: query observed counter {observed}, expected {expected}"
    )]
    ConsistencyViolation {
        /// Iteration index
        iteration: usize,
        /// Counter value the signal should have produced
        expected: i64,
        /// Counter value the query returned
        observed: i64,
    },

    /// Poll loop exceeded its hard limit without converging
    #[error("iteration {iteration}: counter did not reach {expected} within {limit} polls")]
    PollLimitExceeded {
        /// Iteration index
        iteration: usize,
        /// Counter value being waited for
        expected: i64,
        /// Configured poll limit
        limit: u32,
    },

    /// Quantile aggregation rejected its input
    #[error("aggregation error: {0}")]
    Quantile(#[from] QuantileError),

    /// A background call panicked or was cancelled
    #[error("background call did not finish: {0}")]
    Join(#[from] tokio::task::JoinError),

    /// Driver was built without a required collaborator
    #[error("missing driver component: {0}")]
    MissingComponent(&'static str),

    /// Response payload did not have the expected shape
    #[error("malformed {what} payload: {source}")]
    Payload {
        /// What was being decoded
        what: &'static str,
        /// Decode error
        #[source]
        source: serde_json::Error,
    },
}

impl Error {
    /// Wrap a client error with the operation that produced it
    pub fn client(operation: &'static str, source: ClientError) -> Self {
        Error::Client { operation, source }
    }

    /// Wrap a payload decode error
    pub fn payload(what: &'static str, source: serde_json::Error) -> Self {
        Error::Payload { what, source }
    }
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_error_carries_operation() {
        let err = Error::client(
            "signal",
            ClientError::NotFound {
                workflow_id: "my-workflow-id".into(),
            },
        );
        let msg = err.to_string();
        assert!(msg.contains("signal"));
        assert!(msg.contains("my-workflow-id"));
    }

    #[test]
    fn test_consistency_violation_message() {
        let err = Error::ConsistencyViolation {
            iteration: 7,
            expected: 8,
            observed: 7,
        };
        assert_eq!(
            err.to_string(),
            "iteration 7: query observed counter 7, expected 8"
        );
    }
}
