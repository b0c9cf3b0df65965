//! Per-iteration samples and the finalized report

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One iteration's measurement
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Sample {
    /// Elapsed time of the measured operation(s)
    pub latency_ns: i64,
    /// Queries issued before the counter converged
    pub poll_count: Option<u32>,
    /// Workflow tasks in the current run's history
    pub workflow_task_count: Option<u32>,
    /// Time since the last signal as reported by the query
    pub query_age_ns: Option<i64>,
}

impl Sample {
    /// Sample carrying only a latency
    pub fn new(latency_ns: i64) -> Self {
        Self {
            latency_ns,
            ..Default::default()
        }
    }
}

/// Non-fatal observation recorded during a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Anomaly {
    /// Iteration index
    pub iteration: usize,
    /// What was observed
    #[serde(flatten)]
    pub kind: AnomalyKind,
}

/// Anomaly categories
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "kind")]
pub enum AnomalyKind {
    /// A query racing a signal observed the pre-signal counter
    StaleQuery {
        /// Counter the signal should have produced
        expected: i64,
        /// Counter the query returned
        observed: i64,
    },
    /// The poll loop needed more polls than the configured threshold
    SlowConvergence {
        /// Polls issued
        polls: u32,
    },
}

/// Append-only collection of samples for a run
#[derive(Debug, Default)]
pub struct ResultAccumulator {
    latencies_ns: Vec<i64>,
    polls: Vec<u32>,
    wfts: Vec<u32>,
    query_times: Vec<i64>,
    anomalies: Vec<Anomaly>,
}

impl ResultAccumulator {
    /// Create an accumulator sized for `iterations` samples
    pub fn with_capacity(iterations: usize) -> Self {
        Self {
            latencies_ns: Vec::with_capacity(iterations),
            ..Default::default()
        }
    }

    /// Append one sample; optional fields go to their own sequences
    pub fn push(&mut self, sample: Sample) {
        self.latencies_ns.push(sample.latency_ns);
        if let Some(polls) = sample.poll_count {
            self.polls.push(polls);
        }
        if let Some(wfts) = sample.workflow_task_count {
            self.wfts.push(wfts);
        }
        if let Some(age) = sample.query_age_ns {
            self.query_times.push(age);
        }
    }

    /// Record a non-fatal anomaly
    pub fn record_anomaly(&mut self, anomaly: Anomaly) {
        tracing::warn!(iteration = anomaly.iteration, kind = ?anomaly.kind, "anomaly recorded");
        self.anomalies.push(anomaly);
    }

    /// Number of samples collected
    pub fn len(&self) -> usize {
        self.latencies_ns.len()
    }

    /// Whether no sample has been collected
    pub fn is_empty(&self) -> bool {
        self.latencies_ns.is_empty()
    }

    /// Latencies collected so far
    pub fn latencies(&self) -> &[i64] {
        &self.latencies_ns
    }

    /// Seal the accumulator into a report
    pub fn finish(self, experiment: &str, started_at: DateTime<Utc>) -> Report {
        Report {
            experiment: experiment.to_string(),
            iterations: self.latencies_ns.len(),
            started_at,
            finished_at: Utc::now(),
            latencies_ns: self.latencies_ns,
            polls: self.polls,
            wfts: self.wfts,
            query_times: self.query_times,
            anomalies: self.anomalies,
        }
    }
}

/// Finalized results of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    /// Experiment name
    pub experiment: String,
    /// Completed iterations
    pub iterations: usize,
    /// When the iteration loop began
    pub started_at: DateTime<Utc>,
    /// When the iteration loop ended
    pub finished_at: DateTime<Utc>,
    /// Per-iteration latency in nanoseconds
    pub latencies_ns: Vec<i64>,
    /// Per-iteration poll counts
    pub polls: Vec<u32>,
    /// Per-iteration workflow-task counts
    pub wfts: Vec<u32>,
    /// Per-iteration query ages in nanoseconds
    pub query_times: Vec<i64>,
    /// Non-fatal anomalies
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub anomalies: Vec<Anomaly>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_splits_optional_fields() {
        let mut acc = ResultAccumulator::with_capacity(3);
        acc.push(Sample::new(10));
        acc.push(Sample {
            latency_ns: 20,
            poll_count: Some(2),
            query_age_ns: Some(5),
            ..Default::default()
        });
        acc.push(Sample {
            latency_ns: 30,
            workflow_task_count: Some(4),
            ..Default::default()
        });

        assert_eq!(acc.len(), 3);
        let report = acc.finish("signalquerypoll", Utc::now());
        assert_eq!(report.latencies_ns, vec![10, 20, 30]);
        assert_eq!(report.polls, vec![2]);
        assert_eq!(report.query_times, vec![5]);
        assert_eq!(report.wfts, vec![4]);
        assert_eq!(report.iterations, 3);
        assert!(report.finished_at >= report.started_at);
    }

    #[test]
    fn test_report_field_names() {
        let mut acc = ResultAccumulator::default();
        acc.push(Sample::new(1));
        let json = serde_json::to_value(acc.finish("signal", Utc::now())).unwrap();

        for key in [
            "experiment",
            "iterations",
            "startedAt",
            "finishedAt",
            "latenciesNs",
            "polls",
            "wfts",
            "queryTimes",
        ] {
            assert!(json.get(key).is_some(), "missing {key}");
        }
        assert!(json.get("anomalies").is_none());
    }

    #[test]
    fn test_anomalies_serialized_when_present() {
        let mut acc = ResultAccumulator::default();
        acc.push(Sample::new(1));
        acc.record_anomaly(Anomaly {
            iteration: 0,
            kind: AnomalyKind::StaleQuery {
                expected: 1,
                observed: 0,
            },
        });
        let json = serde_json::to_value(acc.finish("signalquery", Utc::now())).unwrap();
        let anomalies = json["anomalies"].as_array().unwrap();
        assert_eq!(anomalies.len(), 1);
        assert_eq!(anomalies[0]["kind"], "staleQuery");
        assert_eq!(anomalies[0]["expected"], 1);
        assert_eq!(anomalies[0]["iteration"], 0);
    }
}
