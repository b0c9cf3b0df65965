//! Report output for tle experiments
//!
//! The JSON report goes to stdout (and optionally a file); the human-readable
//! summary lines go to stderr so the two can be piped separately.

#![warn(missing_docs)]
#![warn(clippy::all)]

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;
use tle_core::{ns_to_ms, LatencySummary, Report};

/// Report output errors
#[derive(Debug, Error)]
pub enum ReportError {
    /// Writing the report failed
    #[error("failed to write report: {0}")]
    Io(#[from] std::io::Error),

    /// Encoding the report failed
    #[error("failed to encode report: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Pretty-printed JSON export
pub struct JsonExporter;

impl JsonExporter {
    /// Write the report, followed by a newline
    pub fn write<W: Write>(report: &Report, mut writer: W) -> Result<(), ReportError> {
        serde_json::to_writer_pretty(&mut writer, report)?;
        writer.write_all(b"\n")?;
        writer.flush()?;
        Ok(())
    }

    /// Export the report to a file, replacing any existing one
    pub fn export(report: &Report, path: impl AsRef<Path>) -> Result<(), ReportError> {
        let file = File::create(path)?;
        Self::write(report, BufWriter::new(file))
    }

    /// Render the report as a string
    pub fn render(report: &Report) -> Result<String, ReportError> {
        Ok(serde_json::to_string_pretty(report)?)
    }
}

/// `p90: <ms>` with one decimal place
pub fn p90_line(summary: &LatencySummary) -> String {
    format!("p90: {:.1}", summary.p90_ms())
}

/// Multi-line percentile table in milliseconds
pub fn summary_table(summary: &LatencySummary) -> String {
    let rows = [
        ("min", ns_to_ms(summary.min_ns)),
        ("p50", ns_to_ms(summary.p50_ns)),
        ("p90", ns_to_ms(summary.p90_ns)),
        ("p99", ns_to_ms(summary.p99_ns)),
        ("max", ns_to_ms(summary.max_ns)),
        ("mean", summary.mean_ns / 1e6),
    ];

    let mut out = format!("{:<6}{:>12}\n", "n", summary.count);
    for (label, ms) in rows {
        out.push_str(&format!("{label:<6}{ms:>10.3}ms\n"));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tle_core::{Anomaly, AnomalyKind, ResultAccumulator, Sample};

    fn sample_report() -> Report {
        let mut acc = ResultAccumulator::with_capacity(3);
        for ns in [1_000_000, 2_000_000, 3_000_000] {
            acc.push(Sample::new(ns));
        }
        acc.finish("query", Utc::now())
    }

    #[test]
    fn test_p90_line_one_decimal() {
        let summary = LatencySummary::from_latencies(&[1_000_000, 12_340_000]).unwrap();
        assert_eq!(p90_line(&summary), "p90: 12.3");

        let summary = LatencySummary::from_latencies(&[460_000]).unwrap();
        assert_eq!(p90_line(&summary), "p90: 0.5");
    }

    #[test]
    fn test_summary_table_rows() {
        let summary = LatencySummary::from_latencies(&[1_000_000, 3_000_000]).unwrap();
        let table = summary_table(&summary);

        assert_eq!(table.lines().count(), 7);
        assert!(table.starts_with("n"));
        assert!(table.contains("max        3.000ms"));
    }

    #[test]
    fn test_write_uses_wire_field_names() {
        let mut buf = Vec::new();
        JsonExporter::write(&sample_report(), &mut buf).unwrap();

        let value: serde_json::Value = serde_json::from_slice(&buf).unwrap();
        assert_eq!(value["experiment"], "query");
        assert_eq!(
            value["latenciesNs"],
            serde_json::json!([1_000_000, 2_000_000, 3_000_000])
        );
        assert_eq!(value["polls"], serde_json::json!([]));
        assert_eq!(value["wfts"], serde_json::json!([]));
        assert_eq!(value["queryTimes"], serde_json::json!([]));
        assert!(value.get("anomalies").is_none());
        assert!(buf.ends_with(b"\n"));
    }

    #[test]
    fn test_anomalies_serialized_when_present() {
        let mut acc = ResultAccumulator::with_capacity(1);
        acc.push(Sample::new(10));
        acc.record_anomaly(Anomaly {
            iteration: 0,
            kind: AnomalyKind::StaleQuery {
                expected: 1,
                observed: 0,
            },
        });
        let report = acc.finish("signalquery", Utc::now());

        let json = JsonExporter::render(&report).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["anomalies"][0]["kind"], "staleQuery");
        assert_eq!(value["anomalies"][0]["iteration"], 0);
    }

    #[test]
    fn test_export_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");

        JsonExporter::export(&sample_report(), &path).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&contents).unwrap();
        assert_eq!(value["iterations"], 3);
    }

    #[test]
    fn test_export_to_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("report.json");

        let err = JsonExporter::export(&sample_report(), &path).unwrap_err();
        assert!(matches!(err, ReportError::Io(_)));
    }
}
