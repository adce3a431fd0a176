use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::debug;

use crate::pipeline::task::BatchResult;

/// Writer for one export format of a finished run
#[async_trait]
pub trait ReportWriter: Send + Sync {
    async fn write_report(&self, result: &BatchResult, output_path: &Path) -> Result<()>;
}

/// Nested JSON document export (full records including metric maps)
pub struct JsonReportWriter;

#[async_trait]
impl ReportWriter for JsonReportWriter {
    async fn write_report(&self, result: &BatchResult, output_path: &Path) -> Result<()> {
        ensure_parent_dir(output_path)?;

        let file = fs::File::create(output_path)
            .context(format!("Failed to create output file: {}", output_path.display()))?;

        serde_json::to_writer_pretty(file, result)
            .context("Failed to write JSON report")?;

        debug!(
            "Exported {} records to JSON file: {}",
            result.len(),
            output_path.display()
        );

        Ok(())
    }
}

/// Flat CSV export: fixed columns, then the union of metric names in
/// sorted order. Records missing a metric leave the cell empty.
pub struct CsvReportWriter;

#[async_trait]
impl ReportWriter for CsvReportWriter {
    async fn write_report(&self, result: &BatchResult, output_path: &Path) -> Result<()> {
        ensure_parent_dir(output_path)?;

        let metric_names: BTreeSet<&str> = result
            .records
            .iter()
            .flat_map(|r| r.metrics.keys().map(|k| k.as_str()))
            .collect();

        let mut file = fs::File::create(output_path)
            .context(format!("Failed to create output file: {}", output_path.display()))?;

        let mut header = vec!["url", "status", "attempts", "error"];
        header.extend(metric_names.iter().copied());
        writeln!(file, "{}", header.join(",")).context("Failed to write CSV header")?;

        for record in &result.records {
            let mut row: Vec<String> = vec![
                escape_csv(&record.url),
                record.status.to_string(),
                record.attempts.to_string(),
                record
                    .error
                    .as_ref()
                    .map(|e| escape_csv(&format!("{}: {}", e.kind, e.message)))
                    .unwrap_or_default(),
            ];
            for name in &metric_names {
                let cell = record
                    .metrics
                    .get(*name)
                    .map(|v| escape_csv(&v.to_string()))
                    .unwrap_or_default();
                row.push(cell);
            }
            writeln!(file, "{}", row.join(",")).context("Failed to write CSV row")?;
        }

        debug!(
            "Exported {} records to CSV file: {}",
            result.len(),
            output_path.display()
        );

        Ok(())
    }
}

/// Quote a CSV field when it contains a separator, quote or newline
fn escape_csv(field: &str) -> String {
    if field.contains(',') || field.contains('"') || field.contains('\n') {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)
                .context(format!("Failed to create directory: {}", parent.display()))?;
        }
    }
    Ok(())
}

/// End-of-run statistics printed for the user
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub success_rate: f64,
}

impl RunSummary {
    pub fn from_result(result: &BatchResult) -> Self {
        let total = result.len();
        let succeeded = result.succeeded_count();
        let failed = result.failed_count();
        let success_rate = if total == 0 {
            0.0
        } else {
            succeeded as f64 / total as f64 * 100.0
        };

        Self {
            total,
            succeeded,
            failed,
            success_rate,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::task::{AnalysisRecord, FailureKind, MetricMap, MetricValue};
    use chrono::Utc;
    use uuid::Uuid;

    fn sample_result() -> BatchResult {
        let mut metrics = MetricMap::new();
        metrics.insert("word_count".to_string(), MetricValue::Integer(42));
        metrics.insert("sentiment_score".to_string(), MetricValue::Float(0.5));

        BatchResult {
            run_id: Uuid::new_v4(),
            started_at: Utc::now(),
            finished_at: Utc::now(),
            records: vec![
                AnalysisRecord::succeeded("https://example.com/a", 1, metrics),
                AnalysisRecord::failed(
                    "https://example.com/b",
                    1,
                    FailureKind::NetworkPermanent,
                    "HTTP 404",
                ),
            ],
        }
    }

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("analyzer_test_{}_{}", std::process::id(), name))
    }

    #[tokio::test]
    async fn test_json_report_round_trips() {
        let path = temp_path("report.json");
        let result = sample_result();

        JsonReportWriter.write_report(&result, &path).await.unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let parsed: BatchResult = serde_json::from_str(&text).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed.records[0].url, "https://example.com/a");
        assert!(parsed.records[1].error.is_some());

        let _ = fs::remove_file(&path);
    }

    #[tokio::test]
    async fn test_csv_report_layout() {
        let path = temp_path("report.csv");
        let result = sample_result();

        CsvReportWriter.write_report(&result, &path).await.unwrap();

        let text = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "url,status,attempts,error,sentiment_score,word_count");
        assert!(lines[1].starts_with("https://example.com/a,succeeded,1,"));
        assert!(lines[1].ends_with("0.5000,42"));
        assert!(lines[2].contains("network_permanent: HTTP 404"));

        let _ = fs::remove_file(&path);
    }

    #[test]
    fn test_csv_escaping() {
        assert_eq!(escape_csv("plain"), "plain");
        assert_eq!(escape_csv("a,b"), "\"a,b\"");
        assert_eq!(escape_csv("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn test_summary_counts() {
        let summary = RunSummary::from_result(&sample_result());
        assert_eq!(summary.total, 2);
        assert_eq!(summary.succeeded, 1);
        assert_eq!(summary.failed, 1);
        assert!((summary.success_rate - 50.0).abs() < 1e-9);
    }
}
