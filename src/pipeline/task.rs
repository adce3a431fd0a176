use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// A URL queued for processing, together with its attempt counter
#[derive(Debug, Clone)]
pub struct UrlTask {
    /// URL to fetch and analyze
    pub url: String,

    /// Zero-based attempt counter, incremented on each retry
    pub attempt: u32,

    /// Total number of attempts allowed for this URL
    pub max_attempts: u32,
}

impl UrlTask {
    /// Create a task for a URL entering its batch for the first time
    pub fn new(url: impl Into<String>, max_attempts: u32) -> Self {
        Self {
            url: url.into(),
            attempt: 0,
            max_attempts,
        }
    }

    /// Consume the task and produce the follow-up attempt
    pub fn next_attempt(self) -> Self {
        Self {
            attempt: self.attempt + 1,
            ..self
        }
    }

    /// Number of fetches performed once the current attempt has run
    pub fn attempts_used(&self) -> u32 {
        self.attempt + 1
    }
}

/// Classified outcome of a single fetch
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// 2xx response with an HTML/text body
    Fetched {
        status_code: u16,
        body: Vec<u8>,
        headers: HashMap<String, String>,
        elapsed: Duration,
    },

    /// Failure that is worth retrying (timeouts, 429, 5xx)
    TransientFailure { reason: String },

    /// Failure that will not change on retry (other 4xx, bad content type)
    PermanentFailure { reason: String },
}

/// Terminal failure taxonomy for a processed URL
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Retryable network failure that exhausted its attempts
    NetworkTransient,

    /// Non-retryable HTTP or content-type failure
    NetworkPermanent,

    /// Body fetched but not usable as HTML
    Extraction,

    /// Run was cancelled before this URL could finish
    Cancelled,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::NetworkTransient => "network_transient",
            Self::NetworkPermanent => "network_permanent",
            Self::Extraction => "extraction",
            Self::Cancelled => "cancelled",
        };
        write!(f, "{}", name)
    }
}

/// A heading with its level (1 for `<h1>` through 6 for `<h6>`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Heading {
    pub level: u8,
    pub text: String,
}

/// Kind of media reference found in a page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Image,
    Video,
    Audio,
    Embed,
}

/// A media reference resolved to an absolute URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaRef {
    pub url: String,
    pub kind: MediaKind,
}

/// Structured extraction result for one page
///
/// `links` and `media` only ever contain absolute, normalized URLs;
/// relative references are resolved against the page URL during extraction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentRecord {
    pub url: String,
    pub title: Option<String>,
    pub text_blocks: Vec<String>,
    pub headings: Vec<Heading>,
    pub links: BTreeSet<String>,
    pub media: Vec<MediaRef>,
    pub raw_text_length: usize,
}

/// A single metric value, kept scalar so records flatten cleanly
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetricValue {
    Integer(i64),
    Float(f64),
    Text(String),
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{:.4}", v),
            Self::Text(v) => write!(f, "{}", v),
        }
    }
}

/// Flat mapping from metric name to scalar value
pub type MetricMap = BTreeMap<String, MetricValue>;

/// Whether a URL finished with usable metrics or a terminal failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    Succeeded,
    Failed,
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Succeeded => write!(f, "succeeded"),
            Self::Failed => write!(f, "failed"),
        }
    }
}

/// Error description attached to a failed record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordError {
    pub kind: FailureKind,
    pub message: String,
}

/// Final per-URL output of the pipeline
///
/// Exactly one record is produced per input URL; `error` is set if and
/// only if the record failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisRecord {
    pub url: String,
    pub status: RecordStatus,
    pub attempts: u32,
    pub metrics: MetricMap,
    pub error: Option<RecordError>,
    pub analyzed_at: DateTime<Utc>,
}

impl AnalysisRecord {
    pub fn succeeded(url: impl Into<String>, attempts: u32, metrics: MetricMap) -> Self {
        Self {
            url: url.into(),
            status: RecordStatus::Succeeded,
            attempts,
            metrics,
            error: None,
            analyzed_at: Utc::now(),
        }
    }

    pub fn failed(
        url: impl Into<String>,
        attempts: u32,
        kind: FailureKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            status: RecordStatus::Failed,
            attempts,
            metrics: MetricMap::new(),
            error: Some(RecordError {
                kind,
                message: message.into(),
            }),
            analyzed_at: Utc::now(),
        }
    }

    pub fn is_succeeded(&self) -> bool {
        self.status == RecordStatus::Succeeded
    }
}

/// Ordered result of a full run, one record per input URL
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchResult {
    /// Identifier for this run, also used in log lines
    pub run_id: Uuid,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,

    /// Records in original input order regardless of completion order
    pub records: Vec<AnalysisRecord>,
}

impl BatchResult {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn succeeded_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_succeeded()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.records.len() - self.succeeded_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_attempt_counting() {
        let task = UrlTask::new("https://example.com/a", 3);
        assert_eq!(task.attempt, 0);
        assert_eq!(task.attempts_used(), 1);

        let task = task.next_attempt();
        assert_eq!(task.attempt, 1);
        assert_eq!(task.attempts_used(), 2);
        assert_eq!(task.max_attempts, 3);
    }

    #[test]
    fn test_record_error_set_only_on_failure() {
        let ok = AnalysisRecord::succeeded("https://example.com", 1, MetricMap::new());
        assert!(ok.error.is_none());
        assert!(ok.is_succeeded());

        let failed = AnalysisRecord::failed(
            "https://example.com",
            1,
            FailureKind::NetworkPermanent,
            "HTTP 404",
        );
        assert!(!failed.is_succeeded());
        assert!(failed.metrics.is_empty());
        let error = failed.error.expect("failed record must carry an error");
        assert_eq!(error.kind, FailureKind::NetworkPermanent);
    }

    #[test]
    fn test_metric_value_serializes_as_scalar() {
        let mut metrics = MetricMap::new();
        metrics.insert("word_count".to_string(), MetricValue::Integer(500));
        metrics.insert("sentiment_score".to_string(), MetricValue::Float(0.25));

        let json = serde_json::to_value(&metrics).unwrap();
        assert_eq!(json["word_count"], 500);
        assert_eq!(json["sentiment_score"], 0.25);
    }
}
