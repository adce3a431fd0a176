use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Fetch-level counters for one run
#[derive(Debug, Clone, Serialize)]
pub struct RunStatsSnapshot {
    pub started_at: DateTime<Utc>,

    /// Every fetch attempt, including retries
    pub total_attempts: usize,

    pub fetched: usize,
    pub transient_failures: usize,
    pub permanent_failures: usize,

    /// Body bytes downloaded across successful fetches
    pub bytes_downloaded: usize,

    /// HTTP status code counts for completed responses
    pub status_codes: HashMap<u16, usize>,
}

impl Default for RunStatsSnapshot {
    fn default() -> Self {
        Self {
            started_at: Utc::now(),
            total_attempts: 0,
            fetched: 0,
            transient_failures: 0,
            permanent_failures: 0,
            bytes_downloaded: 0,
            status_codes: HashMap::new(),
        }
    }
}

/// Shared collector for fetch attempt statistics
#[derive(Debug, Clone, Default)]
pub struct RunStats {
    inner: Arc<Mutex<RunStatsSnapshot>>,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record_fetched(&self, status_code: u16, bytes: usize) {
        let mut stats = self.inner.lock().await;
        stats.total_attempts += 1;
        stats.fetched += 1;
        stats.bytes_downloaded += bytes;
        *stats.status_codes.entry(status_code).or_default() += 1;
    }

    pub async fn record_transient(&self) {
        let mut stats = self.inner.lock().await;
        stats.total_attempts += 1;
        stats.transient_failures += 1;
    }

    pub async fn record_permanent(&self) {
        let mut stats = self.inner.lock().await;
        stats.total_attempts += 1;
        stats.permanent_failures += 1;
    }

    pub async fn snapshot(&self) -> RunStatsSnapshot {
        self.inner.lock().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_stats_accumulate() {
        let stats = RunStats::new();
        stats.record_fetched(200, 1024).await;
        stats.record_fetched(200, 512).await;
        stats.record_transient().await;
        stats.record_permanent().await;

        let snapshot = stats.snapshot().await;
        assert_eq!(snapshot.total_attempts, 4);
        assert_eq!(snapshot.fetched, 2);
        assert_eq!(snapshot.transient_failures, 1);
        assert_eq!(snapshot.permanent_failures, 1);
        assert_eq!(snapshot.bytes_downloaded, 1536);
        assert_eq!(snapshot.status_codes.get(&200), Some(&2));
    }
}
