use chrono::Utc;
use rand::Rng;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Notify, Semaphore};
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::pipeline::analyzer::ContentAnalyzer;
use crate::pipeline::extractor;
use crate::pipeline::fetcher::Fetcher;
use crate::pipeline::retry::{RetryPolicy, TaskState};
use crate::pipeline::task::{
    AnalysisRecord, BatchResult, FailureKind, FetchOutcome, UrlTask,
};
use crate::utils::stats::RunStats;

/// Configuration rejected before any batch starts
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SchedulerConfigError {
    #[error("batch_size must be at least 1")]
    ZeroBatchSize,

    #[error("max_workers must be at least 1")]
    ZeroWorkers,

    #[error("max_workers ({workers}) cannot exceed batch_size ({batch_size})")]
    TooManyWorkers { workers: usize, batch_size: usize },

    #[error("max_attempts must be at least 1")]
    ZeroAttempts,
}

/// Run parameters for the batch scheduler
#[derive(Debug, Clone)]
pub struct BatchOptions {
    /// URLs per contiguous batch
    pub batch_size: usize,

    /// Concurrent pipelines within a batch
    pub max_workers: usize,

    /// Pause between batches; not applied after the final batch
    pub inter_batch_delay: Duration,

    /// Total fetch attempts allowed per URL
    pub max_attempts: u32,

    pub retry_base_delay: Duration,
    pub retry_max_delay: Duration,

    /// Apply a ±20% jitter to the inter-batch delay
    pub delay_jitter: bool,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            batch_size: 5,
            max_workers: 3,
            inter_batch_delay: Duration::from_secs(1),
            max_attempts: 3,
            retry_base_delay: Duration::from_millis(500),
            retry_max_delay: Duration::from_secs(30),
            delay_jitter: true,
        }
    }
}

impl BatchOptions {
    pub fn validate(&self) -> Result<(), SchedulerConfigError> {
        if self.batch_size == 0 {
            return Err(SchedulerConfigError::ZeroBatchSize);
        }
        if self.max_workers == 0 {
            return Err(SchedulerConfigError::ZeroWorkers);
        }
        if self.max_workers > self.batch_size {
            return Err(SchedulerConfigError::TooManyWorkers {
                workers: self.max_workers,
                batch_size: self.batch_size,
            });
        }
        if self.max_attempts == 0 {
            return Err(SchedulerConfigError::ZeroAttempts);
        }
        Ok(())
    }
}

/// Run-level cancellation signal
///
/// Cancelling stops new batches and new pipelines from launching;
/// in-flight fetches finish (or hit their own timeout) and URLs that
/// never ran are recorded as `Cancelled`.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<CancelInner>);

#[derive(Debug, Default)]
struct CancelInner {
    cancelled: AtomicBool,
    notify: Notify,
}

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.cancelled.store(true, Ordering::SeqCst);
        self.0.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.cancelled.load(Ordering::SeqCst)
    }

    /// Completes once the flag is cancelled; immediately if it already is
    pub async fn cancelled(&self) {
        let notified = self.0.notify.notified();
        tokio::pin!(notified);
        // Register before the flag check so a concurrent cancel() is
        // never missed.
        notified.as_mut().enable();
        if self.is_cancelled() {
            return;
        }
        notified.await;
    }

    /// Sleep for `duration` unless the flag is cancelled first
    pub async fn sleep(&self, duration: Duration) {
        tokio::select! {
            _ = sleep(duration) => {}
            _ = self.cancelled() => {}
        }
    }
}

/// Runs per-URL pipelines over contiguous batches with bounded concurrency
pub struct BatchScheduler {
    fetcher: Arc<Fetcher>,
    analyzer: Arc<ContentAnalyzer>,
    retry: RetryPolicy,
    options: BatchOptions,
    semaphore: Arc<Semaphore>,
    cancel: CancelFlag,
    stats: RunStats,
}

impl BatchScheduler {
    /// Create a scheduler, rejecting invalid options up front
    pub fn new(
        fetcher: Arc<Fetcher>,
        analyzer: Arc<ContentAnalyzer>,
        options: BatchOptions,
    ) -> Result<Self, SchedulerConfigError> {
        options.validate()?;

        let semaphore = Arc::new(Semaphore::new(options.max_workers));
        let retry = RetryPolicy::new(options.retry_base_delay, options.retry_max_delay);

        Ok(Self {
            fetcher,
            analyzer,
            retry,
            options,
            semaphore,
            cancel: CancelFlag::new(),
            stats: RunStats::new(),
        })
    }

    /// Handle that cancels this scheduler's runs
    pub fn cancel_flag(&self) -> CancelFlag {
        self.cancel.clone()
    }

    /// Fetch-level counters shared by all pipelines of this scheduler
    pub fn stats(&self) -> RunStats {
        self.stats.clone()
    }

    /// Process every URL and return one record per input, in input order
    ///
    /// A single URL's failure never aborts the run; its slot is filled
    /// with a failure record instead.
    pub async fn run(&self, urls: Vec<String>) -> BatchResult {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let total = urls.len();
        let batch_size = self.options.batch_size;
        let batch_count = total.div_ceil(batch_size);

        info!(
            "Run {}: {} URLs in {} batches of up to {} ({} workers)",
            run_id, total, batch_count, batch_size, self.options.max_workers
        );

        let mut slots: Vec<Option<AnalysisRecord>> = (0..total).map(|_| None).collect();

        for (batch_index, chunk) in urls.chunks(batch_size).enumerate() {
            if batch_index > 0 && !self.cancel.is_cancelled() {
                let delay = self.inter_batch_delay();
                debug!(
                    "Run {}: waiting {} ms before batch {}",
                    run_id,
                    delay.as_millis(),
                    batch_index + 1
                );
                self.cancel.sleep(delay).await;
            }

            if self.cancel.is_cancelled() {
                warn!(
                    "Run {}: cancelled; recording batch {}/{} as cancelled",
                    run_id,
                    batch_index + 1,
                    batch_count
                );
                for (offset, url) in chunk.iter().enumerate() {
                    slots[batch_index * batch_size + offset] = Some(AnalysisRecord::failed(
                        url.clone(),
                        0,
                        FailureKind::Cancelled,
                        "run cancelled before this URL was scheduled",
                    ));
                }
                continue;
            }

            info!(
                "Run {}: batch {}/{} ({} URLs)",
                run_id,
                batch_index + 1,
                batch_count,
                chunk.len()
            );

            let mut meta: Vec<(usize, String)> = Vec::with_capacity(chunk.len());
            let mut handles: Vec<JoinHandle<AnalysisRecord>> = Vec::with_capacity(chunk.len());

            for (offset, url) in chunk.iter().enumerate() {
                meta.push((batch_index * batch_size + offset, url.clone()));
                handles.push(self.spawn_pipeline(url.clone()));
            }

            // Every URL in the batch reaches a terminal state before the
            // next batch starts.
            let joined = futures::future::join_all(handles).await;
            for ((index, url), outcome) in meta.into_iter().zip(joined) {
                let record = match outcome {
                    Ok(record) => record,
                    Err(e) => {
                        error!("Run {}: worker for {} aborted: {}", run_id, url, e);
                        AnalysisRecord::failed(
                            url,
                            0,
                            FailureKind::Cancelled,
                            format!("worker aborted: {}", e),
                        )
                    }
                };
                slots[index] = Some(record);
            }
        }

        let records = slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.unwrap_or_else(|| {
                    AnalysisRecord::failed(
                        urls[index].clone(),
                        0,
                        FailureKind::Cancelled,
                        "no terminal state recorded",
                    )
                })
            })
            .collect::<Vec<_>>();

        let result = BatchResult {
            run_id,
            started_at,
            finished_at: Utc::now(),
            records,
        };

        info!(
            "Run {} finished: {} succeeded, {} failed",
            run_id,
            result.succeeded_count(),
            result.failed_count()
        );

        result
    }

    fn spawn_pipeline(&self, url: String) -> JoinHandle<AnalysisRecord> {
        let fetcher = Arc::clone(&self.fetcher);
        let analyzer = Arc::clone(&self.analyzer);
        let semaphore = Arc::clone(&self.semaphore);
        let retry = self.retry;
        let cancel = self.cancel.clone();
        let stats = self.stats.clone();
        let max_attempts = self.options.max_attempts;

        tokio::spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    return AnalysisRecord::failed(
                        url,
                        0,
                        FailureKind::Cancelled,
                        "worker pool closed",
                    );
                }
            };

            if cancel.is_cancelled() {
                return AnalysisRecord::failed(
                    url,
                    0,
                    FailureKind::Cancelled,
                    "run cancelled before fetch",
                );
            }

            process_url(&fetcher, &analyzer, &retry, &cancel, &stats, url, max_attempts).await
        })
    }

    fn inter_batch_delay(&self) -> Duration {
        let base = self.options.inter_batch_delay;
        if !self.options.delay_jitter || base.is_zero() {
            return base;
        }
        let factor = rand::thread_rng().gen_range(0.8..1.2);
        base.mul_f64(factor)
    }
}

/// One URL's full pipeline: fetch, retry on transient failures, then
/// extract and analyze. Always returns a terminal record.
async fn process_url(
    fetcher: &Fetcher,
    analyzer: &ContentAnalyzer,
    retry: &RetryPolicy,
    cancel: &CancelFlag,
    stats: &RunStats,
    url: String,
    max_attempts: u32,
) -> AnalysisRecord {
    let mut task = UrlTask::new(url.clone(), max_attempts);

    loop {
        let outcome = fetcher.fetch(&task.url).await;
        let attempts = task.attempts_used();

        match &outcome {
            FetchOutcome::Fetched {
                status_code, body, ..
            } => {
                stats.record_fetched(*status_code, body.len()).await;

                return match extractor::extract(&task.url, body) {
                    Ok(content) => {
                        let metrics = analyzer.analyze(&content);
                        debug!("Analyzed {} ({} metrics)", task.url, metrics.len());
                        AnalysisRecord::succeeded(url, attempts, metrics)
                    }
                    // Malformed content will not improve on retry
                    Err(e) => AnalysisRecord::failed(
                        url,
                        attempts,
                        FailureKind::Extraction,
                        e.to_string(),
                    ),
                };
            }
            FetchOutcome::TransientFailure { reason } => {
                stats.record_transient().await;

                match retry.transition(&task, &outcome) {
                    TaskState::Retrying { delay } => {
                        debug!(
                            "Retrying {} in {} ms (attempt {}/{}): {}",
                            task.url,
                            delay.as_millis(),
                            attempts,
                            max_attempts,
                            reason
                        );
                        cancel.sleep(delay).await;

                        if cancel.is_cancelled() {
                            return AnalysisRecord::failed(
                                url,
                                attempts,
                                FailureKind::Cancelled,
                                "run cancelled during retry backoff",
                            );
                        }
                        task = task.next_attempt();
                    }
                    _ => {
                        return AnalysisRecord::failed(
                            url,
                            attempts,
                            FailureKind::NetworkTransient,
                            format!("retries exhausted: {}", reason),
                        );
                    }
                }
            }
            FetchOutcome::PermanentFailure { reason } => {
                stats.record_permanent().await;
                return AnalysisRecord::failed(
                    url,
                    attempts,
                    FailureKind::NetworkPermanent,
                    reason.clone(),
                );
            }
        }
    }
}
