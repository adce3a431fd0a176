use std::time::Duration;

use crate::pipeline::task::{FailureKind, FetchOutcome, UrlTask};

/// Terminal or follow-up state for a task after one fetch attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskState {
    /// Fetch succeeded; the task proceeds to extraction and analysis
    Succeeded,

    /// Transient failure with attempts remaining; re-enqueue after `delay`
    Retrying { delay: Duration },

    /// Terminal failure; no further attempts
    Failed { kind: FailureKind },
}

/// Decides whether and when a failed fetch is re-attempted
///
/// Stateless by design: all per-task state lives in the `UrlTask`
/// attempt counter, so transitions are unit-testable without I/O.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    base_delay: Duration,
    max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(base_delay: Duration, max_delay: Duration) -> Self {
        Self {
            base_delay,
            max_delay,
        }
    }

    /// Transition a task given the outcome of its latest fetch
    pub fn transition(&self, task: &UrlTask, outcome: &FetchOutcome) -> TaskState {
        match outcome {
            FetchOutcome::Fetched { .. } => TaskState::Succeeded,
            FetchOutcome::PermanentFailure { .. } => TaskState::Failed {
                kind: FailureKind::NetworkPermanent,
            },
            FetchOutcome::TransientFailure { .. } => {
                if task.attempts_used() < task.max_attempts {
                    TaskState::Retrying {
                        delay: self.backoff_delay(task.attempt),
                    }
                } else {
                    TaskState::Failed {
                        kind: FailureKind::NetworkTransient,
                    }
                }
            }
        }
    }

    /// Backoff before re-attempting after the given (zero-based) attempt
    ///
    /// Doubles per attempt and is capped, so the schedule is
    /// monotonically non-decreasing in the attempt number.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.min(16));
        self.base_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(Duration::from_millis(500), Duration::from_secs(30))
    }
}
