//! Batch status polling with bounded exponential backoff

use std::time::Duration;
use tokio::time::{sleep, Instant};

use super::{BatchBackend, BatchError, BatchJob, BatchStatus};

/// How long and how often to wait for a batch job
#[derive(Debug, Clone)]
pub struct PollPolicy {
    /// Delay after the first status check
    pub initial_interval: Duration,
    /// Upper bound for the delay between checks
    pub max_interval: Duration,
    /// Delay growth factor per check
    pub multiplier: f64,
    /// Maximum number of status checks; `None` relies on the timeout alone
    pub max_attempts: Option<u32>,
    /// Total time budget for the wait
    pub timeout: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(1),
            max_interval: Duration::from_secs(60),
            multiplier: 2.0,
            max_attempts: None,
            timeout: Duration::from_secs(24 * 60 * 60),
        }
    }
}

impl PollPolicy {
    /// Delay to wait after the given (zero-based) attempt
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.max(1.0).powi(attempt.min(64) as i32);
        let millis = (self.initial_interval.as_millis() as f64 * factor)
            .min(self.max_interval.as_millis() as f64);
        Duration::from_millis(millis as u64)
    }
}

/// Result of waiting on a batch job
#[derive(Debug, Clone)]
pub enum PollOutcome {
    /// The job finished and its output can be downloaded
    Completed(BatchJob),
    /// The budget ran out while the job was still running
    Pending {
        batch_id: String,
        status: BatchStatus,
        attempts: u32,
        elapsed: Duration,
    },
}

impl PollOutcome {
    /// Convert a pending outcome into an error for callers that need output
    pub fn into_completed(self) -> Result<BatchJob, BatchError> {
        match self {
            PollOutcome::Completed(job) => Ok(job),
            PollOutcome::Pending {
                batch_id,
                status,
                attempts,
                ..
            } => Err(BatchError::StillPending {
                batch_id,
                status,
                attempts,
            }),
        }
    }
}

/// Poll `batch_id` until it completes, fails, or the policy is exhausted.
///
/// Terminal failure states are errors. Running out of attempts or time is
/// not: it yields [`PollOutcome::Pending`] so the caller can decide.
pub async fn poll_until_complete(
    backend: &dyn BatchBackend,
    batch_id: &str,
    policy: &PollPolicy,
) -> Result<PollOutcome, BatchError> {
    let start = Instant::now();
    let mut attempts: u32 = 0;

    loop {
        let job = backend.retrieve_batch(batch_id).await?;
        attempts += 1;

        if let Some(counts) = job.request_counts {
            tracing::info!(
                "Batch {} status: {} ({}/{} done, {} failed)",
                batch_id,
                job.status,
                counts.completed,
                counts.total,
                counts.failed
            );
        } else {
            tracing::info!("Batch {} status: {}", batch_id, job.status);
        }

        if job.status == BatchStatus::Completed {
            return Ok(PollOutcome::Completed(job));
        }

        if job.status.is_failure() {
            return Err(BatchError::JobFailed {
                batch_id: batch_id.to_string(),
                status: job.status,
            });
        }

        let elapsed = start.elapsed();
        let out_of_attempts = policy.max_attempts.map(|max| attempts >= max).unwrap_or(false);
        if out_of_attempts || elapsed >= policy.timeout {
            tracing::warn!(
                "Giving up on batch {} after {} checks ({:?}), last status {}",
                batch_id,
                attempts,
                elapsed,
                job.status
            );
            return Ok(PollOutcome::Pending {
                batch_id: batch_id.to_string(),
                status: job.status,
                attempts,
                elapsed,
            });
        }

        let delay = policy
            .delay_for(attempts - 1)
            .min(policy.timeout.saturating_sub(elapsed));
        sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{ProviderError, ProviderResult};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Backend that replays a fixed status sequence, repeating the last one
    struct ScriptedBackend {
        statuses: Vec<BatchStatus>,
        calls: Mutex<usize>,
    }

    impl ScriptedBackend {
        fn new(statuses: Vec<BatchStatus>) -> Self {
            Self { statuses, calls: Mutex::new(0) }
        }

        fn calls(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl BatchBackend for ScriptedBackend {
        async fn upload_batch_file(&self, _filename: &str, _content: Vec<u8>) -> ProviderResult<String> {
            Err(ProviderError::Config("not used".to_string()))
        }

        async fn create_batch(&self, _: &str, _: &str, _: &str) -> ProviderResult<BatchJob> {
            Err(ProviderError::Config("not used".to_string()))
        }

        async fn retrieve_batch(&self, batch_id: &str) -> ProviderResult<BatchJob> {
            let mut calls = self.calls.lock().unwrap();
            let status = self.statuses[(*calls).min(self.statuses.len() - 1)];
            *calls += 1;
            Ok(BatchJob {
                id: batch_id.to_string(),
                status,
                input_file_id: None,
                output_file_id: (status == BatchStatus::Completed).then(|| "file-out".to_string()),
                error_file_id: None,
                request_counts: None,
            })
        }

        async fn download_file(&self, _file_id: &str) -> ProviderResult<Vec<u8>> {
            Ok(Vec::new())
        }
    }

    fn fast_policy(max_attempts: Option<u32>) -> PollPolicy {
        PollPolicy {
            initial_interval: Duration::from_millis(1),
            max_interval: Duration::from_millis(4),
            multiplier: 2.0,
            max_attempts,
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_backoff_is_exponential_and_capped() {
        let policy = PollPolicy {
            initial_interval: Duration::from_millis(100),
            max_interval: Duration::from_millis(1_000),
            multiplier: 2.0,
            max_attempts: None,
            timeout: Duration::from_secs(60),
        };
        assert_eq!(policy.delay_for(0), Duration::from_millis(100));
        assert_eq!(policy.delay_for(1), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(800));
        assert_eq!(policy.delay_for(4), Duration::from_millis(1_000));
        assert_eq!(policy.delay_for(40), Duration::from_millis(1_000));
    }

    #[tokio::test]
    async fn test_completes_after_progress() {
        let backend = ScriptedBackend::new(vec![
            BatchStatus::Validating,
            BatchStatus::InProgress,
            BatchStatus::Finalizing,
            BatchStatus::Completed,
        ]);

        let outcome = poll_until_complete(&backend, "batch_1", &fast_policy(None)).await.unwrap();
        match outcome {
            PollOutcome::Completed(job) => assert_eq!(job.output_file_id.as_deref(), Some("file-out")),
            other => panic!("expected completion, got {:?}", other),
        }
        assert_eq!(backend.calls(), 4);
    }

    #[tokio::test]
    async fn test_attempt_cap_yields_pending() {
        let backend = ScriptedBackend::new(vec![BatchStatus::InProgress]);

        let outcome = poll_until_complete(&backend, "batch_2", &fast_policy(Some(3))).await.unwrap();
        match &outcome {
            PollOutcome::Pending { status, attempts, .. } => {
                assert_eq!(*status, BatchStatus::InProgress);
                assert_eq!(*attempts, 3);
            }
            other => panic!("expected pending, got {:?}", other),
        }
        assert!(matches!(
            outcome.into_completed(),
            Err(BatchError::StillPending { attempts: 3, .. })
        ));
    }

    #[tokio::test]
    async fn test_timeout_yields_pending() {
        let backend = ScriptedBackend::new(vec![BatchStatus::Validating]);
        let policy = PollPolicy {
            timeout: Duration::from_millis(20),
            ..fast_policy(None)
        };

        let outcome = poll_until_complete(&backend, "batch_3", &policy).await.unwrap();
        assert!(matches!(outcome, PollOutcome::Pending { .. }));
        assert!(backend.calls() >= 2);
    }

    #[tokio::test]
    async fn test_failed_job_is_error() {
        let backend = ScriptedBackend::new(vec![BatchStatus::InProgress, BatchStatus::Expired]);

        let err = poll_until_complete(&backend, "batch_4", &fast_policy(None)).await.unwrap_err();
        assert!(matches!(
            err,
            BatchError::JobFailed { status: BatchStatus::Expired, .. }
        ));
    }
}
