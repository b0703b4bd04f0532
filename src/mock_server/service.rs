//! In-memory job state tracking for the mock status service.

use crate::types::JobStatus;
use rand::Rng;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Default delay before a registered job reaches its final state
pub const DEFAULT_COMPLETION_DELAY: Duration = Duration::from_secs(10);

/// Default probability that a job ends in `error`
pub const DEFAULT_ERROR_RATE: f64 = 0.1;

/// Simulated job backend.
///
/// The first lookup of an unknown ID registers it as `pending` and schedules
/// its transition to `completed` or `error` after the completion delay.
/// Clones share the same job table.
#[derive(Clone, Debug)]
pub struct JobStatusService {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    statuses: Mutex<HashMap<String, JobStatus>>,
    completion_delay: Duration,
    error_rate: f64,
}

impl JobStatusService {
    /// Create a service; `error_rate` is clamped to `0.0..=1.0`
    pub fn new(completion_delay: Duration, error_rate: f64) -> Self {
        let error_rate = if error_rate.is_nan() {
            DEFAULT_ERROR_RATE
        } else {
            error_rate.clamp(0.0, 1.0)
        };

        Self {
            inner: Arc::new(Inner {
                statuses: Mutex::new(HashMap::new()),
                completion_delay,
                error_rate,
            }),
        }
    }

    /// Current state of `video_id`, registering it on first sight
    pub async fn job_status(&self, video_id: &str) -> JobStatus {
        let mut statuses = self.inner.statuses.lock().await;
        if let Some(status) = statuses.get(video_id) {
            return *status;
        }

        statuses.insert(video_id.to_string(), JobStatus::Pending);
        drop(statuses);

        tracing::debug!(video_id = %video_id, "Registered new job");
        self.schedule_completion(video_id.to_string());
        JobStatus::Pending
    }

    /// Number of jobs seen so far
    pub async fn job_count(&self) -> usize {
        self.inner.statuses.lock().await.len()
    }

    /// Probability of a job ending in `error`
    pub fn error_rate(&self) -> f64 {
        self.inner.error_rate
    }

    fn schedule_completion(&self, video_id: String) {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            tokio::time::sleep(inner.completion_delay).await;

            let failed = rand::thread_rng().gen_bool(inner.error_rate);
            let status = if failed {
                JobStatus::Error
            } else {
                JobStatus::Completed
            };

            tracing::debug!(video_id = %video_id, status = %status, "Job finished");
            inner.statuses.lock().await.insert(video_id, status);
        });
    }
}

impl Default for JobStatusService {
    fn default() -> Self {
        Self::new(DEFAULT_COMPLETION_DELAY, DEFAULT_ERROR_RATE)
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn first_lookup_registers_pending() {
        let service = JobStatusService::new(Duration::from_secs(5), 0.0);

        assert_eq!(service.job_status("v1").await, JobStatus::Pending);
        assert_eq!(service.job_status("v1").await, JobStatus::Pending);
        assert_eq!(service.job_count().await, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn completes_after_delay() {
        let service = JobStatusService::new(Duration::from_secs(5), 0.0);
        service.job_status("v1").await;

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(service.job_status("v1").await, JobStatus::Pending);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(service.job_status("v1").await, JobStatus::Completed);
    }

    #[tokio::test(start_paused = true)]
    async fn full_error_rate_always_fails() {
        let service = JobStatusService::new(Duration::from_millis(100), 1.0);
        for id in ["a", "b", "c"] {
            service.job_status(id).await;
        }

        tokio::time::sleep(Duration::from_millis(200)).await;
        for id in ["a", "b", "c"] {
            assert_eq!(service.job_status(id).await, JobStatus::Error);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn final_state_is_stable() {
        let service = JobStatusService::new(Duration::from_millis(100), 0.5);
        service.job_status("v1").await;
        tokio::time::sleep(Duration::from_millis(200)).await;

        let first = service.job_status("v1").await;
        assert!(first.is_final());
        for _ in 0..10 {
            assert_eq!(service.job_status("v1").await, first);
        }
    }

    #[test]
    fn error_rate_is_clamped() {
        assert_eq!(JobStatusService::new(Duration::ZERO, 3.0).error_rate(), 1.0);
        assert_eq!(JobStatusService::new(Duration::ZERO, -1.0).error_rate(), 0.0);
        assert_eq!(
            JobStatusService::new(Duration::ZERO, f64::NAN).error_rate(),
            DEFAULT_ERROR_RATE
        );
    }
}
