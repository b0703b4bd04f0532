//! Core types and events for video-status-poller

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Opaque identifier of one video translation job
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemId(String);

impl ItemId {
    /// Create a new ItemId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for ItemId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for ItemId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for ItemId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Job state reported by the status service
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Translation finished successfully
    Completed,
    /// Translation failed on the server side
    Error,
    /// Translation still running
    Pending,
}

impl JobStatus {
    /// Wire representation (`"completed"`, `"error"`, `"pending"`)
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Completed => "completed",
            JobStatus::Error => "error",
            JobStatus::Pending => "pending",
        }
    }

    /// Interpret the `result` field of a status response
    ///
    /// Anything that is not `completed` or `error` (including a missing
    /// field) means the job has not reached a final state yet.
    pub fn from_result(result: Option<&str>) -> Self {
        match result {
            Some("completed") => JobStatus::Completed,
            Some("error") => JobStatus::Error,
            _ => JobStatus::Pending,
        }
    }

    /// Whether this status ends polling for the item
    pub fn is_final(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Error)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of `GET /status/{videoId}`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    /// Echo of the requested ID
    #[serde(rename = "videoId")]
    pub video_id: String,
    /// Raw job state
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
}

impl StatusResponse {
    /// Build a response for a known status
    pub fn new(video_id: impl Into<String>, status: JobStatus) -> Self {
        Self {
            video_id: video_id.into(),
            result: Some(status.as_str().to_string()),
        }
    }

    /// Parsed job status (unknown values read as pending)
    pub fn status(&self) -> JobStatus {
        JobStatus::from_result(self.result.as_deref())
    }
}

/// Result of one status lookup as seen by a poll worker
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StatusReading {
    /// The service answered with a job state
    Status(JobStatus),
    /// No usable answer (transport failure, non-200, malformed body)
    Indeterminate,
}

impl StatusReading {
    /// Label used in logs and events
    pub fn label(&self) -> &'static str {
        match self {
            StatusReading::Status(status) => status.as_str(),
            StatusReading::Indeterminate => "indeterminate",
        }
    }
}

/// Why a worker gave up on an item without a final job state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The per-item wall-clock budget was spent
    Deadline,
    /// Too many indeterminate lookups in a row
    RetriesExhausted,
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::Deadline => f.write_str("deadline"),
            StopReason::RetriesExhausted => f.write_str("retries_exhausted"),
        }
    }
}

/// Terminal outcome of one item
///
/// Only `Completed` and `Error` produce a line in the output file.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Outcome {
    /// Job completed, line written
    Completed,
    /// Job failed, line written
    Error,
    /// Polling stopped without a final state
    TimedOut(StopReason),
    /// Shutdown interrupted the worker
    Interrupted,
}

/// Format the output file line for a final job state
pub fn outcome_line(item_id: &ItemId, status: JobStatus) -> String {
    format!("{}, {}", item_id, status.as_str())
}

/// Per-outcome counters for one dispatcher run
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Items handed to workers
    pub submitted: usize,
    /// Items that ended `Completed`
    pub completed: usize,
    /// Items that ended `Error`
    pub errored: usize,
    /// Items that hit the per-item deadline
    pub timed_out: usize,
    /// Items stopped after exhausting indeterminate retries
    pub retries_exhausted: usize,
    /// Items interrupted by shutdown (including hard-aborted tasks)
    ///
    /// Never includes an item whose line reached the output: a worker that
    /// started writing is waited for instead of aborted.
    pub interrupted: usize,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// When the last worker was joined
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunSummary {
    /// Empty summary for a run starting now
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            submitted: 0,
            completed: 0,
            errored: 0,
            timed_out: 0,
            retries_exhausted: 0,
            interrupted: 0,
            started_at,
            finished_at: None,
        }
    }

    /// Count one terminal outcome
    pub fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Completed => self.completed += 1,
            Outcome::Error => self.errored += 1,
            Outcome::TimedOut(StopReason::Deadline) => self.timed_out += 1,
            Outcome::TimedOut(StopReason::RetriesExhausted) => self.retries_exhausted += 1,
            Outcome::Interrupted => self.interrupted += 1,
        }
    }

    /// Number of outcomes recorded so far
    pub fn finished(&self) -> usize {
        self.completed + self.errored + self.timed_out + self.retries_exhausted + self.interrupted
    }

    /// Items that never got a line in the output file
    pub fn unresolved(&self) -> usize {
        self.timed_out + self.retries_exhausted + self.interrupted
    }
}

/// Event emitted while polling a batch
///
/// Events are broadcast by the dispatcher; subscribe with
/// [`Dispatcher::subscribe`](crate::Dispatcher::subscribe).
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Worker picked up an item
    ItemStarted {
        /// Item ID
        item_id: ItemId,
    },

    /// One status lookup returned
    StatusPolled {
        /// Item ID
        item_id: ItemId,
        /// 1-based attempt number
        attempt: u32,
        /// `completed`, `error`, `pending` or `indeterminate`
        reading: String,
    },

    /// Indeterminate lookup will be retried
    Retrying {
        /// Item ID
        item_id: ItemId,
        /// Retries used so far, including this one
        retry: u32,
        /// Configured retry cap
        max_retries: u32,
        /// Wait before the next lookup
        next_delay_ms: u64,
    },

    /// Item completed and its line was handed to the sink
    ItemCompleted {
        /// Item ID
        item_id: ItemId,
        /// Number of lookups made
        attempts: u32,
        /// Time since the worker picked up the item
        elapsed_ms: u64,
    },

    /// Item reported a job error and its line was handed to the sink
    ItemFailed {
        /// Item ID
        item_id: ItemId,
        /// Number of lookups made
        attempts: u32,
        /// Time since the worker picked up the item
        elapsed_ms: u64,
    },

    /// Item stopped without a final state (not written to the output)
    ItemTimedOut {
        /// Item ID
        item_id: ItemId,
        /// Deadline or exhausted retries
        reason: StopReason,
        /// Number of lookups made
        attempts: u32,
        /// Time since the worker picked up the item
        elapsed_ms: u64,
    },

    /// Shutdown interrupted the item (not written to the output)
    ItemInterrupted {
        /// Item ID
        item_id: ItemId,
        /// Number of lookups made
        attempts: u32,
        /// Time since the worker picked up the item
        elapsed_ms: u64,
    },

    /// The final line could not be appended to the output
    SinkWriteFailed {
        /// Item ID
        item_id: ItemId,
        /// Error message
        error: String,
    },

    /// Dispatcher joined every worker
    RunFinished {
        /// Final counters
        summary: RunSummary,
    },
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_or_missing_result_reads_as_pending() {
        assert_eq!(JobStatus::from_result(Some("completed")), JobStatus::Completed);
        assert_eq!(JobStatus::from_result(Some("error")), JobStatus::Error);
        assert_eq!(JobStatus::from_result(Some("pending")), JobStatus::Pending);
        assert_eq!(JobStatus::from_result(Some("COMPLETED")), JobStatus::Pending);
        assert_eq!(JobStatus::from_result(Some("queued")), JobStatus::Pending);
        assert_eq!(JobStatus::from_result(None), JobStatus::Pending);
    }

    #[test]
    fn status_response_uses_camel_case_video_id() {
        let body = r#"{"videoId":"abc123","result":"error"}"#;
        let parsed: StatusResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.video_id, "abc123");
        assert_eq!(parsed.status(), JobStatus::Error);

        let encoded = serde_json::to_value(StatusResponse::new("abc123", JobStatus::Pending)).unwrap();
        assert_eq!(encoded["videoId"], "abc123");
        assert_eq!(encoded["result"], "pending");
    }

    #[test]
    fn status_response_without_result_is_pending() {
        let parsed: StatusResponse = serde_json::from_str(r#"{"videoId":"x"}"#).unwrap();
        assert_eq!(parsed.result, None);
        assert_eq!(parsed.status(), JobStatus::Pending);
    }

    #[test]
    fn outcome_line_format() {
        let id = ItemId::from("video1234");
        assert_eq!(outcome_line(&id, JobStatus::Completed), "video1234, completed");
        assert_eq!(outcome_line(&id, JobStatus::Error), "video1234, error");
    }

    #[test]
    fn only_completed_and_error_are_final() {
        assert!(JobStatus::Completed.is_final());
        assert!(JobStatus::Error.is_final());
        assert!(!JobStatus::Pending.is_final());
    }

    #[test]
    fn summary_counts_each_outcome() {
        let mut summary = RunSummary::new(Utc::now());
        summary.record(Outcome::Completed);
        summary.record(Outcome::Completed);
        summary.record(Outcome::Error);
        summary.record(Outcome::TimedOut(StopReason::Deadline));
        summary.record(Outcome::TimedOut(StopReason::RetriesExhausted));
        summary.record(Outcome::Interrupted);

        assert_eq!(summary.completed, 2);
        assert_eq!(summary.errored, 1);
        assert_eq!(summary.timed_out, 1);
        assert_eq!(summary.retries_exhausted, 1);
        assert_eq!(summary.interrupted, 1);
        assert_eq!(summary.finished(), 6);
        assert_eq!(summary.unresolved(), 3);
    }

    #[test]
    fn event_serializes_with_type_tag() {
        let event = Event::ItemTimedOut {
            item_id: ItemId::from("v1"),
            reason: StopReason::RetriesExhausted,
            attempts: 4,
            elapsed_ms: 1500,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "item_timed_out");
        assert_eq!(json["item_id"], "v1");
        assert_eq!(json["reason"], "retries_exhausted");
    }
}
