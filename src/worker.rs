//! Poll worker -- drives one item from its first lookup to a terminal outcome.
//!
//! Each iteration:
//! 1. Look up the status
//! 2. `completed`/`error`: append the output line and stop
//! 3. Stop with [`StopReason::Deadline`] once the item's budget is spent
//! 4. Sleep for the current interval (shutdown interrupts the sleep)
//! 5. Advance the backoff
//! 6. After an indeterminate lookup, spend one retry or stop with
//!    [`StopReason::RetriesExhausted`]
//!
//! A `pending` answer never consumes a retry; such items run until the
//! deadline.

use crate::backoff::Backoff;
use crate::config::ClientConfig;
use crate::gateway::StatusGateway;
use crate::sink::ResultSink;
use crate::types::{Event, ItemId, JobStatus, Outcome, StatusReading, StopReason, outcome_line};
use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Mutable polling state of one item, owned by its worker.
#[derive(Debug)]
pub struct PollAttemptState {
    /// Wait before the next lookup
    pub current_interval: Duration,
    /// When the worker picked up the item
    pub started_at: Instant,
    /// Indeterminate lookups retried so far
    pub retry_count: u32,
    /// Lookups made so far
    pub attempts: u32,
}

impl PollAttemptState {
    fn new(initial_interval: Duration) -> Self {
        Self {
            current_interval: initial_interval,
            started_at: Instant::now(),
            retry_count: 0,
            attempts: 0,
        }
    }

    /// Wall-clock time since the item started
    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

/// Decides, exactly once per item, whether the worker writes its line or the
/// dispatcher may abort it.
///
/// A worker that has claimed the write is never aborted, so the output file
/// and the [`RunSummary`](crate::types::RunSummary) agree on every item.
#[derive(Debug, Default)]
pub struct WriteGate(AtomicU8);

const GATE_OPEN: u8 = 0;
const GATE_WRITING: u8 = 1;
const GATE_CLOSED: u8 = 2;

impl WriteGate {
    /// Claim the right to write; false once the gate was closed
    pub fn begin_write(&self) -> bool {
        self.0
            .compare_exchange(GATE_OPEN, GATE_WRITING, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Forbid any later write; false if the worker is already writing
    pub fn close(&self) -> bool {
        self.0
            .compare_exchange(GATE_OPEN, GATE_CLOSED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
            || self.0.load(Ordering::Acquire) == GATE_CLOSED
    }
}

/// Runs the per-item state machine (cloneable - all fields are Arc-wrapped or Copy)
#[derive(Clone)]
pub struct PollWorker {
    gateway: Arc<dyn StatusGateway>,
    sink: Arc<dyn ResultSink>,
    backoff: Backoff,
    timeout: Duration,
    max_retries: u32,
    event_tx: broadcast::Sender<Event>,
}

impl PollWorker {
    /// Create a worker with the given collaborators and polling policy
    pub fn new(
        gateway: Arc<dyn StatusGateway>,
        sink: Arc<dyn ResultSink>,
        config: &ClientConfig,
        event_tx: broadcast::Sender<Event>,
    ) -> Self {
        Self {
            gateway,
            sink,
            backoff: Backoff::from_config(config),
            timeout: config.timeout,
            max_retries: config.max_retries,
            event_tx,
        }
    }

    /// Poll `item_id` until it reaches a terminal outcome
    ///
    /// Never panics or returns early with an error: lookup failures are
    /// retried, sink failures are logged, and cancellation of `cancel_token`
    /// ends the item as [`Outcome::Interrupted`] without writing.
    pub async fn run(&self, item_id: ItemId, cancel_token: CancellationToken) -> Outcome {
        self.run_gated(item_id, cancel_token, &WriteGate::default())
            .await
    }

    /// [`run`](Self::run), writing the final line only if `gate` is still open
    ///
    /// A closed gate turns a final status into [`Outcome::Interrupted`].
    pub async fn run_gated(
        &self,
        item_id: ItemId,
        cancel_token: CancellationToken,
        gate: &WriteGate,
    ) -> Outcome {
        let mut state = PollAttemptState::new(self.backoff.initial());

        if cancel_token.is_cancelled() {
            return self.conclude(&item_id, &state, Outcome::Interrupted);
        }

        tracing::debug!(item_id = %item_id, "Polling started");
        self.event_tx
            .send(Event::ItemStarted {
                item_id: item_id.clone(),
            })
            .ok();

        loop {
            state.attempts += 1;
            let reading = self.gateway.fetch_status(&item_id).await;

            self.event_tx
                .send(Event::StatusPolled {
                    item_id: item_id.clone(),
                    attempt: state.attempts,
                    reading: reading.label().to_string(),
                })
                .ok();

            match reading {
                StatusReading::Status(status) if status.is_final() => {
                    if !gate.begin_write() {
                        return self.conclude(&item_id, &state, Outcome::Interrupted);
                    }
                    self.record(&item_id, status).await;
                    let outcome = if status == JobStatus::Completed {
                        Outcome::Completed
                    } else {
                        Outcome::Error
                    };
                    return self.conclude(&item_id, &state, outcome);
                }
                StatusReading::Status(_) => {
                    tracing::info!(
                        item_id = %item_id,
                        attempt = state.attempts,
                        "Video translation is still pending"
                    );
                }
                StatusReading::Indeterminate => {
                    tracing::debug!(
                        item_id = %item_id,
                        attempt = state.attempts,
                        "Status lookup was indeterminate"
                    );
                }
            }

            if state.elapsed() >= self.timeout {
                return self.conclude(&item_id, &state, Outcome::TimedOut(StopReason::Deadline));
            }

            tokio::select! {
                biased;
                _ = cancel_token.cancelled() => {
                    return self.conclude(&item_id, &state, Outcome::Interrupted);
                }
                _ = tokio::time::sleep(state.current_interval) => {}
            }

            state.current_interval = self.backoff.next(state.current_interval);

            if reading == StatusReading::Indeterminate {
                if state.retry_count < self.max_retries {
                    state.retry_count += 1;
                    tracing::info!(
                        item_id = %item_id,
                        retry = state.retry_count,
                        max_retries = self.max_retries,
                        "Retrying status lookup"
                    );
                    self.event_tx
                        .send(Event::Retrying {
                            item_id: item_id.clone(),
                            retry: state.retry_count,
                            max_retries: self.max_retries,
                            next_delay_ms: u64::try_from(state.current_interval.as_millis())
                                .unwrap_or(u64::MAX),
                        })
                        .ok();
                } else {
                    return self.conclude(
                        &item_id,
                        &state,
                        Outcome::TimedOut(StopReason::RetriesExhausted),
                    );
                }
            }
        }
    }

    /// Append the final line for `status`; failures are reported, not returned
    async fn record(&self, item_id: &ItemId, status: JobStatus) {
        let line = outcome_line(item_id, status);
        match self.sink.append(&line).await {
            Ok(()) => {
                tracing::info!(item_id = %item_id, status = %status, "Final status written");
            }
            Err(e) => {
                tracing::error!(
                    item_id = %item_id,
                    status = %status,
                    error = %e,
                    "Error writing final status to output"
                );
                self.event_tx
                    .send(Event::SinkWriteFailed {
                        item_id: item_id.clone(),
                        error: e.to_string(),
                    })
                    .ok();
            }
        }
    }

    /// Log and broadcast a terminal outcome
    fn conclude(&self, item_id: &ItemId, state: &PollAttemptState, outcome: Outcome) -> Outcome {
        let item_id = item_id.clone();
        let attempts = state.attempts;
        let elapsed_ms = state.elapsed_ms();

        let event = match outcome {
            Outcome::Completed => {
                tracing::info!(item_id = %item_id, attempts, elapsed_ms, "Video translation completed");
                Event::ItemCompleted {
                    item_id,
                    attempts,
                    elapsed_ms,
                }
            }
            Outcome::Error => {
                tracing::warn!(item_id = %item_id, attempts, elapsed_ms, "Video translation reported an error");
                Event::ItemFailed {
                    item_id,
                    attempts,
                    elapsed_ms,
                }
            }
            Outcome::TimedOut(reason) => {
                match reason {
                    StopReason::Deadline => tracing::warn!(
                        item_id = %item_id,
                        attempts,
                        elapsed_ms,
                        "Video translation still pending after max wait time"
                    ),
                    StopReason::RetriesExhausted => tracing::warn!(
                        item_id = %item_id,
                        attempts,
                        elapsed_ms,
                        "Max retries reached"
                    ),
                }
                Event::ItemTimedOut {
                    item_id,
                    reason,
                    attempts,
                    elapsed_ms,
                }
            }
            Outcome::Interrupted => {
                tracing::warn!(item_id = %item_id, attempts, elapsed_ms, "Polling interrupted");
                Event::ItemInterrupted {
                    item_id,
                    attempts,
                    elapsed_ms,
                }
            }
        };

        self.event_tx.send(event).ok();
        outcome
    }
}
