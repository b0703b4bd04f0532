//! Dispatcher -- fans a batch of item IDs out to bounded poll workers.

use crate::config::{ClientConfig, Config};
use crate::gateway::StatusGateway;
use crate::sink::ResultSink;
use crate::types::{Event, ItemId, Outcome, RunSummary};
use crate::worker::{PollWorker, WriteGate};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Semaphore, broadcast};
use tokio::task::{AbortHandle, JoinSet};
use tokio_util::sync::CancellationToken;

/// Capacity of the event broadcast channel
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Grace periods used when the caller does not supply a full [`Config`]
const DEFAULT_SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(240);
const DEFAULT_ABORT_GRACE_PERIOD: Duration = Duration::from_secs(5);

/// Runs one poll worker per item with at most `max_parallel_requests`
/// workers active at a time.
///
/// Shutdown happens in two phases. Once every item is submitted the
/// dispatcher waits up to the shutdown grace period (or until
/// [`shutdown_token`](Self::shutdown_token) fires), then cancels all
/// workers cooperatively. Workers still running after the abort grace
/// period are aborted. Either way they count as [`Outcome::Interrupted`].
/// A worker that already started writing its final line is never aborted;
/// the dispatcher waits for that write and counts its real outcome.
pub struct Dispatcher {
    worker: PollWorker,
    max_parallel: usize,
    shutdown_grace_period: Duration,
    abort_grace_period: Duration,
    shutdown: CancellationToken,
    event_tx: broadcast::Sender<Event>,
}

impl Dispatcher {
    /// Create a dispatcher using the polling policy and grace periods of `config`
    pub fn new(
        gateway: Arc<dyn StatusGateway>,
        sink: Arc<dyn ResultSink>,
        config: &Config,
    ) -> Self {
        Self::with_client_config(gateway, sink, &config.client)
            .with_grace_periods(config.shutdown_grace_period, config.abort_grace_period)
    }

    /// Create a dispatcher with default grace periods
    pub fn with_client_config(
        gateway: Arc<dyn StatusGateway>,
        sink: Arc<dyn ResultSink>,
        client: &ClientConfig,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let worker = PollWorker::new(gateway, sink, client, event_tx.clone());

        Self {
            worker,
            max_parallel: client.max_parallel_requests.max(1),
            // never cut an item short of its own deadline
            shutdown_grace_period: DEFAULT_SHUTDOWN_GRACE_PERIOD
                .max(client.timeout.saturating_add(client.max_polling_interval)),
            abort_grace_period: DEFAULT_ABORT_GRACE_PERIOD,
            shutdown: CancellationToken::new(),
            event_tx,
        }
    }

    /// Override both grace periods
    pub fn with_grace_periods(mut self, shutdown: Duration, abort: Duration) -> Self {
        self.shutdown_grace_period = shutdown;
        self.abort_grace_period = abort;
        self
    }

    /// Stop runs when `token` is cancelled instead of using a private token
    pub fn with_shutdown_token(mut self, token: CancellationToken) -> Self {
        self.shutdown = token;
        self
    }

    /// Subscribe to worker and run events
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Token that stops the current run when cancelled (e.g. from a signal handler)
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Poll every item to a terminal outcome and return the counters
    ///
    /// Blank IDs are skipped. Ordering of completions is unspecified.
    pub async fn run<I, S>(&self, item_ids: I) -> RunSummary
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut summary = RunSummary::new(Utc::now());
        let limiter = Arc::new(Semaphore::new(self.max_parallel));
        let cancel_token = self.shutdown.child_token();
        let mut tasks: JoinSet<Outcome> = JoinSet::new();
        let mut gates: Vec<(AbortHandle, Arc<WriteGate>)> = Vec::new();

        for raw in item_ids {
            let raw = raw.as_ref().trim();
            if raw.is_empty() {
                continue;
            }
            let item_id = ItemId::from(raw);
            let worker = self.worker.clone();
            let limiter = Arc::clone(&limiter);
            let token = cancel_token.clone();
            let gate = Arc::new(WriteGate::default());
            let task_gate = Arc::clone(&gate);

            let handle = tasks.spawn(async move {
                // Wait for a free slot; shutdown while queued skips the item.
                // The semaphore is never closed, so acquisition only ends early on cancel.
                let _permit = tokio::select! {
                    biased;
                    _ = token.cancelled() => None,
                    permit = limiter.acquire_owned() => permit.ok(),
                };
                worker.run_gated(item_id, token, &task_gate).await
            });
            gates.push((handle, gate));
            summary.submitted += 1;
        }

        tracing::info!(
            submitted = summary.submitted,
            max_parallel = self.max_parallel,
            "All items submitted"
        );

        let finished = tokio::select! {
            _ = drain(&mut tasks, &mut summary) => true,
            _ = tokio::time::sleep(self.shutdown_grace_period) => {
                tracing::warn!(
                    grace_period_ms = u64::try_from(self.shutdown_grace_period.as_millis())
                        .unwrap_or(u64::MAX),
                    remaining = tasks.len(),
                    "Grace period expired, cancelling remaining workers"
                );
                false
            }
            _ = cancel_token.cancelled() => {
                tracing::warn!("Shutdown requested, cancelling remaining workers");
                false
            }
        };

        if !finished {
            cancel_token.cancel();

            let exited =
                tokio::time::timeout(self.abort_grace_period, drain(&mut tasks, &mut summary))
                    .await;
            if exited.is_err() {
                let mut aborted = 0usize;
                for (handle, gate) in &gates {
                    if !handle.is_finished() && gate.close() {
                        handle.abort();
                        aborted += 1;
                    }
                }
                tracing::warn!(
                    remaining = tasks.len(),
                    aborted,
                    "Workers did not stop in time, aborting those not writing output"
                );
                drain(&mut tasks, &mut summary).await;
            }
        }

        summary.finished_at = Some(Utc::now());
        tracing::info!(
            submitted = summary.submitted,
            completed = summary.completed,
            errored = summary.errored,
            timed_out = summary.timed_out,
            retries_exhausted = summary.retries_exhausted,
            interrupted = summary.interrupted,
            "Run finished"
        );
        self.event_tx
            .send(Event::RunFinished {
                summary: summary.clone(),
            })
            .ok();

        summary
    }
}

/// Join workers until the set is empty; cancellation safe
async fn drain(tasks: &mut JoinSet<Outcome>, summary: &mut RunSummary) {
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(outcome) => summary.record(outcome),
            Err(e) => {
                if e.is_panic() {
                    tracing::error!(error = %e, "Poll worker panicked");
                } else {
                    tracing::debug!("Poll worker task aborted");
                }
                summary.record(Outcome::Interrupted);
            }
        }
    }
}
