//! In-memory gateway and sink doubles shared by unit tests.

use crate::error::{Error, Result};
use crate::gateway::StatusGateway;
use crate::sink::ResultSink;
use crate::types::{ItemId, JobStatus, StatusReading};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub(crate) const PENDING: StatusReading = StatusReading::Status(JobStatus::Pending);
pub(crate) const COMPLETED: StatusReading = StatusReading::Status(JobStatus::Completed);
pub(crate) const ERROR: StatusReading = StatusReading::Status(JobStatus::Error);
pub(crate) const INDETERMINATE: StatusReading = StatusReading::Indeterminate;

/// Gateway answering from per-item scripts, falling back to a fixed reading
/// once a script runs out.
pub(crate) struct ScriptedGateway {
    scripts: Mutex<HashMap<ItemId, VecDeque<StatusReading>>>,
    calls: Mutex<HashMap<ItemId, u32>>,
    fallback: StatusReading,
    latency: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl ScriptedGateway {
    pub(crate) fn new(fallback: StatusReading) -> Self {
        Self {
            scripts: Mutex::new(HashMap::new()),
            calls: Mutex::new(HashMap::new()),
            fallback,
            latency: Duration::ZERO,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    pub(crate) fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub(crate) fn script(
        self,
        item_id: &str,
        readings: impl IntoIterator<Item = StatusReading>,
    ) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(ItemId::from(item_id), readings.into_iter().collect());
        self
    }

    pub(crate) fn calls(&self, item_id: &str) -> u32 {
        self.calls
            .lock()
            .unwrap()
            .get(&ItemId::from(item_id))
            .copied()
            .unwrap_or(0)
    }

    pub(crate) fn total_calls(&self) -> u32 {
        self.calls.lock().unwrap().values().sum()
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StatusGateway for ScriptedGateway {
    async fn fetch_status(&self, item_id: &ItemId) -> StatusReading {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        *self.calls.lock().unwrap().entry(item_id.clone()).or_insert(0) += 1;

        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }

        let reading = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(item_id)
            .and_then(VecDeque::pop_front)
            .unwrap_or(self.fallback);

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        reading
    }
}

/// Sink collecting lines in memory
#[derive(Default)]
pub(crate) struct MemorySink {
    lines: Mutex<Vec<String>>,
    latency: Duration,
}

impl MemorySink {
    /// Each append stores its line only after `latency`
    pub(crate) fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub(crate) fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    pub(crate) fn sorted_lines(&self) -> Vec<String> {
        let mut lines = self.lines();
        lines.sort();
        lines
    }
}

#[async_trait]
impl ResultSink for MemorySink {
    async fn append(&self, line: &str) -> Result<()> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.lines.lock().unwrap().push(line.to_string());
        Ok(())
    }
}

/// Sink whose every append fails
pub(crate) struct FailingSink;

#[async_trait]
impl ResultSink for FailingSink {
    async fn append(&self, _line: &str) -> Result<()> {
        Err(Error::Io(std::io::Error::new(
            std::io::ErrorKind::Other,
            "disk full",
        )))
    }
}
