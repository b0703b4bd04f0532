//! Exponential backoff between status lookups
//!
//! Waits start at the configured initial interval and double after every
//! lookup that did not reach a final state, capped at the maximum interval.
//! There is no jitter: the schedule is fully deterministic.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use video_status_poller::backoff::Backoff;
//!
//! let backoff = Backoff::new(Duration::from_millis(100), Duration::from_millis(1000));
//! let waits: Vec<_> = backoff.schedule().take(6).map(|d| d.as_millis()).collect();
//! assert_eq!(waits, vec![100, 200, 400, 800, 1000, 1000]);
//! ```

use crate::config::ClientConfig;
use std::time::Duration;

/// Doubling backoff capped at a maximum interval
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
}

impl Backoff {
    /// Create a backoff policy
    ///
    /// `max` is raised to `initial` if it is smaller, so the first wait is
    /// always the initial interval.
    pub fn new(initial: Duration, max: Duration) -> Self {
        Self {
            initial,
            max: max.max(initial),
        }
    }

    /// Policy from the polling section of the configuration
    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.initial_polling_interval, config.max_polling_interval)
    }

    /// First wait
    pub fn initial(&self) -> Duration {
        self.initial
    }

    /// Largest wait
    pub fn max(&self) -> Duration {
        self.max
    }

    /// Wait that follows `current`: `min(current * 2, max)`
    pub fn next(&self, current: Duration) -> Duration {
        current.saturating_mul(2).min(self.max)
    }

    /// Infinite sequence of waits starting at the initial interval
    pub fn schedule(&self) -> impl Iterator<Item = Duration> + '_ {
        std::iter::successors(Some(self.initial), move |current| Some(self.next(*current)))
    }
}
