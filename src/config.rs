//! Configuration types for video-status-poller

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::Path, path::PathBuf, time::Duration};
use url::Url;

/// Polling policy shared by every worker
///
/// Durations are expressed in milliseconds on the wire (`*_ms` keys).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Wait after the first lookup (default: 2000 ms)
    #[serde(
        rename = "initial_polling_interval_ms",
        default = "default_initial_polling_interval",
        with = "duration_ms"
    )]
    pub initial_polling_interval: Duration,

    /// Upper bound for the doubled wait (default: 16000 ms)
    #[serde(
        rename = "max_polling_interval_ms",
        default = "default_max_polling_interval",
        with = "duration_ms"
    )]
    pub max_polling_interval: Duration,

    /// Wall-clock budget per item, measured from the first lookup (default: 180000 ms)
    #[serde(rename = "timeout_ms", default = "default_timeout", with = "duration_ms")]
    pub timeout: Duration,

    /// How many indeterminate lookups are retried before giving up (default: 10)
    ///
    /// Only failed lookups count. A job that keeps answering `pending` is
    /// bounded by [`timeout`](Self::timeout) alone.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Maximum number of items polled at the same time (default: 5)
    #[serde(default = "default_max_parallel_requests")]
    pub max_parallel_requests: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            initial_polling_interval: default_initial_polling_interval(),
            max_polling_interval: default_max_polling_interval(),
            timeout: default_timeout(),
            max_retries: default_max_retries(),
            max_parallel_requests: default_max_parallel_requests(),
        }
    }
}

impl ClientConfig {
    /// Check the invariants the poll worker relies on
    pub fn validate(&self) -> Result<()> {
        if self.initial_polling_interval.is_zero() {
            return Err(Error::config(
                "initial_polling_interval_ms",
                "initial polling interval must be greater than zero",
            ));
        }
        if self.max_polling_interval < self.initial_polling_interval {
            return Err(Error::config(
                "max_polling_interval_ms",
                format!(
                    "max polling interval ({} ms) must not be below the initial interval ({} ms)",
                    self.max_polling_interval.as_millis(),
                    self.initial_polling_interval.as_millis()
                ),
            ));
        }
        if self.timeout.is_zero() {
            return Err(Error::config(
                "timeout_ms",
                "timeout must be greater than zero",
            ));
        }
        if self.max_parallel_requests == 0 {
            return Err(Error::config(
                "max_parallel_requests",
                "max parallel requests must be at least 1",
            ));
        }
        Ok(())
    }
}

/// Main configuration for the status poller
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Base URI of the status service (default: "http://localhost:8080")
    #[serde(default = "default_base_uri")]
    pub base_uri: String,

    /// File with one item ID per line (default: "video_ids.txt")
    #[serde(default = "default_input_path")]
    pub input_path: PathBuf,

    /// File receiving `"<id>, <status>"` lines (default: "video_status.txt")
    #[serde(default = "default_output_path")]
    pub output_path: PathBuf,

    /// Polling policy
    #[serde(default)]
    pub client: ClientConfig,

    /// Timeout of a single status request (default: 10000 ms)
    #[serde(
        rename = "request_timeout_ms",
        default = "default_request_timeout",
        with = "duration_ms"
    )]
    pub request_timeout: Duration,

    /// How long the dispatcher waits for workers once every item is
    /// submitted before it signals cancellation (default: 240000 ms).
    /// Must be at least `client.timeout_ms` or items are interrupted before
    /// their own deadline.
    #[serde(
        rename = "shutdown_grace_period_ms",
        default = "default_shutdown_grace_period",
        with = "duration_ms"
    )]
    pub shutdown_grace_period: Duration,

    /// How long cancelled workers get to exit before their tasks are
    /// aborted (default: 5000 ms)
    #[serde(
        rename = "abort_grace_period_ms",
        default = "default_abort_grace_period",
        with = "duration_ms"
    )]
    pub abort_grace_period: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            base_uri: default_base_uri(),
            input_path: default_input_path(),
            output_path: default_output_path(),
            client: ClientConfig::default(),
            request_timeout: default_request_timeout(),
            shutdown_grace_period: default_shutdown_grace_period(),
            abort_grace_period: default_abort_grace_period(),
        }
    }
}

impl Config {
    /// Parse a JSON document and validate it
    pub fn from_json_str(contents: &str) -> Result<Self> {
        let config: Config = serde_json::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::Config {
            message: format!("failed to read {}: {}", path.display(), e),
            key: None,
        })?;
        let config = Self::from_json_str(&contents)?;
        tracing::debug!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Parsed base URI
    pub fn base_url(&self) -> Result<Url> {
        let url = Url::parse(&self.base_uri)?;
        if !matches!(url.scheme(), "http" | "https") || url.cannot_be_a_base() {
            return Err(Error::config(
                "base_uri",
                format!("base URI must be an http(s) URL, got {}", self.base_uri),
            ));
        }
        Ok(url)
    }

    /// Check every setting
    pub fn validate(&self) -> Result<()> {
        self.client.validate()?;
        self.base_url()?;
        if self.request_timeout.is_zero() {
            return Err(Error::config(
                "request_timeout_ms",
                "request timeout must be greater than zero",
            ));
        }
        if self.shutdown_grace_period < self.client.timeout {
            return Err(Error::config(
                "shutdown_grace_period_ms",
                format!(
                    "shutdown grace period ({} ms) must not be shorter than the per-item timeout ({} ms)",
                    self.shutdown_grace_period.as_millis(),
                    self.client.timeout.as_millis()
                ),
            ));
        }
        Ok(())
    }
}

fn default_initial_polling_interval() -> Duration {
    Duration::from_millis(2_000)
}

fn default_max_polling_interval() -> Duration {
    Duration::from_millis(16_000)
}

fn default_timeout() -> Duration {
    Duration::from_millis(180_000)
}

fn default_max_retries() -> u32 {
    10
}

fn default_max_parallel_requests() -> usize {
    5
}

fn default_base_uri() -> String {
    "http://localhost:8080".to_string()
}

fn default_input_path() -> PathBuf {
    PathBuf::from("video_ids.txt")
}

fn default_output_path() -> PathBuf {
    PathBuf::from("video_status.txt")
}

fn default_request_timeout() -> Duration {
    crate::gateway::DEFAULT_REQUEST_TIMEOUT
}

// per-item timeout plus one capped interval and one request, with headroom
fn default_shutdown_grace_period() -> Duration {
    Duration::from_secs(240)
}

fn default_abort_grace_period() -> Duration {
    Duration::from_secs(5)
}

// Duration <-> integer milliseconds
mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}
