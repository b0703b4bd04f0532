//! Status lookups against the remote job-status service.

use crate::config::Config;
use crate::error::{Error, FetchError, Result};
use crate::types::{ItemId, JobStatus, StatusReading, StatusResponse};
use async_trait::async_trait;
use std::time::Duration;
use url::Url;

/// Timeout of a single status request when none is configured
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Abstraction over one status lookup, enabling testability.
///
/// Implementations never fail: anything that prevents a definite answer is
/// reported as [`StatusReading::Indeterminate`].
#[async_trait]
pub trait StatusGateway: Send + Sync {
    /// Ask the service for the current state of `item_id`
    async fn fetch_status(&self, item_id: &ItemId) -> StatusReading;
}

/// Production [`StatusGateway`] issuing `GET <base>/status/<id>` with reqwest.
#[derive(Clone, Debug)]
pub struct HttpStatusGateway {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpStatusGateway {
    /// Create a gateway for `base_uri` with a per-request timeout
    pub fn new(base_uri: &str, request_timeout: Duration) -> Result<Self> {
        let base_url = Url::parse(base_uri)?;
        if base_url.cannot_be_a_base() {
            return Err(Error::config(
                "base_uri",
                format!("{base_uri} cannot be used as a base URI"),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()?;

        Ok(Self { client, base_url })
    }

    /// Gateway for the configured base URI and request timeout
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(&config.base_uri, config.request_timeout)
    }

    /// Endpoint for one item; the ID is percent-encoded as a single path segment
    pub fn status_url(&self, item_id: &ItemId) -> Url {
        let mut url = self.base_url.clone();
        // cannot_be_a_base URLs are rejected in new()
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push("status").push(item_id.as_str());
        }
        url
    }

    async fn fetch(&self, item_id: &ItemId) -> std::result::Result<JobStatus, FetchError> {
        let response = self.client.get(self.status_url(item_id)).send().await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        let body = response.text().await?;
        let parsed: StatusResponse = serde_json::from_str(&body)?;
        Ok(parsed.status())
    }
}

#[async_trait]
impl StatusGateway for HttpStatusGateway {
    async fn fetch_status(&self, item_id: &ItemId) -> StatusReading {
        match self.fetch(item_id).await {
            Ok(status) => StatusReading::Status(status),
            Err(e) => {
                tracing::warn!(
                    item_id = %item_id,
                    kind = e.kind(),
                    error = %e,
                    "Failed to get job status"
                );
                StatusReading::Indeterminate
            }
        }
    }
}
