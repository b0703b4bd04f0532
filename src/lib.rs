//! # video-status-poller
//!
//! Concurrent poller that tracks remote video-processing jobs until each one
//! reaches a final state.
//!
//! For every item ID the poller asks a status service `GET <base>/status/<id>`
//! repeatedly, waiting an exponentially growing interval between lookups.
//! Jobs that end in `completed` or `error` are appended to an output file as
//! `"<id>, <status>"`. Jobs that never settle within the configured timeout,
//! or whose lookups keep failing past the retry budget, are logged and left
//! out of the file.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use video_status_poller::{Config, Dispatcher, FileResultSink, HttpStatusGateway};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!
//!     let gateway = Arc::new(HttpStatusGateway::from_config(&config)?);
//!     let sink = Arc::new(FileResultSink::open(&config.output_path).await?);
//!     let dispatcher = Dispatcher::new(gateway, sink, &config);
//!
//!     // Subscribe to events
//!     let mut events = dispatcher.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let summary = dispatcher.run(["video1", "video2"]).await;
//!     println!("{} completed, {} errored", summary.completed, summary.errored);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

use tokio_util::sync::CancellationToken;

/// Exponential backoff between status lookups
pub mod backoff;
/// Run wiring and precondition checks
pub mod bootstrap;
/// Configuration types
pub mod config;
/// Bounded fan-out of poll workers with two-phase shutdown
pub mod dispatcher;
/// Error types
pub mod error;
/// Status lookups against the remote service
pub mod gateway;
/// Item ID input file
pub mod input;
/// Mock job-status service
pub mod mock_server;
/// Output sink for final states
pub mod sink;
/// Core types and events
pub mod types;
/// Per-item polling state machine
pub mod worker;

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
pub(crate) mod test_helpers;

// Re-export commonly used types
pub use backoff::Backoff;
pub use bootstrap::{prepare_paths, run_from_config};
pub use config::{ClientConfig, Config};
pub use dispatcher::Dispatcher;
pub use error::{Error, FetchError, Result};
pub use gateway::{HttpStatusGateway, StatusGateway};
pub use input::read_item_ids;
pub use mock_server::JobStatusService;
pub use sink::{FileResultSink, ResultSink};
pub use types::{
    Event, ItemId, JobStatus, Outcome, RunSummary, StatusReading, StatusResponse, StopReason,
};
pub use worker::PollWorker;

/// Cancel `token` once the process receives a termination signal.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// Returns early without cancelling if `token` is cancelled elsewhere first.
///
/// # Example
///
/// ```no_run
/// use tokio_util::sync::CancellationToken;
/// use video_status_poller::{Config, cancel_on_signal, run_from_config};
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let shutdown = CancellationToken::new();
///     tokio::spawn(cancel_on_signal(shutdown.clone()));
///
///     let summary = run_from_config(&Config::default(), shutdown).await?;
///     println!("{summary:?}");
///     Ok(())
/// }
/// ```
pub async fn cancel_on_signal(token: CancellationToken) {
    tokio::select! {
        signal = wait_for_signal() => {
            tracing::info!(signal, "Stop requested, interrupting in-flight polls");
            token.cancel();
        }
        _ = token.cancelled() => {}
    }
}

/// Resolves with the name of the first termination signal received
#[cfg(unix)]
async fn wait_for_signal() -> &'static str {
    use tokio::signal::unix::{SignalKind, signal};

    // Either registration can fail in sandboxed environments
    match (
        signal(SignalKind::terminate()),
        signal(SignalKind::interrupt()),
    ) {
        (Ok(mut term), Ok(mut int)) => tokio::select! {
            _ = term.recv() => "SIGTERM",
            _ = int.recv() => "SIGINT",
        },
        (Err(e), Ok(mut int)) => {
            tracing::warn!(error = %e, "SIGTERM unavailable, poll run stops on SIGINT only");
            int.recv().await;
            "SIGINT"
        }
        (Ok(mut term), Err(e)) => {
            tracing::warn!(error = %e, "SIGINT unavailable, poll run stops on SIGTERM only");
            term.recv().await;
            "SIGTERM"
        }
        (Err(e), Err(_)) => {
            tracing::error!(error = %e, "No signal handlers available, falling back to ctrl_c");
            ctrl_c_or_never().await
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() -> &'static str {
    ctrl_c_or_never().await
}

/// A broken ctrl_c listener leaves the run to finish on its own
async fn ctrl_c_or_never() -> &'static str {
    match tokio::signal::ctrl_c().await {
        Ok(()) => "ctrl_c",
        Err(e) => {
            tracing::error!(error = %e, "ctrl_c listener failed, poll run can only end by itself");
            std::future::pending().await
        }
    }
}
