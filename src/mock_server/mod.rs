//! Mock job-status service for local runs and integration tests.
//!
//! Serves `GET /status/:video_id` and answers with a [`StatusResponse`]
//! driven by [`JobStatusService`].

use crate::error::Result;
use crate::types::StatusResponse;
use axum::{
    Json, Router,
    extract::{Path, State},
    routing::get,
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

mod service;

pub use service::{DEFAULT_COMPLETION_DELAY, DEFAULT_ERROR_RATE, JobStatusService};

/// Build the mock service router
///
/// ## Endpoints
/// - `GET /status/:video_id` - Current job state, registering unknown IDs as pending
pub fn create_router(service: JobStatusService) -> Router {
    Router::new()
        .route("/status/:video_id", get(get_status))
        .layer(TraceLayer::new_for_http())
        .with_state(service)
}

/// GET /status/:video_id
async fn get_status(
    State(service): State<JobStatusService>,
    Path(video_id): Path<String>,
) -> Json<StatusResponse> {
    let status = service.job_status(&video_id).await;
    Json(StatusResponse::new(video_id, status))
}

/// Serve the mock service on `listener` until `shutdown` is cancelled
pub async fn serve(
    listener: TcpListener,
    service: JobStatusService,
    shutdown: CancellationToken,
) -> Result<()> {
    let address = listener.local_addr()?;
    tracing::info!(address = %address, "Mock status service listening");

    axum::serve(listener, create_router(service))
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await?;

    tracing::info!("Mock status service stopped");
    Ok(())
}
