//! Common utilities for the video-status-poller integration tests

use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use video_status_poller::{ClientConfig, Config, Event, JobStatusService, mock_server};

/// A mock status service running on an ephemeral local port
pub struct RunningService {
    pub address: SocketAddr,
    pub service: JobStatusService,
    shutdown: CancellationToken,
    handle: JoinHandle<video_status_poller::Result<()>>,
}

impl RunningService {
    pub fn base_uri(&self) -> String {
        format!("http://{}", self.address)
    }

    pub async fn stop(self) {
        self.shutdown.cancel();
        let _ = tokio::time::timeout(Duration::from_secs(5), self.handle).await;
    }
}

/// Bind the mock service on 127.0.0.1:0 and serve it in the background
pub async fn start_service(completion_delay: Duration, error_rate: f64) -> RunningService {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let address = listener.local_addr().expect("local address");
    let service = JobStatusService::new(completion_delay, error_rate);
    let shutdown = CancellationToken::new();
    let handle = tokio::spawn(mock_server::serve(
        listener,
        service.clone(),
        shutdown.clone(),
    ));

    RunningService {
        address,
        service,
        shutdown,
        handle,
    }
}

/// Fast polling policy suitable for sub-second test runs
pub fn fast_client(timeout: Duration, max_parallel_requests: usize) -> ClientConfig {
    ClientConfig {
        initial_polling_interval: Duration::from_millis(50),
        max_polling_interval: Duration::from_millis(200),
        timeout,
        max_retries: 3,
        max_parallel_requests,
    }
}

/// Config pointing at `base_uri` with input and output inside `dir`
pub fn config_in(dir: &Path, base_uri: String, client: ClientConfig) -> Config {
    let shutdown_grace_period = client.timeout + Duration::from_secs(30);
    Config {
        base_uri,
        input_path: dir.join("video_ids.txt"),
        output_path: dir.join("out").join("video_status.txt"),
        client,
        request_timeout: Duration::from_secs(2),
        shutdown_grace_period,
        abort_grace_period: Duration::from_secs(1),
    }
}

/// Output file lines, sorted
pub fn sorted_lines(path: &Path) -> Vec<String> {
    let contents = std::fs::read_to_string(path).expect("read output file");
    let mut lines: Vec<String> = contents.lines().map(str::to_string).collect();
    lines.sort();
    lines
}

/// Drain every event already buffered in `events`
pub fn drain_events(events: &mut tokio::sync::broadcast::Receiver<Event>) -> Vec<Event> {
    let mut collected = Vec::new();
    while let Ok(event) = events.try_recv() {
        collected.push(event);
    }
    collected
}
