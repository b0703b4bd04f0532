// status-poller binary
//
// `poll` runs one batch from the input file; `serve-mock` runs the simulated
// status service so a batch can be exercised locally.

use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use video_status_poller::{Config, JobStatusService, cancel_on_signal, mock_server, run_from_config};

#[derive(Parser)]
#[command(name = "status-poller")]
#[command(about = "Poll remote video jobs until they complete or fail")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll every item ID in the input file and record final states
    Poll(PollArgs),

    /// Run the mock job-status service
    ServeMock(ServeMockArgs),
}

#[derive(Args)]
struct PollArgs {
    /// JSON configuration file (defaults apply when omitted)
    #[arg(long, short, env = "STATUS_POLLER_CONFIG")]
    config: Option<PathBuf>,

    /// Input file with one item ID per line
    #[arg(long, short)]
    input: Option<PathBuf>,

    /// Output file receiving "<id>, <status>" lines
    #[arg(long, short)]
    output: Option<PathBuf>,

    /// Status service base URI
    #[arg(long, env = "STATUS_POLLER_BASE_URI")]
    base_uri: Option<String>,
}

#[derive(Args)]
struct ServeMockArgs {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:8080")]
    bind: SocketAddr,

    /// Seconds before a newly seen job reaches its final state
    #[arg(long, default_value = "10")]
    completion_delay_secs: u64,

    /// Probability that a job ends in error
    #[arg(long, default_value = "0.1")]
    error_rate: f64,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "video_status_poller=info,status_poller=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Poll(args) => poll(args).await,
        Commands::ServeMock(args) => serve_mock(args).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "status-poller failed");
            ExitCode::FAILURE
        }
    }
}

async fn poll(args: PollArgs) -> video_status_poller::Result<()> {
    let mut config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    };
    if let Some(input) = args.input {
        config.input_path = input;
    }
    if let Some(output) = args.output {
        config.output_path = output;
    }
    if let Some(base_uri) = args.base_uri {
        config.base_uri = base_uri;
    }

    let shutdown = CancellationToken::new();
    tokio::spawn(cancel_on_signal(shutdown.clone()));

    let summary = run_from_config(&config, shutdown.clone()).await?;
    shutdown.cancel();

    if summary.unresolved() > 0 {
        tracing::warn!(
            unresolved = summary.unresolved(),
            "Some items finished without a final state"
        );
    }
    Ok(())
}

async fn serve_mock(args: ServeMockArgs) -> video_status_poller::Result<()> {
    let service = JobStatusService::new(
        Duration::from_secs(args.completion_delay_secs),
        args.error_rate,
    );
    let listener = TcpListener::bind(args.bind).await?;

    let shutdown = CancellationToken::new();
    tokio::spawn(cancel_on_signal(shutdown.clone()));

    mock_server::serve(listener, service, shutdown).await
}
