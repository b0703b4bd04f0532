//! Wiring a configured run: precondition checks, input, gateway, sink and dispatcher.

use crate::config::Config;
use crate::dispatcher::Dispatcher;
use crate::error::{Error, Result};
use crate::gateway::HttpStatusGateway;
use crate::input::read_item_ids;
use crate::sink::FileResultSink;
use crate::types::RunSummary;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Check the input exists and make sure the output file can be appended to.
///
/// Missing parent directories of `output` are created, and so is `output`
/// itself. Existing output content is left untouched.
pub async fn prepare_paths(input: &Path, output: &Path) -> Result<()> {
    if !tokio::fs::try_exists(input).await? {
        return Err(Error::InputNotFound(input.to_path_buf()));
    }

    if let Some(parent) = output.parent()
        && !parent.as_os_str().is_empty()
    {
        tokio::fs::create_dir_all(parent).await?;
    }

    tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(output)
        .await?;

    tracing::debug!(
        input = %input.display(),
        output = %output.display(),
        "Paths prepared"
    );
    Ok(())
}

/// Poll every item listed in `config.input_path` and append final states to
/// `config.output_path`.
///
/// Cancelling `shutdown` interrupts the run; the returned summary then counts
/// the unfinished items as interrupted.
pub async fn run_from_config(config: &Config, shutdown: CancellationToken) -> Result<RunSummary> {
    config.validate()?;
    prepare_paths(&config.input_path, &config.output_path).await?;

    let item_ids = read_item_ids(&config.input_path).await?;
    let gateway = Arc::new(HttpStatusGateway::from_config(config)?);
    let sink = Arc::new(FileResultSink::open(&config.output_path).await?);

    tracing::info!(
        base_uri = %config.base_uri,
        input = %config.input_path.display(),
        output = %config.output_path.display(),
        items = item_ids.len(),
        "Starting status poll"
    );

    let dispatcher = Dispatcher::new(gateway, sink, config).with_shutdown_token(shutdown);
    Ok(dispatcher.run(item_ids).await)
}
