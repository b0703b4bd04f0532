//! Output destination for final job states.
//!
//! Every worker that sees `completed` or `error` appends exactly one line.
//! Appends are serialized behind an async mutex and flushed to disk before
//! returning, so concurrent workers never interleave partial lines.

use crate::error::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;

/// Append-only destination for output lines
#[async_trait]
pub trait ResultSink: Send + Sync {
    /// Append `line` (without trailing newline) as one complete line
    async fn append(&self, line: &str) -> Result<()>;
}

/// [`ResultSink`] backed by a file opened in append mode
#[derive(Debug)]
pub struct FileResultSink {
    path: PathBuf,
    file: Mutex<tokio::fs::File>,
}

impl FileResultSink {
    /// Open `path` for appending, creating it if absent
    pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;

        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// Path of the output file
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ResultSink for FileResultSink {
    async fn append(&self, line: &str) -> Result<()> {
        let mut record = String::with_capacity(line.len() + 1);
        record.push_str(line);
        record.push('\n');

        let mut file = self.file.lock().await;
        file.write_all(record.as_bytes()).await?;
        file.flush().await?;
        file.sync_data().await?;
        Ok(())
    }
}
