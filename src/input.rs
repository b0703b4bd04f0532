//! Reading item IDs from the input file.

use crate::error::{Error, Result};
use std::path::Path;

/// Split `contents` into item IDs, one per line.
///
/// Lines are trimmed and blank lines are dropped. Duplicates are kept and
/// polled independently.
pub fn parse_item_ids(contents: &str) -> Vec<String> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Read every item ID from `path`
pub async fn read_item_ids(path: &Path) -> Result<Vec<String>> {
    let contents = match tokio::fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(Error::InputNotFound(path.to_path_buf()));
        }
        Err(e) => return Err(e.into()),
    };

    let ids = parse_item_ids(&contents);
    tracing::debug!(path = %path.display(), count = ids.len(), "Read item IDs");
    Ok(ids)
}
