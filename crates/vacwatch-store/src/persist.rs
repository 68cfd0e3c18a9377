//! Atomic JSON writes shared by both stores.

use std::path::Path;

use serde::Serialize;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::StoreError;

/// Write `value` as pretty JSON to `path`.
///
/// The content lands in a sibling temp file first and is then renamed over
/// the target, so a crash mid-write never leaves a truncated state file.
pub(crate) async fn write_json_atomic<T: Serialize + ?Sized>(
    path: &Path,
    value: &T,
) -> Result<(), StoreError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).await?;
    }

    let content = serde_json::to_string_pretty(value)?;

    let temp_path = path.with_extension("tmp");
    let mut file = fs::File::create(&temp_path).await?;
    file.write_all(content.as_bytes()).await?;
    file.sync_all().await?;

    fs::rename(&temp_path, path).await?;

    Ok(())
}
