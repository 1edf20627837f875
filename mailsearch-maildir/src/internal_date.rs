//! Internal-date resolution: stat-based fallback (spec.md §4.5).

use std::path::Path;

use mailsearch_core::SearchError;

/// Returns the file's modification time as UTC seconds. Used as the
/// internal (received) date whenever no cheaper cached value is
/// available — which, in this backend, is always: the on-disk index
/// format never persists it (spec.md §4.8 / §1 "out of scope"), so every
/// call stats the file fresh.
pub async fn resolve(cur_dir: &Path, name: &str) -> Result<i64, SearchError> {
    let meta = tokio::fs::metadata(cur_dir.join(name)).await?;
    let mtime = meta.modified()?;
    let secs = mtime
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0);
    Ok(secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolves_mtime_of_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::write(dir.path().join("1.host"), b"x").await.unwrap();
        let secs = resolve(dir.path(), "1.host").await.unwrap();
        assert!(secs > 0);
    }

    #[tokio::test]
    async fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = resolve(dir.path(), "missing").await.unwrap_err();
        assert!(matches!(err, SearchError::Io(_)));
    }
}
