//! The maildir directory layout: `cur/`, `new/`, `tmp/` under one root
//! (spec.md §6 "Filesystem surface").

use std::path::PathBuf;
use std::time::{Duration, SystemTime};

/// How long a file may sit in `tmp/` before [`Maildir::sweep_tmp`]
/// considers it abandoned by whatever delivery agent created it and
/// removes it — the conventional maildir safe-to-delete threshold.
const STALE_TMP_AGE: Duration = Duration::from_secs(36 * 60 * 60);

/// A maildir rooted at one directory. Doesn't itself hold any message
/// state — [`crate::view::MaildirMailbox`] is the snapshot built on top of
/// it.
#[derive(Debug, Clone)]
pub struct Maildir {
    root: PathBuf,
}

impl Maildir {
    pub fn root(&self) -> &std::path::Path {
        &self.root
    }

    pub fn cur_dir(&self) -> PathBuf {
        self.root.join("cur")
    }

    pub fn new_dir(&self) -> PathBuf {
        self.root.join("new")
    }

    pub fn tmp_dir(&self) -> PathBuf {
        self.root.join("tmp")
    }

    /// Opens an existing maildir rooted at `root`, sweeping `tmp/` of
    /// stale files (spec.md §6: "On open, the tmp/ directory is swept of
    /// stale files, delegated to an external sweeper" — this is that
    /// sweeper).
    pub async fn open(root: impl Into<PathBuf>) -> std::io::Result<Self> {
        let maildir = Maildir { root: root.into() };
        maildir.sweep_tmp().await?;
        Ok(maildir)
    }

    /// Creates `cur/`, `new/` and `tmp/` if they don't already exist, then
    /// opens the result. Useful for tests and first-run setup; a real
    /// deployment normally points at an already-populated maildir.
    pub async fn create(root: impl Into<PathBuf>) -> std::io::Result<Self> {
        let root = root.into();
        for sub in ["cur", "new", "tmp"] {
            tokio::fs::create_dir_all(root.join(sub)).await?;
        }
        Self::open(root).await
    }

    pub async fn sweep_tmp(&self) -> std::io::Result<()> {
        let tmp = self.tmp_dir();
        let mut entries = match tokio::fs::read_dir(&tmp).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e),
        };

        let now = SystemTime::now();
        while let Some(entry) = entries.next_entry().await? {
            let Ok(meta) = entry.metadata().await else {
                continue;
            };
            if !meta.is_file() {
                continue;
            }
            let stale = meta
                .modified()
                .ok()
                .and_then(|m| now.duration_since(m).ok())
                .map(|age| age >= STALE_TMP_AGE)
                .unwrap_or(false);
            if stale {
                if let Err(err) = tokio::fs::remove_file(entry.path()).await {
                    tracing::warn!(err = ?err, path = ?entry.path(), "failed to remove stale tmp file");
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn create_makes_the_three_standard_directories() {
        let dir = tempfile::tempdir().unwrap();
        let maildir = Maildir::create(dir.path()).await.unwrap();
        assert!(maildir.cur_dir().is_dir());
        assert!(maildir.new_dir().is_dir());
        assert!(maildir.tmp_dir().is_dir());
    }

    #[tokio::test]
    async fn sweep_tmp_removes_only_stale_files() {
        let dir = tempfile::tempdir().unwrap();
        let maildir = Maildir::create(dir.path()).await.unwrap();
        let fresh = maildir.tmp_dir().join("fresh.host");
        tokio::fs::write(&fresh, b"x").await.unwrap();

        maildir.sweep_tmp().await.unwrap();
        assert!(fresh.exists());
    }

    #[tokio::test]
    async fn open_on_missing_tmp_dir_does_not_error() {
        let dir = tempfile::tempdir().unwrap();
        tokio::fs::create_dir_all(dir.path().join("cur")).await.unwrap();
        Maildir::open(dir.path()).await.unwrap();
    }
}
