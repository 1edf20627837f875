//! Flag-update rename transaction (spec.md §4.4): a flag change on a
//! maildir backend is a filename rename, and a rename can fail partway
//! through with `ENOSPC` on some filesystems (notably ones low on inodes
//! or quota), which spec.md §7 requires surfacing rather than silently
//! dropping the update.

use mailsearch_core::maildir_flags;
use mailsearch_core::SearchError;
use mailsearch_types::{KeywordSet, SystemFlags};
use std::num::NonZeroU32;

use crate::view::MaildirMailbox;

/// Applies `flags` to the message at sequence number `seq`, renaming its
/// file in `cur/` if the encoded flag string changed. On success the
/// in-memory view is updated to match without a full [`MaildirMailbox::sync`].
pub async fn apply_flags(
    mailbox: &mut MaildirMailbox,
    seq: NonZeroU32,
    flags: (SystemFlags, KeywordSet),
) -> Result<(), SearchError> {
    let idx = seq.get() as usize - 1;
    let old_name = mailbox
        .record(idx)
        .and_then(|r| r.location())
        .ok_or_else(|| SearchError::Corruption("message record has no LOCATION".into()))?
        .to_string();

    let new_name = maildir_flags::encode(&old_name, flags);
    if new_name == old_name {
        mailbox.set_flags_only(idx, flags);
        return Ok(());
    }

    let cur = mailbox.maildir().cur_dir();
    match tokio::fs::rename(cur.join(&old_name), cur.join(&new_name)).await {
        Ok(()) => {
            mailbox.set_location(idx, new_name, flags);
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::StorageFull => {
            mailbox.set_no_disk_space();
            Err(SearchError::NoDiskSpace)
        }
        Err(e) => Err(SearchError::Io(e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::maildir::Maildir;

    #[tokio::test]
    async fn renames_file_when_flags_change() {
        let dir = tempfile::tempdir().unwrap();
        let maildir = Maildir::create(dir.path()).await.unwrap();
        tokio::fs::write(maildir.cur_dir().join("1.host"), b"x").await.unwrap();
        let mut mailbox = MaildirMailbox::open(maildir, Vec::new()).await.unwrap();

        let seq = NonZeroU32::new(1).unwrap();
        let mut system = SystemFlags::EMPTY;
        system = system.with_seen(true);
        apply_flags(&mut mailbox, seq, (system, KeywordSet::empty())).await.unwrap();

        assert_eq!(mailbox.record(0).unwrap().location(), Some("1.host:2,S"));
        assert!(mailbox.record_by_uid(seq).unwrap().flags.seen());
    }

    #[tokio::test]
    async fn no_op_when_flags_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let maildir = Maildir::create(dir.path()).await.unwrap();
        tokio::fs::write(maildir.cur_dir().join("1.host:2,S"), b"x").await.unwrap();
        let mut mailbox = MaildirMailbox::open(maildir, Vec::new()).await.unwrap();

        let seq = NonZeroU32::new(1).unwrap();
        let mut system = SystemFlags::EMPTY;
        system = system.with_seen(true);
        apply_flags(&mut mailbox, seq, (system, KeywordSet::empty())).await.unwrap();

        assert_eq!(mailbox.record(0).unwrap().location(), Some("1.host:2,S"));
    }
}
