//! The `MailboxView` implementation: an in-memory snapshot of one `cur/`
//! directory listing, recomputed from scratch by [`MaildirMailbox::sync`]
//! (spec.md §4.8 — no persistent index file, the on-disk index format
//! being out of scope per spec.md §1).

use std::num::NonZeroU32;

use async_trait::async_trait;
use mailsearch_core::collab::{MailboxHeader, MailboxView};
use mailsearch_core::maildir_flags;
use mailsearch_core::SearchError;
use mailsearch_types::{FieldId, ImapUid, IndexRecord, KeywordSet, SystemFlags};

use crate::maildir::Maildir;

/// A live maildir-backed mailbox. UID and sequence number coincide in this
/// backend: messages are ordered by the ASCII order of their
/// flag-independent base filename (see [`maildir_flags::base_name`]), a
/// order a flag-only rename never disturbs, so re-running [`Self::sync`]
/// after a flag change keeps every untouched message's UID stable. A
/// persistent UID-validity file (the kind `dovecot-uidlist` provides) is
/// out of scope here, same as the rest of the on-disk index format —
/// recomputing fresh from the directory listing is what spec.md §4.8
/// calls for.
pub struct MaildirMailbox {
    maildir: Maildir,
    records: Vec<IndexRecord>,
    header: MailboxHeader,
    keyword_names: Vec<String>,
    no_disk_space: bool,
}

fn recompute_header(records: &[IndexRecord]) -> MailboxHeader {
    let mut seen_count = 0u32;
    let mut deleted_count = 0u32;
    let mut first_unseen: Option<ImapUid> = None;
    let mut first_deleted: Option<ImapUid> = None;

    for record in records {
        if record.flags.seen() {
            seen_count += 1;
        } else if first_unseen.is_none() {
            first_unseen = Some(record.uid);
        }
        if record.flags.deleted() {
            deleted_count += 1;
            if first_deleted.is_none() {
                first_deleted = Some(record.uid);
            }
        }
    }

    MailboxHeader {
        messages_count: records.len() as u32,
        seen_messages_count: seen_count,
        deleted_messages_count: deleted_count,
        first_unseen_uid_lowwater: first_unseen,
        first_deleted_uid_lowwater: first_deleted,
    }
}

impl MaildirMailbox {
    /// Opens `maildir`, performing an initial [`Self::sync`].
    pub async fn open(maildir: Maildir, keyword_names: Vec<String>) -> Result<Self, SearchError> {
        let mut mailbox = MaildirMailbox {
            maildir,
            records: Vec::new(),
            header: recompute_header(&[]),
            keyword_names,
            no_disk_space: false,
        };
        mailbox.sync().await?;
        Ok(mailbox)
    }

    /// Rescans `cur/`, rebuilding every counter and low-water mark this
    /// view reports (spec.md §4.8).
    pub async fn sync(&mut self) -> Result<(), SearchError> {
        let cur = self.maildir.cur_dir();
        let mut dir = tokio::fs::read_dir(&cur).await?;
        let mut names = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            if let Ok(name) = entry.file_name().into_string() {
                names.push(name);
            }
        }
        names.sort_by(|a, b| maildir_flags::base_name(a).cmp(maildir_flags::base_name(b)));

        let records = names
            .into_iter()
            .enumerate()
            .map(|(idx, name)| {
                let uid = ImapUid::new(idx as u32 + 1).expect("idx + 1 is never zero");
                let (system, keywords) =
                    maildir_flags::decode(&name, (SystemFlags::EMPTY, KeywordSet::empty()));
                IndexRecord::new(uid, system, keywords).with_field(FieldId::Location, name)
            })
            .collect::<Vec<_>>();

        self.header = recompute_header(&records);
        self.records = records;
        Ok(())
    }

    pub fn maildir(&self) -> &Maildir {
        &self.maildir
    }

    pub fn record(&self, idx: usize) -> Option<&IndexRecord> {
        self.records.get(idx)
    }

    pub fn record_by_uid(&self, uid: ImapUid) -> Option<&IndexRecord> {
        self.records.get(uid.get() as usize - 1)
    }

    /// Sticky flag set by [`crate::flagtx::apply_flags`] on `ENOSPC`
    /// (spec.md §4.4 / §7).
    pub fn no_disk_space(&self) -> bool {
        self.no_disk_space
    }

    pub(crate) fn set_no_disk_space(&mut self) {
        self.no_disk_space = true;
    }

    /// Updates the `idx`-th record's flags and `LOCATION` field after a
    /// successful rename, then recomputes the header counters.
    pub(crate) fn set_location(&mut self, idx: usize, new_name: String, flags: (SystemFlags, KeywordSet)) {
        if let Some(record) = self.records.get_mut(idx) {
            let uid = record.uid;
            *record = IndexRecord::new(uid, flags.0, flags.1).with_field(FieldId::Location, new_name);
        }
        self.header = recompute_header(&self.records);
    }

    /// Updates the `idx`-th record's flags in place, keeping its existing
    /// `LOCATION` (the encoded filename didn't change).
    pub(crate) fn set_flags_only(&mut self, idx: usize, flags: (SystemFlags, KeywordSet)) {
        if let Some(record) = self.records.get_mut(idx) {
            let uid = record.uid;
            let location = record.location().map(str::to_string);
            let mut updated = IndexRecord::new(uid, flags.0, flags.1);
            if let Some(location) = location {
                updated = updated.with_field(FieldId::Location, location);
            }
            *record = updated;
        }
        self.header = recompute_header(&self.records);
    }
}

#[async_trait]
impl MailboxView for MaildirMailbox {
    async fn header(&self) -> Result<MailboxHeader, SearchError> {
        Ok(self.header)
    }

    async fn lookup(&self, seq: NonZeroU32) -> Result<Option<IndexRecord>, SearchError> {
        Ok(self.records.get(seq.get() as usize - 1).cloned())
    }

    fn lookup_uid_range(&self, uid_lo: ImapUid, uid_hi: ImapUid) -> Option<(NonZeroU32, NonZeroU32)> {
        let count = self.records.len() as u32;
        if count == 0 {
            return None;
        }
        let lo = uid_lo.get().max(1);
        let hi = uid_hi.get().min(count);
        if lo > hi {
            None
        } else {
            Some((NonZeroU32::new(lo).unwrap(), NonZeroU32::new(hi).unwrap()))
        }
    }

    async fn keyword_names(&self) -> Vec<String> {
        self.keyword_names.clone()
    }
}
