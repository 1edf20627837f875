//! The message index record: the subset of per-mailbox index data the
//! search core is allowed to read (spec.md §3 — "external, read-only to
//! the core").

use std::collections::BTreeMap;
use std::num::NonZeroU32;

use crate::flags::{KeywordSet, SystemFlags};

pub type ImapUid = NonZeroU32;

/// Symbolic keys for fields addressed by [`IndexRecord::field`], mirroring
/// the collaborator contract `lookup_field(record, field_id) -> bytes |
/// none` from spec.md §6. `Location` is the only one the core names
/// explicitly (it needs it to resolve the maildir filename); other field
/// ids are reserved for whatever the real index format wants to carry
/// and are opaque to the core.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FieldId {
    /// Maildir filename, relative to `cur/`.
    Location,
    Other(u32),
}

/// A read-only view of one message's index entry.
#[derive(Debug, Clone)]
pub struct IndexRecord {
    pub uid: ImapUid,
    pub flags: SystemFlags,
    pub keywords: KeywordSet,
    fields: BTreeMap<FieldId, Vec<u8>>,
}

impl IndexRecord {
    pub fn new(uid: ImapUid, flags: SystemFlags, keywords: KeywordSet) -> Self {
        Self {
            uid,
            flags,
            keywords,
            fields: BTreeMap::new(),
        }
    }

    pub fn with_field(mut self, id: FieldId, value: impl Into<Vec<u8>>) -> Self {
        self.fields.insert(id, value.into());
        self
    }

    pub fn field(&self, id: FieldId) -> Option<&[u8]> {
        self.fields.get(&id).map(|v| v.as_slice())
    }

    /// The maildir filename (relative to `cur/`), if present. A record
    /// present in the mailbox header's sequence range but missing this
    /// field signals index corruption (spec.md §4.5 / §7).
    pub fn location(&self) -> Option<&str> {
        self.field(FieldId::Location)
            .and_then(|b| std::str::from_utf8(b).ok())
    }
}
