//! Data model shared between the search core and its backends: the
//! per-message index record, the system/keyword flag bitsets, and the
//! predicate AST that a search session evaluates.

pub mod flags;
pub mod index_record;
pub mod predicate;

pub use flags::{KeywordRegistry, KeywordSet, SystemFlags};
pub use index_record::{FieldId, ImapUid, IndexRecord};
pub use predicate::{for_each_leaf, Node, Predicate};

/// Re-exported so downstream crates don't need to depend on `imap-codec`
/// directly just to build a sequence set.
pub use imap_codec::imap_types::sequence::{SeqOrUid, Sequence, SequenceSet};

/// A charset name as negotiated by the protocol front end (spec.md §6
/// "Substring matcher"). `imap-codec`'s own `Charset<'a>` borrows from
/// the wire buffer it was parsed out of, which the core has no reason to
/// hold onto past session setup — an owned name is all the collaborator
/// contracts need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Charset(pub String);

impl From<&str> for Charset {
    fn from(value: &str) -> Self {
        Charset(value.to_string())
    }
}

impl AsRef<str> for Charset {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
