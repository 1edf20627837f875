//! The search predicate tree (spec.md §3).
//!
//! This generalizes the RFC 3501 `SEARCH` grammar the same way Dovecot's
//! internal `mail_search_arg` does: `HEADER_ADDRESS` is a single
//! parameterized leaf rather than four separate `Bcc`/`Cc`/`From`/`To`
//! variants, and `AND`/`OR` are n-ary combinators (`Sub`/`Or`) instead of
//! the binary `And(Vec1<_>)`/`Or(Box, Box)` shape `imap-codec`'s
//! `SearchKey` uses for wire compatibility. Sequence sets are still
//! reused directly from `imap-codec` (`imap_codec::imap_types::sequence`)
//! since that type already matches spec.md §3's "list of (lo,hi)" shape,
//! including the `*` sentinel.
//!
//! Per the redesign note in spec.md §9, the tree is immutable: there is
//! no mutable `result`/`match_always` field on [`Node`]. Per-message
//! ternary state is produced fresh by the evaluator (see
//! `mailsearch-core::evaluate`) rather than mutated in place.

use chrono::NaiveDate;
use imap_codec::imap_types::sequence::SequenceSet;

/// One node of the predicate tree: a `kind` plus whether it is negated.
/// Dovecot's C source carries `negated` as a mutable field toggled by the
/// parser; here it is set once at construction and never mutated.
#[derive(Debug, Clone)]
pub struct Node {
    pub negated: bool,
    pub kind: Predicate,
}

impl Node {
    pub fn new(kind: Predicate) -> Self {
        Self {
            negated: false,
            kind,
        }
    }

    pub fn negated(kind: Predicate) -> Self {
        Self {
            negated: true,
            kind,
        }
    }
}

#[derive(Debug, Clone)]
pub enum Predicate {
    All,

    Answered,
    Seen,
    Deleted,
    Draft,
    Flagged,
    Recent,

    Keyword(String),

    SeqSet(SequenceSet),

    Before(NaiveDate),
    On(NaiveDate),
    Since(NaiveDate),

    SentBefore(NaiveDate),
    SentOn(NaiveDate),
    SentSince(NaiveDate),

    Smaller(u32),
    Larger(u32),

    /// `HEADER(name, needle)` — spec.md §4.2 Tier C, name-qualified.
    Header(String, String),
    /// `HEADER_ADDRESS(name, needle)` — matched against the canonicalized
    /// rendering of the parsed address list, not the raw header bytes.
    HeaderAddress(String, String),
    Body(String),
    /// `TEXT(needle)` — every header value is a candidate (name-agnostic,
    /// spec.md §9 "SEARCH_TEXT" open question), plus the body.
    Text(String),

    /// AND over children.
    Sub(Vec<Node>),
    /// OR over children.
    Or(Vec<Node>),
}

impl Predicate {
    /// True for predicates resolvable purely from [`mailsearch_types::IndexRecord`]
    /// data (Tier A): flags, keyword membership, sequence-set containment.
    pub fn is_index_resolvable(&self) -> bool {
        matches!(
            self,
            Predicate::All
                | Predicate::Answered
                | Predicate::Seen
                | Predicate::Deleted
                | Predicate::Draft
                | Predicate::Flagged
                | Predicate::Recent
                | Predicate::Keyword(_)
                | Predicate::SeqSet(_)
        )
    }

    /// True for predicates resolvable from cached per-message metadata
    /// (Tier B) without streaming the message body.
    pub fn is_cache_resolvable(&self) -> bool {
        matches!(
            self,
            Predicate::Before(_)
                | Predicate::On(_)
                | Predicate::Since(_)
                | Predicate::SentBefore(_)
                | Predicate::SentOn(_)
                | Predicate::SentSince(_)
                | Predicate::Smaller(_)
                | Predicate::Larger(_)
        )
    }

    /// True for predicates that require streaming the header block.
    pub fn needs_headers(&self) -> bool {
        matches!(
            self,
            Predicate::Header(..)
                | Predicate::HeaderAddress(..)
                | Predicate::Text(_)
                | Predicate::SentBefore(_)
                | Predicate::SentOn(_)
                | Predicate::SentSince(_)
        )
    }

    /// True for predicates that require streaming the body.
    pub fn needs_body(&self) -> bool {
        matches!(self, Predicate::Body(_) | Predicate::Text(_))
    }
}

/// Recursively folds `f` over every leaf in the tree (combinators are
/// transparent). Used by static analysis passes (e.g. "does this tree
/// need the body") that must look past `Sub`/`Or` nesting.
pub fn for_each_leaf<'a>(node: &'a Node, f: &mut impl FnMut(&'a Node)) {
    match &node.kind {
        Predicate::Sub(children) | Predicate::Or(children) => {
            for child in children {
                for_each_leaf(child, f);
            }
        }
        _ => f(node),
    }
}
