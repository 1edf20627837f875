//! Collaborator contracts the search core consumes (spec.md §6). Every
//! trait here stands in for a subsystem spec.md §1 declares out of
//! scope: the on-disk index format, the MIME parser, the charset-aware
//! substring matcher, the IMAP date parser, the address parser. The core
//! only ever calls through these traits; `mailsearch-maildir` is the one
//! concrete implementation in this repository.

use async_trait::async_trait;
use mailsearch_types::{Charset, FieldId, ImapUid, IndexRecord, KeywordSet, SystemFlags};
use std::num::NonZeroU32;

use crate::error::SearchError;

pub use FieldId as MailboxFieldId;

/// Mailbox-wide counters consumed by the range planner (spec.md §4.1).
#[derive(Debug, Clone, Copy)]
pub struct MailboxHeader {
    pub messages_count: u32,
    pub seen_messages_count: u32,
    pub deleted_messages_count: u32,
    pub first_unseen_uid_lowwater: Option<ImapUid>,
    pub first_deleted_uid_lowwater: Option<ImapUid>,
}

/// A snapshot of a mailbox's message list, providing the three
/// operations the core needs: header counters, per-sequence record
/// lookup, and UID-range-to-sequence-range resolution for low-water mark
/// tightening.
#[async_trait]
pub trait MailboxView: Send + Sync {
    async fn header(&self) -> Result<MailboxHeader, SearchError>;

    /// `None` means the sequence is out of range or was expunged
    /// mid-session (spec.md §7 "expunged mid-session").
    async fn lookup(&self, seq: NonZeroU32) -> Result<Option<IndexRecord>, SearchError>;

    /// Resolves a UID range to the sequence-number range it currently
    /// occupies in this snapshot. `None` if no message in `[uid_lo,
    /// uid_hi]` is present.
    fn lookup_uid_range(
        &self,
        uid_lo: ImapUid,
        uid_hi: ImapUid,
    ) -> Option<(NonZeroU32, NonZeroU32)>;

    /// Every keyword name currently registered on the mailbox, used once
    /// per session to build the `KeywordRegistry` the evaluator consults
    /// for `Predicate::Keyword` leaves (spec.md §9 "Keyword lookup").
    /// Defaulted to empty so a backend with no custom flags (or a test
    /// double exercising only flag/sequence predicates) doesn't need to
    /// implement it.
    async fn keyword_names(&self) -> Vec<String> {
        Vec::new()
    }
}

/// The in-memory full-flags view a mail carries, including `\Recent`
/// (spec.md §3: "`RECENT` is derived from the in-memory full-flags view,
/// not the persisted record").
#[derive(Debug, Clone, Copy, Default)]
pub struct FullFlags {
    pub system: SystemFlags,
    pub recent: bool,
    pub keywords: KeywordSet,
}

/// A byte stream over (part of) a message's physical bytes. Async
/// because backends may be reading from disk, network storage, or
/// anywhere else.
pub trait MessageSource: tokio::io::AsyncRead + tokio::io::AsyncSeek + Send + Unpin {}
impl<T: tokio::io::AsyncRead + tokio::io::AsyncSeek + Send + Unpin> MessageSource for T {}

/// One parsed header line, as produced by the external header parser's
/// callback (spec.md §6): `{name, value, full_value, continues, eoh,
/// use_full_value}`. Owned rather than borrowed, so a `HeaderParser`
/// trait object can return it without fighting the borrow checker across
/// `.await` points.
#[derive(Debug, Clone)]
pub struct HeaderLine {
    pub name: String,
    pub value: Vec<u8>,
    /// The value with continuation lines already joined, populated only
    /// when `use_full_value` was requested for this header name.
    pub full_value: Vec<u8>,
    pub continues: bool,
    pub eoh: bool,
    pub use_full_value: bool,
}

/// Pull-style replacement for the original callback-driven header parser
/// (spec.md §9 design note: "re-express as a visitor ... a pull-style
/// iterator over parsed header lines is equivalent").
#[async_trait]
pub trait HeaderParser: Send {
    async fn next_line(&mut self) -> Result<Option<HeaderLine>, SearchError>;
}

/// Per-message metadata and content access (spec.md §6 "Per-mail
/// accessor").
#[async_trait]
pub trait PerMailAccessor: Send + Sync {
    /// Cached received (internal) date, UTC seconds. `None` = unavailable
    /// (leaf stays `UNKNOWN`, spec.md §4.2 Tier B).
    async fn get_received_date(&self, uid: ImapUid) -> Option<i64>;

    /// Cached sent date from a parsed `Date:` header: `(utc_seconds,
    /// tz_offset_minutes)`. `None` = unavailable (falls through to Tier
    /// C, which parses the header directly while streaming).
    async fn get_date(&self, uid: ImapUid) -> Option<(i64, i32)>;

    /// Cached virtual message size in octets.
    async fn get_size(&self, uid: ImapUid) -> Option<u64>;

    async fn get_flags(&self, uid: ImapUid) -> FullFlags;

    /// Opens the full message stream, returning `(source, header_size,
    /// body_size)` in physical bytes, so Tier C can seek past the header
    /// block (spec.md §4.2 Tier C step 4).
    async fn get_stream(
        &self,
        uid: ImapUid,
    ) -> Result<(Box<dyn MessageSource>, u64, u64), SearchError>;

    /// Opens a header-only stream restricted to `names` (empty = all
    /// headers), per spec.md §4.2 Tier C step 1.
    async fn get_headers(
        &self,
        uid: ImapUid,
        names: &[String],
    ) -> Result<Box<dyn HeaderParser>, SearchError>;
}

/// A compiled substring matcher (spec.md §6 "Substring matcher"). One
/// instance is created per leaf per session and reset (not recreated)
/// between messages.
pub trait SubstringMatcher: Send {
    /// Feeds one haystack (a header value, or a chunk of decoded body
    /// text) to the matcher. Returns whether a match was found.
    fn feed(&mut self, haystack: &[u8]) -> bool;
    fn reset(&mut self);
}

/// Compiles [`SubstringMatcher`]s for a charset. `Err` distinguishes
/// charset rejection from needle rejection, per spec.md §4.2
/// "Header-search-context caching".
pub trait SubstringMatcherFactory: Send + Sync {
    fn compile(&self, needle: &str, charset: &Charset) -> Result<Box<dyn SubstringMatcher>, SearchError>;
}

/// The MIME-aware body matcher: given the body region of a message's
/// physical bytes, decides whether a compiled matcher finds its needle
/// anywhere in the decoded text parts. The MIME parser itself (spec.md
/// §1 non-goal) lives entirely inside the implementation of this trait.
#[async_trait]
pub trait BodyMatcher: Send + Sync {
    async fn contains(
        &self,
        uid: ImapUid,
        body_source: &mut dyn MessageSource,
        body_size: u64,
        matcher: &mut dyn SubstringMatcher,
    ) -> Result<bool, SearchError>;
}

/// A parsed RFC-2822 address (spec.md §6 "Address parser").
#[derive(Debug, Clone, Default)]
pub struct ParsedAddress {
    pub display_name: Option<String>,
    pub mailbox: Option<String>,
    pub host: Option<String>,
}

pub trait AddressParser: Send + Sync {
    fn parse(&self, raw: &[u8]) -> Vec<ParsedAddress>;
    /// Canonicalized rendering used for `HEADER_ADDRESS` matching, so
    /// folding whitespace and RFC-2822 comment syntax never spuriously
    /// match (spec.md §4.2 Tier C step 2).
    fn canonicalize(&self, addrs: &[ParsedAddress]) -> Vec<u8>;
}

/// IMAP date parsing (spec.md §6 "Date parser").
pub trait DateParser: Send + Sync {
    /// `"DD-Mon-YYYY"` → UTC seconds at midnight.
    fn parse_imap_date(&self, s: &str) -> Option<i64>;
    /// RFC-2822 header date → `(utc_seconds, tz_offset_minutes)`.
    fn parse_header_date(&self, raw: &[u8]) -> Option<(i64, i32)>;
}

/// The bundle of collaborators a [`crate::session::Session`] is
/// constructed with (spec.md §5 "Shared resources" / §6 "Session API").
pub struct Collaborators<'a> {
    pub mailbox: &'a dyn MailboxView,
    pub mail: &'a dyn PerMailAccessor,
    pub matcher_factory: &'a dyn SubstringMatcherFactory,
    pub body_matcher: &'a dyn BodyMatcher,
    pub address_parser: &'a dyn AddressParser,
    pub date_parser: &'a dyn DateParser,
}
