//! Search session: ties the range planner and the three-tier evaluator
//! together into the `init` / `next` / `deinit` lifecycle of spec.md §6.

use std::num::NonZeroU32;

use mailsearch_types::{Charset, KeywordRegistry, Node};

use crate::collab::Collaborators;
use crate::error::SearchError;
use crate::evaluate::{eval_cached, eval_index, eval_text, MatcherArena, TierContext};
use crate::range;
use crate::ternary::Ternary;

/// The only sort program this search core accepts (spec.md §1 non-goal:
/// "the search-sort interface always reports 'no sorting supported'").
/// There is deliberately no other variant to construct — a contract
/// violation described in spec.md §6 is a compile error here, not a
/// runtime check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortProgram {
    #[default]
    NoSort,
}

/// One message `next()` yields: just enough to let the caller fetch
/// whatever it actually wants (flags, envelope, body) through its own
/// collaborator handles. The search core itself never materializes more
/// than the index record it already consulted to produce a match.
#[derive(Debug, Clone, Copy)]
pub struct Mail {
    pub seq: NonZeroU32,
    pub uid: mailsearch_types::ImapUid,
}

/// A live search session over one mailbox snapshot (spec.md §3 "Session
/// state"). Not `Clone`, not shareable across threads (spec.md §5:
/// "not shared across threads") — a plain sequential iterator driven by
/// repeated calls to [`Session::next`].
pub struct Session<'a> {
    collab: Collaborators<'a>,
    charset: Charset,
    root: Node,
    keywords: KeywordRegistry,
    messages_count: u32,
    seq_hi: u32,
    cursor: u32,
    arena: MatcherArena,
    error: Option<SearchError>,
}

impl<'a> Session<'a> {
    /// Plans the sequence window and builds the keyword registry, then
    /// returns a session ready to be driven by [`Session::next`]. A
    /// `sort` other than [`SortProgram::NoSort`] cannot be named — see
    /// the type's doc comment.
    pub async fn init(
        collab: Collaborators<'a>,
        charset: Charset,
        root: Node,
        _sort: SortProgram,
    ) -> Result<Session<'a>, SearchError> {
        let header = collab.mailbox.header().await?;
        let plan = range::plan(&root, &header, collab.mailbox).await?;

        let mut keywords = KeywordRegistry::new();
        for name in collab.mailbox.keyword_names().await {
            keywords.register(&name);
        }

        let (lo, hi) = plan.unwrap_or((1, 0));

        Ok(Session {
            collab,
            charset,
            root,
            keywords,
            messages_count: header.messages_count,
            seq_hi: hi,
            cursor: lo.saturating_sub(1), // next() pre-increments
            arena: MatcherArena::new(),
            error: None,
        })
    }

    /// Pulls the next matching message, in ascending sequence order
    /// (spec.md §5 "Ordering guarantees"). `Ok(None)` means the window is
    /// exhausted; a sticky error set along the way is surfaced by
    /// [`Session::deinit`], not returned here, so messages already found
    /// stay valid (spec.md §7).
    pub async fn next(&mut self) -> Result<Option<Mail>, SearchError> {
        if self.error.is_some() {
            return Ok(None);
        }
        loop {
            self.cursor += 1;
            if self.cursor > self.seq_hi {
                return Ok(None);
            }
            let seq = match NonZeroU32::new(self.cursor) {
                Some(s) => s,
                None => continue,
            };

            let record = match self.collab.mailbox.lookup(seq).await {
                Ok(Some(r)) => r,
                // Expunged mid-session: skip, keep iterating (spec.md §7).
                Ok(None) => continue,
                Err(e) => {
                    self.fail(e);
                    return Ok(None);
                }
            };

            self.arena.begin_message();

            let tier_ctx = TierContext {
                messages_count: self.messages_count,
                seq,
                record: &record,
                uid: record.uid,
                keywords: &self.keywords,
            };

            let a = eval_index(&self.root, tier_ctx).await;
            if a.is_known() {
                if a.accepts_at_root() {
                    return Ok(Some(Mail {
                        seq,
                        uid: record.uid,
                    }));
                }
                continue;
            }

            let b = eval_cached(&self.root, tier_ctx, self.collab.mail).await;
            if b.is_known() {
                if b.accepts_at_root() {
                    return Ok(Some(Mail {
                        seq,
                        uid: record.uid,
                    }));
                }
                continue;
            }

            let c = eval_text(
                &self.root,
                tier_ctx,
                self.collab.mail,
                self.collab.matcher_factory,
                self.collab.body_matcher,
                self.collab.date_parser,
                self.collab.address_parser,
                &self.charset,
                &mut self.arena,
            )
            .await;
            match c {
                Ok(t) if t.accepts_at_root() => {
                    return Ok(Some(Mail {
                        seq,
                        uid: record.uid,
                    }))
                }
                Ok(_) => continue,
                Err(e) => {
                    self.fail(e);
                    return Ok(None);
                }
            }
        }
    }

    fn fail(&mut self, e: SearchError) {
        tracing::error!(err = ?e, "search session failed");
        self.error = Some(e);
    }

    /// Surfaces the sticky error, if any (spec.md §6 "deinit(session) ->
    /// ok | err(text)"). Borrowed resources (the mailbox view, the
    /// per-mail accessor, the matcher arena) are released by ordinary
    /// `Drop` when `self` goes out of scope; no separate teardown step is
    /// required by the type system.
    pub fn deinit(self) -> Result<(), SearchError> {
        match self.error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

#[allow(dead_code)]
fn _assert_ternary_used(_: Ternary) {}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use mailsearch_types::{FieldId, ImapUid, IndexRecord, Predicate, SystemFlags};

    struct FakeMailbox {
        records: Vec<IndexRecord>,
    }

    #[async_trait]
    impl crate::collab::MailboxView for FakeMailbox {
        async fn header(&self) -> Result<crate::collab::MailboxHeader, SearchError> {
            let seen = self.records.iter().filter(|r| r.flags.seen()).count() as u32;
            Ok(crate::collab::MailboxHeader {
                messages_count: self.records.len() as u32,
                seen_messages_count: seen,
                deleted_messages_count: 0,
                first_unseen_uid_lowwater: None,
                first_deleted_uid_lowwater: None,
            })
        }
        async fn lookup(&self, seq: NonZeroU32) -> Result<Option<IndexRecord>, SearchError> {
            Ok(self.records.get(seq.get() as usize - 1).cloned())
        }
        fn lookup_uid_range(
            &self,
            _uid_lo: ImapUid,
            _uid_hi: ImapUid,
        ) -> Option<(NonZeroU32, NonZeroU32)> {
            None
        }
    }

    struct NoMail;
    #[async_trait]
    impl crate::collab::PerMailAccessor for NoMail {
        async fn get_received_date(&self, _uid: ImapUid) -> Option<i64> {
            None
        }
        async fn get_date(&self, _uid: ImapUid) -> Option<(i64, i32)> {
            None
        }
        async fn get_size(&self, _uid: ImapUid) -> Option<u64> {
            None
        }
        async fn get_flags(&self, _uid: ImapUid) -> crate::collab::FullFlags {
            Default::default()
        }
        async fn get_stream(
            &self,
            _uid: ImapUid,
        ) -> Result<(Box<dyn crate::collab::MessageSource>, u64, u64), SearchError> {
            unreachable!()
        }
        async fn get_headers(
            &self,
            _uid: ImapUid,
            _names: &[String],
        ) -> Result<Box<dyn crate::collab::HeaderParser>, SearchError> {
            unreachable!()
        }
    }

    struct NoMatcherFactory;
    impl crate::collab::SubstringMatcherFactory for NoMatcherFactory {
        fn compile(
            &self,
            _needle: &str,
            _charset: &Charset,
        ) -> Result<Box<dyn crate::collab::SubstringMatcher>, SearchError> {
            unreachable!()
        }
    }

    struct NoBodyMatcher;
    #[async_trait]
    impl crate::collab::BodyMatcher for NoBodyMatcher {
        async fn contains(
            &self,
            _uid: ImapUid,
            _body_source: &mut dyn crate::collab::MessageSource,
            _body_size: u64,
            _matcher: &mut dyn crate::collab::SubstringMatcher,
        ) -> Result<bool, SearchError> {
            unreachable!()
        }
    }

    struct NoAddressParser;
    impl crate::collab::AddressParser for NoAddressParser {
        fn parse(&self, _raw: &[u8]) -> Vec<crate::collab::ParsedAddress> {
            unreachable!()
        }
        fn canonicalize(&self, _addrs: &[crate::collab::ParsedAddress]) -> Vec<u8> {
            unreachable!()
        }
    }

    struct NoDateParser;
    impl crate::collab::DateParser for NoDateParser {
        fn parse_imap_date(&self, _s: &str) -> Option<i64> {
            None
        }
        fn parse_header_date(&self, _raw: &[u8]) -> Option<(i64, i32)> {
            None
        }
    }

    fn rec(uid: u32, seen: bool) -> IndexRecord {
        IndexRecord::new(
            NonZeroU32::new(uid).unwrap(),
            SystemFlags::EMPTY.with_seen(seen),
            Default::default(),
        )
        .with_field(FieldId::Location, format!("{uid}.host"))
    }

    #[tokio::test]
    async fn end_to_end_seen_and_range_scenario() {
        // spec.md §8 literal scenario 1: 5 messages, flags [S,S,-,S,-],
        // query `SEEN AND 1:5` -> sequences 1, 2, 4.
        let mailbox = FakeMailbox {
            records: vec![
                rec(1, true),
                rec(2, true),
                rec(3, false),
                rec(4, true),
                rec(5, false),
            ],
        };
        let mail = NoMail;
        let factory = NoMatcherFactory;
        let body_matcher = NoBodyMatcher;
        let address_parser = NoAddressParser;
        let date_parser = NoDateParser;

        let collab = Collaborators {
            mailbox: &mailbox,
            mail: &mail,
            matcher_factory: &factory,
            body_matcher: &body_matcher,
            address_parser: &address_parser,
            date_parser: &date_parser,
        };

        let root = Node::new(Predicate::Sub(vec![
            Node::new(Predicate::Seen),
            Node::new(Predicate::SeqSet(
                mailsearch_types::SequenceSet::try_from("1:5").unwrap(),
            )),
        ]));

        let mut session = Session::init(collab, Charset::from("us-ascii"), root, SortProgram::NoSort)
            .await
            .unwrap();

        let mut got = Vec::new();
        while let Some(m) = session.next().await.unwrap() {
            got.push(m.seq.get());
        }
        assert_eq!(got, vec![1, 2, 4]);
        session.deinit().unwrap();
    }

    #[tokio::test]
    async fn not_seen_over_fully_seen_mailbox_yields_nothing_on_first_call() {
        // spec.md §8 literal scenario 5.
        let mailbox = FakeMailbox {
            records: (1..=10).map(|u| rec(u, true)).collect(),
        };
        let mail = NoMail;
        let factory = NoMatcherFactory;
        let body_matcher = NoBodyMatcher;
        let address_parser = NoAddressParser;
        let date_parser = NoDateParser;

        let collab = Collaborators {
            mailbox: &mailbox,
            mail: &mail,
            matcher_factory: &factory,
            body_matcher: &body_matcher,
            address_parser: &address_parser,
            date_parser: &date_parser,
        };

        let root = Node::new(Predicate::Sub(vec![Node::negated(Predicate::Seen)]));
        let mut session = Session::init(collab, Charset::from("us-ascii"), root, SortProgram::NoSort)
            .await
            .unwrap();
        assert!(session.next().await.unwrap().is_none());
        session.deinit().unwrap();
    }

    #[tokio::test]
    async fn expunged_mid_session_is_skipped_not_errored() {
        struct SparseMailbox;
        #[async_trait]
        impl crate::collab::MailboxView for SparseMailbox {
            async fn header(&self) -> Result<crate::collab::MailboxHeader, SearchError> {
                Ok(crate::collab::MailboxHeader {
                    messages_count: 3,
                    seen_messages_count: 0,
                    deleted_messages_count: 0,
                    first_unseen_uid_lowwater: None,
                    first_deleted_uid_lowwater: None,
                })
            }
            async fn lookup(&self, seq: NonZeroU32) -> Result<Option<IndexRecord>, SearchError> {
                if seq.get() == 2 {
                    return Ok(None);
                }
                Ok(Some(rec(seq.get(), false)))
            }
            fn lookup_uid_range(
                &self,
                _uid_lo: ImapUid,
                _uid_hi: ImapUid,
            ) -> Option<(NonZeroU32, NonZeroU32)> {
                None
            }
        }

        let mailbox = SparseMailbox;
        let mail = NoMail;
        let factory = NoMatcherFactory;
        let body_matcher = NoBodyMatcher;
        let address_parser = NoAddressParser;
        let date_parser = NoDateParser;
        let collab = Collaborators {
            mailbox: &mailbox,
            mail: &mail,
            matcher_factory: &factory,
            body_matcher: &body_matcher,
            address_parser: &address_parser,
            date_parser: &date_parser,
        };

        let root = Node::new(Predicate::All);
        let mut session = Session::init(collab, Charset::from("us-ascii"), root, SortProgram::NoSort)
            .await
            .unwrap();
        let mut got = Vec::new();
        while let Some(m) = session.next().await.unwrap() {
            got.push(m.seq.get());
        }
        assert_eq!(got, vec![1, 3]);
        session.deinit().unwrap();
    }
}
