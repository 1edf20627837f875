//! The three-tier predicate cascade (spec.md §4.2).
//!
//! Rather than mutating a `result` field on each tree node across
//! repeated tiered walks (the source's approach, called out as worth
//! redesigning in spec.md §9), evaluation here is one recursive, fully
//! async tree walk per tier. Leaves not yet resolvable at a given tier
//! report [`Ternary::Unknown`] and the tiers differ only in which data
//! sources [`EvalContext`] makes available: Tier A sees only the index
//! record, Tier B additionally sees the cached per-mail accessor, Tier C
//! additionally sees a pre-computed table of stream-derived results for
//! the header/body/sent-date leaves. A message's ternary is therefore
//! recomputed, not patched, at each tier — cheap, since index/cache
//! lookups are idempotent, and it keeps the tree itself immutable.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;

use chrono::{NaiveDate, TimeZone, Utc};
use mailsearch_types::{Charset, ImapUid, IndexRecord, KeywordRegistry, Node, Predicate};

use crate::collab::{
    AddressParser, BodyMatcher, DateParser, MessageSource, PerMailAccessor, SubstringMatcher,
    SubstringMatcherFactory,
};
use crate::error::SearchError;
use crate::range::seq_set_contains;
use crate::ternary::Ternary;

/// Per-leaf compiled matcher cache, owned by the session and threaded
/// through every Tier C call (spec.md §4.2 "Header-search-context
/// caching" / §5 "session exclusively owns a per-message scratch
/// arena"). Keyed by leaf node identity (its address), since the
/// predicate tree is immutable and owned by the caller for the whole
/// session.
#[derive(Default)]
pub struct MatcherArena {
    compiled: HashMap<usize, Box<dyn SubstringMatcher>>,
}

impl MatcherArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resets every compiled matcher ahead of the next message. Matchers
    /// are reset, not freed or recreated (spec.md §4.2).
    pub fn begin_message(&mut self) {
        for m in self.compiled.values_mut() {
            m.reset();
        }
    }

    fn get_or_compile(
        &mut self,
        key: usize,
        needle: &str,
        charset: &Charset,
        factory: &dyn SubstringMatcherFactory,
    ) -> Result<&mut Box<dyn SubstringMatcher>, SearchError> {
        if !self.compiled.contains_key(&key) {
            let compiled = factory.compile(needle, charset)?;
            self.compiled.insert(key, compiled);
        }
        Ok(self.compiled.get_mut(&key).unwrap())
    }
}

fn node_key(node: &Node) -> usize {
    node as *const Node as usize
}

/// Shared evaluation inputs. `mail` is `None` for a pure Tier A walk;
/// `text_results` is `None` until Tier C has streamed the message.
pub struct EvalContext<'a> {
    pub messages_count: u32,
    pub seq: std::num::NonZeroU32,
    pub record: &'a IndexRecord,
    pub uid: ImapUid,
    pub keywords: &'a KeywordRegistry,
    pub mail: Option<&'a dyn PerMailAccessor>,
    pub text_results: Option<&'a HashMap<usize, Ternary>>,
}

fn naive_date_bounds(d: NaiveDate) -> (i64, i64) {
    let start = d.and_hms_opt(0, 0, 0).expect("midnight is always valid");
    let start = Utc.from_utc_datetime(&start).timestamp();
    (start, start + 86_400)
}

/// `SENT*`/`BEFORE`/`ON`/`SINCE` share the same interval comparison;
/// `cached` is already UTC-normalized (spec.md §4.2: "converted to UTC by
/// adding `tz_offset*60` seconds before comparison").
fn date_ternary(kind: &Predicate, when: Option<i64>) -> Ternary {
    let Some(t) = when else {
        return Ternary::Unknown;
    };
    match kind {
        Predicate::Before(d) | Predicate::SentBefore(d) => {
            Ternary::from_bool(t < naive_date_bounds(*d).0)
        }
        Predicate::Since(d) | Predicate::SentSince(d) => {
            Ternary::from_bool(t >= naive_date_bounds(*d).0)
        }
        Predicate::On(d) | Predicate::SentOn(d) => {
            let (lo, hi) = naive_date_bounds(*d);
            Ternary::from_bool(t >= lo && t < hi)
        }
        _ => Ternary::Unknown,
    }
}

fn sent_cached_utc(cached: Option<(i64, i32)>) -> Option<i64> {
    cached.map(|(utc, tz_offset_minutes)| utc + i64::from(tz_offset_minutes) * 60)
}

/// Recursive evaluation, boxed because `async fn` cannot recurse
/// directly. `Sub`/`Or` short-circuit as soon as the fold is definite;
/// `negated` is applied to the node's own result afterward, whatever its
/// kind (spec.md §3: every node, leaf or combinator, carries `negated`).
pub fn eval_node<'a>(
    node: &'a Node,
    ctx: &'a EvalContext<'a>,
) -> Pin<Box<dyn Future<Output = Ternary> + Send + 'a>> {
    Box::pin(async move {
        let t = match &node.kind {
            Predicate::Sub(children) => {
                let mut acc = Ternary::True;
                for child in children {
                    acc = acc.and(eval_node(child, ctx).await);
                    if acc == Ternary::False {
                        break;
                    }
                }
                acc
            }
            Predicate::Or(children) => {
                let mut acc = Ternary::False;
                for child in children {
                    acc = acc.or(eval_node(child, ctx).await);
                    if acc == Ternary::True {
                        break;
                    }
                }
                acc
            }
            kind => eval_leaf(kind, node, ctx).await,
        };
        if node.negated {
            t.not()
        } else {
            t
        }
    })
}

async fn eval_leaf<'a>(kind: &Predicate, node: &'a Node, ctx: &EvalContext<'a>) -> Ternary {
    match kind {
        Predicate::All => Ternary::True,
        Predicate::Answered => Ternary::from_bool(ctx.record.flags.answered()),
        Predicate::Seen => Ternary::from_bool(ctx.record.flags.seen()),
        Predicate::Deleted => Ternary::from_bool(ctx.record.flags.deleted()),
        Predicate::Draft => Ternary::from_bool(ctx.record.flags.draft()),
        Predicate::Flagged => Ternary::from_bool(ctx.record.flags.flagged()),

        // `RECENT` lives in the in-memory full-flags view, not the
        // persisted index record (spec.md §3), so it only resolves once
        // the per-mail accessor is available.
        Predicate::Recent => match ctx.mail {
            Some(mail) => Ternary::from_bool(mail.get_flags(ctx.uid).await.recent),
            None => Ternary::Unknown,
        },

        Predicate::Keyword(name) => match ctx.keywords.lookup(name) {
            Some(bit) => Ternary::from_bool(ctx.record.keywords.contains(bit)),
            None => Ternary::False,
        },

        Predicate::SeqSet(seqset) => {
            Ternary::from_bool(seq_set_contains(seqset, ctx.messages_count, ctx.seq))
        }

        Predicate::Before(_) | Predicate::On(_) | Predicate::Since(_) => match ctx.mail {
            Some(mail) => date_ternary(kind, mail.get_received_date(ctx.uid).await),
            None => Ternary::Unknown,
        },

        Predicate::SentBefore(_) | Predicate::SentOn(_) | Predicate::SentSince(_) => {
            if let Some(results) = ctx.text_results {
                if let Some(t) = results.get(&node_key(node)) {
                    return *t;
                }
            }
            match ctx.mail {
                Some(mail) => date_ternary(kind, sent_cached_utc(mail.get_date(ctx.uid).await)),
                None => Ternary::Unknown,
            }
        }

        Predicate::Smaller(n) => match ctx.mail {
            Some(mail) => match mail.get_size(ctx.uid).await {
                Some(size) => Ternary::from_bool(size < u64::from(*n)),
                None => Ternary::Unknown,
            },
            None => Ternary::Unknown,
        },
        Predicate::Larger(n) => match ctx.mail {
            Some(mail) => match mail.get_size(ctx.uid).await {
                Some(size) => Ternary::from_bool(size > u64::from(*n)),
                None => Ternary::Unknown,
            },
            None => Ternary::Unknown,
        },

        Predicate::Header(..) | Predicate::HeaderAddress(..) | Predicate::Body(_) | Predicate::Text(_) => {
            match ctx.text_results.and_then(|r| r.get(&node_key(node))) {
                Some(t) => *t,
                None => Ternary::Unknown,
            }
        }

        Predicate::Sub(_) | Predicate::Or(_) => unreachable!("combinators handled in eval_node"),
    }
}

/// Tier A: index-only (spec.md §4.2). No collaborator calls at all.
pub async fn eval_index(root: &Node, ctx_base: TierContext<'_>) -> Ternary {
    let ctx = ctx_base.into_eval_context(None, None);
    eval_node(root, &ctx).await
}

/// Tier B: index plus cached per-mail metadata.
pub async fn eval_cached<'a>(
    root: &'a Node,
    ctx_base: TierContext<'a>,
    mail: &'a dyn PerMailAccessor,
) -> Ternary {
    let ctx = ctx_base.into_eval_context(Some(mail), None);
    eval_node(root, &ctx).await
}

/// The fixed, non-keyword-dependent inputs every tier shares.
#[derive(Clone, Copy)]
pub struct TierContext<'a> {
    pub messages_count: u32,
    pub seq: std::num::NonZeroU32,
    pub record: &'a IndexRecord,
    pub uid: ImapUid,
    pub keywords: &'a KeywordRegistry,
}

impl<'a> TierContext<'a> {
    fn into_eval_context(
        self,
        mail: Option<&'a dyn PerMailAccessor>,
        text_results: Option<&'a HashMap<usize, Ternary>>,
    ) -> EvalContext<'a> {
        EvalContext {
            messages_count: self.messages_count,
            seq: self.seq,
            record: self.record,
            uid: self.uid,
            keywords: self.keywords,
            mail,
            text_results,
        }
    }
}

/// Tier C: streams the message once, resolving every header/body/sent-date
/// leaf still outstanding, then folds the whole tree again with those
/// results available (spec.md §4.2 Tier C).
pub async fn eval_text<'a>(
    root: &'a Node,
    ctx_base: TierContext<'a>,
    mail: &'a dyn PerMailAccessor,
    matcher_factory: &dyn SubstringMatcherFactory,
    body_matcher: &dyn BodyMatcher,
    date_parser: &dyn DateParser,
    address_parser: &dyn AddressParser,
    charset: &Charset,
    arena: &mut MatcherArena,
) -> Result<Ternary, SearchError> {
    let text_results = stream_text_leaves(
        root,
        ctx_base.uid,
        mail,
        matcher_factory,
        body_matcher,
        date_parser,
        address_parser,
        charset,
        arena,
    )
    .await?;
    let ctx = ctx_base.into_eval_context(Some(mail), Some(&text_results));
    Ok(eval_node(root, &ctx).await)
}

struct TextLeafSet<'a> {
    /// `Header`/`HeaderAddress` leaves, matched by name against each line.
    named_header: Vec<&'a Node>,
    /// `Text` leaves: matched against every header line, then the body.
    text: Vec<&'a Node>,
    /// `Body` leaves: matched only against the body region.
    body_only: Vec<&'a Node>,
    /// `SENT*` leaves still needing a freshly parsed `Date:` header.
    sent: Vec<&'a Node>,
}

fn collect_text_leaves(root: &Node) -> TextLeafSet<'_> {
    let mut set = TextLeafSet {
        named_header: Vec::new(),
        text: Vec::new(),
        body_only: Vec::new(),
        sent: Vec::new(),
    };
    mailsearch_types::for_each_leaf(root, &mut |leaf| match &leaf.kind {
        Predicate::Header(..) | Predicate::HeaderAddress(..) => set.named_header.push(leaf),
        Predicate::Text(_) => set.text.push(leaf),
        Predicate::Body(_) => set.body_only.push(leaf),
        Predicate::SentBefore(_) | Predicate::SentOn(_) | Predicate::SentSince(_) => {
            set.sent.push(leaf)
        }
        _ => {}
    });
    set
}

#[allow(clippy::too_many_arguments)]
async fn stream_text_leaves<'a>(
    root: &'a Node,
    uid: ImapUid,
    mail: &'a dyn PerMailAccessor,
    matcher_factory: &dyn SubstringMatcherFactory,
    body_matcher: &dyn BodyMatcher,
    date_parser: &dyn DateParser,
    address_parser: &dyn AddressParser,
    charset: &Charset,
    arena: &mut MatcherArena,
) -> Result<HashMap<usize, Ternary>, SearchError> {
    let leaves = collect_text_leaves(root);
    let mut results: HashMap<usize, Ternary> = HashMap::new();

    let needs_headers = !leaves.named_header.is_empty() || !leaves.text.is_empty() || !leaves.sent.is_empty();
    let needs_body = !leaves.text.is_empty() || !leaves.body_only.is_empty();

    if needs_headers {
        let want_all = !leaves.text.is_empty();
        let names: Vec<String> = if want_all {
            Vec::new()
        } else {
            let mut names: Vec<String> = leaves
                .named_header
                .iter()
                .map(|n| match &n.kind {
                    Predicate::Header(name, _) | Predicate::HeaderAddress(name, _) => name.clone(),
                    _ => unreachable!(),
                })
                .collect();
            if !leaves.sent.is_empty() {
                names.push("Date".to_string());
            }
            names
        };

        let mut parser = mail.get_headers(uid, &names).await?;
        while let Some(line) = parser.next_line().await? {
            if !leaves.sent.is_empty() && line.name.eq_ignore_ascii_case("date") {
                if let Some(parsed) = date_parser.parse_header_date(&line.full_value) {
                    for leaf in &leaves.sent {
                        let key = node_key(leaf);
                        if results.contains_key(&key) {
                            continue;
                        }
                        let t = date_ternary(&leaf.kind, sent_cached_utc(Some(parsed)));
                        if t.is_known() {
                            results.insert(key, t);
                        }
                    }
                }
            }

            for leaf in leaves.named_header.iter().chain(leaves.text.iter()) {
                let key = node_key(leaf);
                if matches!(results.get(&key), Some(Ternary::True)) {
                    continue;
                }
                let (target_name, needle) = match &leaf.kind {
                    Predicate::Header(name, needle) => (Some(name.as_str()), needle.as_str()),
                    Predicate::HeaderAddress(name, needle) => (Some(name.as_str()), needle.as_str()),
                    Predicate::Text(needle) => (None, needle.as_str()),
                    _ => continue,
                };
                if let Some(target) = target_name {
                    if !line.name.eq_ignore_ascii_case(target) {
                        continue;
                    }
                }
                let is_address = matches!(leaf.kind, Predicate::HeaderAddress(..));
                let haystack = if is_address {
                    let addrs = address_parser.parse(&line.full_value);
                    address_parser.canonicalize(&addrs)
                } else {
                    line.full_value.clone()
                };
                let matcher = arena.get_or_compile(key, needle, charset, matcher_factory)?;
                if matcher.feed(&haystack) {
                    results.insert(key, Ternary::True);
                }
            }
        }

        for leaf in &leaves.named_header {
            results.entry(node_key(leaf)).or_insert(Ternary::False);
        }
        for leaf in &leaves.sent {
            results.entry(node_key(leaf)).or_insert(Ternary::False);
        }
    }

    if needs_body {
        let (mut source, header_size, body_size) = mail.get_stream(uid).await?;
        for leaf in leaves.body_only.iter().chain(leaves.text.iter()) {
            let key = node_key(leaf);
            if matches!(results.get(&key), Some(Ternary::True)) {
                continue;
            }
            let needle = match &leaf.kind {
                Predicate::Body(n) | Predicate::Text(n) => n.as_str(),
                _ => continue,
            };
            // Re-seek to the start of the body for every leaf: `contains`
            // reads `body_size` bytes forward, so a shared `source` would
            // be left exhausted for whichever leaf runs next.
            tokio::io::AsyncSeekExt::seek(&mut source, std::io::SeekFrom::Start(header_size)).await?;
            let matcher = arena.get_or_compile(key, needle, charset, matcher_factory)?;
            let matched = body_matcher
                .contains(uid, source_as_mut(&mut source), body_size, &mut **matcher)
                .await?;
            results.insert(key, Ternary::from_bool(matched));
        }
    } else {
        for leaf in leaves.body_only.iter().chain(leaves.text.iter()) {
            results.entry(node_key(leaf)).or_insert(Ternary::False);
        }
    }

    Ok(results)
}

fn source_as_mut(source: &mut Box<dyn MessageSource>) -> &mut dyn MessageSource {
    &mut **source
}
