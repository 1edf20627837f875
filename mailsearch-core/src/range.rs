//! Sequence-set range planning (spec.md §4.1).
//!
//! Computes the `[seq_lo, seq_hi]` window a search session iterates,
//! before ever touching an index record: the union of explicit sequence
//! sets and `ALL` nodes, widened to the full mailbox under `OR`, then
//! tightened using `SEEN`/`DELETED` counters and low-water marks at the
//! root only.

use mailsearch_types::{ImapUid, Node, Predicate, SeqOrUid, Sequence, SequenceSet};
use std::num::NonZeroU32;

use crate::collab::{MailboxHeader, MailboxView};
use crate::error::SearchError;

/// Resolves one `SeqOrUid` to a 1-based sequence number, mapping the `*`
/// sentinel to `messages_count` (spec.md §4.1 point 2) and rejecting
/// values above it as a syntax error. `0` cannot occur: `SeqOrUid::Value`
/// is backed by `NonZeroU32`, so the grammar already excludes it.
fn resolve(value: SeqOrUid, messages_count: u32) -> Result<u32, SearchError> {
    match value {
        SeqOrUid::Value(v) => {
            let n = v.get();
            if n > messages_count {
                Err(SearchError::Syntax(format!(
                    "sequence number {n} exceeds mailbox size {messages_count}"
                )))
            } else {
                Ok(n)
            }
        }
        SeqOrUid::Asterisk => Ok(messages_count),
    }
}

/// Inclusive membership test for a single leaf's sequence set (spec.md
/// §4.2 Tier A: "resolvable here by linear scan of its range list").
pub fn seq_set_contains(seqset: &SequenceSet, messages_count: u32, n: NonZeroU32) -> bool {
    let Some(largest) = NonZeroU32::new(messages_count.max(1)) else {
        return false;
    };
    for seq in seqset.0.as_ref() {
        let (lo, hi) = match seq {
            Sequence::Single(a) => {
                let a = a.expand(largest).get();
                (a, a)
            }
            Sequence::Range(a, b) => {
                let a = a.expand(largest).get();
                let b = b.expand(largest).get();
                if a <= b {
                    (a, b)
                } else {
                    (b, a)
                }
            }
        };
        if lo <= n.get() && n.get() <= hi {
            return true;
        }
    }
    false
}

/// Union of a single `SEQSET` node's own ranges, validated against
/// `messages_count`.
fn seq_set_bounds(seqset: &SequenceSet, messages_count: u32) -> Result<(u32, u32), SearchError> {
    let mut acc: Option<(u32, u32)> = None;
    for seq in seqset.0.as_ref() {
        let (lo, hi) = match seq {
            Sequence::Single(a) => {
                let a = resolve(*a, messages_count)?;
                (a, a)
            }
            Sequence::Range(a, b) => {
                let a = resolve(*a, messages_count)?;
                let b = resolve(*b, messages_count)?;
                if a <= b {
                    (a, b)
                } else {
                    (b, a)
                }
            }
        };
        acc = Some(match acc {
            None => (lo, hi),
            Some((alo, ahi)) => (alo.min(lo), ahi.max(hi)),
        });
    }
    acc.ok_or_else(|| SearchError::Syntax("empty sequence set".into()))
}

/// Step 1 of the algorithm: recursively collects the union of explicit
/// ranges from `SEQSET`/`ALL` nodes. `Sub` unions its children; `Or`
/// still recurses (to validate/normalize `*` in its children) but always
/// contributes the full mailbox range.
fn collect_ranges(node: &Node, messages_count: u32) -> Result<Option<(u32, u32)>, SearchError> {
    match &node.kind {
        Predicate::SeqSet(seqset) => Ok(Some(seq_set_bounds(seqset, messages_count)?)),
        Predicate::All => Ok(Some((1, messages_count))),
        Predicate::Sub(children) => {
            let mut acc: Option<(u32, u32)> = None;
            for child in children {
                if let Some((lo, hi)) = collect_ranges(child, messages_count)? {
                    acc = Some(match acc {
                        None => (lo, hi),
                        Some((alo, ahi)) => (alo.min(lo), ahi.max(hi)),
                    });
                }
            }
            Ok(acc)
        }
        Predicate::Or(children) => {
            for child in children {
                collect_ranges(child, messages_count)?;
            }
            Ok(Some((1, messages_count)))
        }
        _ => Ok(None),
    }
}

fn root_children(root: &Node) -> Vec<&Node> {
    match &root.kind {
        Predicate::Sub(children) => children.iter().collect(),
        _ => vec![root],
    }
}

/// Step 4: flag-based tightening at the root level only.
async fn tighten_for_flags(
    root: &Node,
    header: &MailboxHeader,
    view: &dyn MailboxView,
    mut lo: u32,
    hi: u32,
) -> Result<Option<(u32, u32)>, SearchError> {
    for child in root_children(root) {
        match &child.kind {
            Predicate::Seen => {
                if !child.negated {
                    if header.seen_messages_count == 0 {
                        return Ok(None);
                    }
                    // seen_count == messages_count: everything in range matches;
                    // no range change needed (the Tier A leaf check is O(1) anyway).
                } else if header.seen_messages_count == header.messages_count {
                    return Ok(None);
                } else if let Some(uid) = header.first_unseen_uid_lowwater {
                    lo = lo.max(raise_lo(view, uid, hi)?);
                }
            }
            Predicate::Deleted => {
                if !child.negated {
                    if header.deleted_messages_count == 0 {
                        return Ok(None);
                    }
                } else if header.deleted_messages_count == header.messages_count {
                    return Ok(None);
                } else if let Some(uid) = header.first_deleted_uid_lowwater {
                    lo = lo.max(raise_lo(view, uid, hi)?);
                }
            }
            _ => {}
        }
    }
    if lo > hi {
        Ok(None)
    } else {
        Ok(Some((lo, hi)))
    }
}

fn raise_lo(view: &dyn MailboxView, low_water_uid: ImapUid, hi: u32) -> Result<u32, SearchError> {
    let top = NonZeroU32::new(u32::MAX).expect("u32::MAX is nonzero");
    match view.lookup_uid_range(low_water_uid, top) {
        Some((seq_lo, _)) => Ok(seq_lo.get().min(hi.max(1))),
        // No message at or above the low-water UID currently exists; nothing
        // to tighten against, leave `lo` as-is.
        None => Ok(1),
    }
}

/// Plans the sequence window a session will iterate. `Ok(None)` means the
/// window is empty (the session yields no messages without ever touching
/// an index record).
pub async fn plan(
    root: &Node,
    header: &MailboxHeader,
    view: &dyn MailboxView,
) -> Result<Option<(u32, u32)>, SearchError> {
    let messages_count = header.messages_count;
    if messages_count == 0 {
        return Ok(None);
    }

    let (lo, hi) = collect_ranges(root, messages_count)?.unwrap_or((1, messages_count));
    if lo > hi {
        return Ok(None);
    }

    tighten_for_flags(root, header, view, lo, hi).await
}
