//! Builds a [`Node`] predicate tree directly from command-line flags.
//!
//! Wire-protocol `SEARCH` grammar parsing is explicitly out of scope
//! (spec.md §1 non-goal: "No IMAP wire protocol parsing"), so this is not
//! a grammar — just a fixed set of CLI flags, each contributing one leaf,
//! ANDed together under one [`Predicate::Sub`].

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::Args;
use mailsearch_types::{Node, Predicate, SequenceSet};

#[derive(Args, Debug)]
pub struct QueryArgs {
    /// Match only messages with \Seen set.
    #[clap(long)]
    pub seen: bool,
    /// Match only messages without \Seen set.
    #[clap(long)]
    pub unseen: bool,
    /// Match only messages with \Deleted set.
    #[clap(long)]
    pub deleted: bool,
    /// Match only messages with \Flagged set.
    #[clap(long)]
    pub flagged: bool,
    /// Match only messages with \Draft set.
    #[clap(long)]
    pub draft: bool,
    /// Match only messages with \Answered set.
    #[clap(long)]
    pub answered: bool,

    /// Match messages carrying this keyword flag (repeatable).
    #[clap(long = "keyword")]
    pub keywords: Vec<String>,

    /// Restrict to this IMAP sequence set, e.g. "1:5,8".
    #[clap(long = "seq")]
    pub seq_set: Option<String>,

    /// `HEADER(name, needle)`, as "Name:needle" (repeatable).
    #[clap(long = "header")]
    pub headers: Vec<String>,
    /// `HEADER_ADDRESS(name, needle)`, as "Name:needle" (repeatable).
    #[clap(long = "header-address")]
    pub header_addresses: Vec<String>,
    /// `BODY(needle)`.
    #[clap(long)]
    pub body: Option<String>,
    /// `TEXT(needle)`.
    #[clap(long)]
    pub text: Option<String>,

    /// Internal date strictly before "YYYY-MM-DD".
    #[clap(long)]
    pub before: Option<String>,
    /// Internal date equal to "YYYY-MM-DD".
    #[clap(long)]
    pub on: Option<String>,
    /// Internal date on or after "YYYY-MM-DD".
    #[clap(long)]
    pub since: Option<String>,
    /// `Date:` header strictly before "YYYY-MM-DD".
    #[clap(long = "sent-before")]
    pub sent_before: Option<String>,
    /// `Date:` header equal to "YYYY-MM-DD".
    #[clap(long = "sent-on")]
    pub sent_on: Option<String>,
    /// `Date:` header on or after "YYYY-MM-DD".
    #[clap(long = "sent-since")]
    pub sent_since: Option<String>,

    /// Virtual size strictly smaller than N octets.
    #[clap(long)]
    pub smaller: Option<u32>,
    /// Virtual size strictly larger than N octets.
    #[clap(long)]
    pub larger: Option<u32>,
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("invalid date {s:?}, expected YYYY-MM-DD"))
}

fn split_header_arg(raw: &str) -> Result<(String, String)> {
    match raw.split_once(':') {
        Some((name, needle)) => Ok((name.to_string(), needle.to_string())),
        None => bail!("expected NAME:VALUE, got {raw:?}"),
    }
}

/// Folds every populated flag into one `Sub` (AND) node. An all-empty
/// `QueryArgs` yields `Predicate::All`, matching an unqualified search.
pub fn build(args: &QueryArgs) -> Result<Node> {
    let mut children = Vec::new();

    if args.seen {
        children.push(Node::new(Predicate::Seen));
    }
    if args.unseen {
        children.push(Node::negated(Predicate::Seen));
    }
    if args.deleted {
        children.push(Node::new(Predicate::Deleted));
    }
    if args.flagged {
        children.push(Node::new(Predicate::Flagged));
    }
    if args.draft {
        children.push(Node::new(Predicate::Draft));
    }
    if args.answered {
        children.push(Node::new(Predicate::Answered));
    }
    for keyword in &args.keywords {
        children.push(Node::new(Predicate::Keyword(keyword.clone())));
    }
    if let Some(raw) = &args.seq_set {
        let set = SequenceSet::try_from(raw.as_str())
            .map_err(|e| anyhow::anyhow!("invalid sequence set {raw:?}: {e:?}"))?;
        children.push(Node::new(Predicate::SeqSet(set)));
    }
    for raw in &args.headers {
        let (name, needle) = split_header_arg(raw)?;
        children.push(Node::new(Predicate::Header(name, needle)));
    }
    for raw in &args.header_addresses {
        let (name, needle) = split_header_arg(raw)?;
        children.push(Node::new(Predicate::HeaderAddress(name, needle)));
    }
    if let Some(needle) = &args.body {
        children.push(Node::new(Predicate::Body(needle.clone())));
    }
    if let Some(needle) = &args.text {
        children.push(Node::new(Predicate::Text(needle.clone())));
    }
    if let Some(s) = &args.before {
        children.push(Node::new(Predicate::Before(parse_date(s)?)));
    }
    if let Some(s) = &args.on {
        children.push(Node::new(Predicate::On(parse_date(s)?)));
    }
    if let Some(s) = &args.since {
        children.push(Node::new(Predicate::Since(parse_date(s)?)));
    }
    if let Some(s) = &args.sent_before {
        children.push(Node::new(Predicate::SentBefore(parse_date(s)?)));
    }
    if let Some(s) = &args.sent_on {
        children.push(Node::new(Predicate::SentOn(parse_date(s)?)));
    }
    if let Some(s) = &args.sent_since {
        children.push(Node::new(Predicate::SentSince(parse_date(s)?)));
    }
    if let Some(n) = args.smaller {
        children.push(Node::new(Predicate::Smaller(n)));
    }
    if let Some(n) = args.larger {
        children.push(Node::new(Predicate::Larger(n)));
    }

    if children.is_empty() {
        Ok(Node::new(Predicate::All))
    } else {
        Ok(Node::new(Predicate::Sub(children)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_args() -> QueryArgs {
        QueryArgs {
            seen: false,
            unseen: false,
            deleted: false,
            flagged: false,
            draft: false,
            answered: false,
            keywords: Vec::new(),
            seq_set: None,
            headers: Vec::new(),
            header_addresses: Vec::new(),
            body: None,
            text: None,
            before: None,
            on: None,
            since: None,
            sent_before: None,
            sent_on: None,
            sent_since: None,
            smaller: None,
            larger: None,
        }
    }

    #[test]
    fn no_flags_yields_all() {
        let node = build(&empty_args()).unwrap();
        assert!(matches!(node.kind, Predicate::All));
    }

    #[test]
    fn seen_and_header_combine_under_one_sub() {
        let mut args = empty_args();
        args.seen = true;
        args.headers = vec!["Subject:hello".to_string()];
        let node = build(&args).unwrap();
        match node.kind {
            Predicate::Sub(children) => assert_eq!(children.len(), 2),
            _ => panic!("expected Sub"),
        }
    }

    #[test]
    fn malformed_header_arg_is_rejected() {
        let mut args = empty_args();
        args.headers = vec!["no-colon-here".to_string()];
        assert!(build(&args).is_err());
    }
}
