//! The `BodyMatcher` collaborator for Tier C body searches (spec.md §4.2
//! Tier C "text" / §6): reads the message body in fixed-size chunks and
//! feeds each to the caller's compiled matcher.

use async_trait::async_trait;
use mailsearch_core::collab::{BodyMatcher, MessageSource, SubstringMatcher};
use mailsearch_core::SearchError;
use mailsearch_types::ImapUid;
use tokio::io::AsyncReadExt;

const CHUNK: usize = 8192;

pub struct RawBodyMatcher;

#[async_trait]
impl BodyMatcher for RawBodyMatcher {
    async fn contains(
        &self,
        _uid: ImapUid,
        body_source: &mut dyn MessageSource,
        body_size: u64,
        matcher: &mut dyn SubstringMatcher,
    ) -> Result<bool, SearchError> {
        matcher.reset();
        let mut remaining = body_size;
        let mut buf = vec![0u8; CHUNK];
        while remaining > 0 {
            let want = std::cmp::min(remaining, CHUNK as u64) as usize;
            let n = body_source.read(&mut buf[..want]).await?;
            if n == 0 {
                break;
            }
            if matcher.feed(&buf[..n]) {
                return Ok(true);
            }
            remaining -= n as u64;
        }
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::{AsciiCiMatcher, AsciiCiMatcherFactory};
    use mailsearch_types::Charset;
    use std::io::Cursor;

    #[tokio::test]
    async fn finds_needle_spanning_chunk_boundary() {
        let factory = AsciiCiMatcherFactory;
        let mut matcher = factory.compile("needle", &Charset::from("utf-8")).unwrap();
        let body = b"x".repeat(CHUNK - 3).into_iter().chain(*b"needle").collect::<Vec<u8>>();
        let mut source = Cursor::new(body.clone());
        let found = RawBodyMatcher
            .contains(ImapUid::new(1).unwrap(), &mut source, body.len() as u64, matcher.as_mut())
            .await
            .unwrap();
        assert!(found);
    }

    #[tokio::test]
    async fn reports_false_when_absent() {
        let factory = AsciiCiMatcherFactory;
        let mut matcher = factory.compile("absent", &Charset::from("utf-8")).unwrap();
        let body = b"nothing to see here".to_vec();
        let mut source = Cursor::new(body.clone());
        let found = RawBodyMatcher
            .contains(ImapUid::new(1).unwrap(), &mut source, body.len() as u64, matcher.as_mut())
            .await
            .unwrap();
        assert!(!found);
    }

    #[allow(dead_code)]
    fn _type_check(_m: &AsciiCiMatcher) {}
}
