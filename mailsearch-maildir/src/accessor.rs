//! The `PerMailAccessor` implementation: wires [`crate::internal_date`],
//! [`crate::headers`], and plain file streaming onto one
//! [`crate::view::MaildirMailbox`] snapshot.

use async_trait::async_trait;
use mailsearch_core::collab::{FullFlags, HeaderParser, MessageSource, PerMailAccessor};
use mailsearch_core::SearchError;
use mailsearch_types::ImapUid;

use crate::headers::{self, RawHeaderParser};
use crate::internal_date;
use crate::view::MaildirMailbox;

pub struct MaildirAccessor<'a> {
    mailbox: &'a MaildirMailbox,
}

impl<'a> MaildirAccessor<'a> {
    pub fn new(mailbox: &'a MaildirMailbox) -> Self {
        Self { mailbox }
    }

    fn location(&self, uid: ImapUid) -> Option<String> {
        self.mailbox
            .record_by_uid(uid)
            .and_then(|r| r.location())
            .map(str::to_string)
    }
}

#[async_trait]
impl<'a> PerMailAccessor for MaildirAccessor<'a> {
    async fn get_received_date(&self, uid: ImapUid) -> Option<i64> {
        let name = self.location(uid)?;
        internal_date::resolve(&self.mailbox.maildir().cur_dir(), &name).await.ok()
    }

    /// This backend never caches the sent (`Date:` header) timestamp —
    /// Tier C parses it directly from the message whenever `SENT*` search
    /// keys need it, so Tier B has nothing to return here.
    async fn get_date(&self, _uid: ImapUid) -> Option<(i64, i32)> {
        None
    }

    async fn get_size(&self, uid: ImapUid) -> Option<u64> {
        let name = self.location(uid)?;
        let meta = tokio::fs::metadata(self.mailbox.maildir().cur_dir().join(name))
            .await
            .ok()?;
        Some(meta.len())
    }

    async fn get_flags(&self, uid: ImapUid) -> FullFlags {
        match self.mailbox.record_by_uid(uid) {
            Some(record) => FullFlags {
                system: record.flags,
                recent: false,
                keywords: record.keywords,
            },
            None => FullFlags::default(),
        }
    }

    async fn get_stream(&self, uid: ImapUid) -> Result<(Box<dyn MessageSource>, u64, u64), SearchError> {
        let name = self
            .location(uid)
            .ok_or_else(|| SearchError::Corruption("message record has no LOCATION".into()))?;
        let path = self.mailbox.maildir().cur_dir().join(&name);

        let probe = tokio::fs::File::open(&path).await?;
        let header_size = headers::scan(probe, &[]).await?.header_size;
        let total_size = tokio::fs::metadata(&path).await?.len();
        let body_size = total_size.saturating_sub(header_size);

        let file = tokio::fs::File::open(&path).await?;
        Ok((Box::new(file), header_size, body_size))
    }

    async fn get_headers(&self, uid: ImapUid, names: &[String]) -> Result<Box<dyn HeaderParser>, SearchError> {
        let name = self
            .location(uid)
            .ok_or_else(|| SearchError::Corruption("message record has no LOCATION".into()))?;
        let path = self.mailbox.maildir().cur_dir().join(&name);
        let file = tokio::fs::File::open(&path).await?;
        let block = headers::scan(file, names).await?;
        Ok(Box::new(RawHeaderParser::new(block.lines)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::maildir::Maildir;
    use std::num::NonZeroU32;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn get_stream_splits_header_and_body_sizes() {
        let dir = tempfile::tempdir().unwrap();
        let maildir = Maildir::create(dir.path()).await.unwrap();
        let content = b"Subject: hi\n\nhello body";
        tokio::fs::write(maildir.cur_dir().join("1.host"), content).await.unwrap();
        let mailbox = MaildirMailbox::open(maildir, Vec::new()).await.unwrap();
        let accessor = MaildirAccessor::new(&mailbox);

        let uid = NonZeroU32::new(1).unwrap();
        let (mut source, header_size, body_size) = accessor.get_stream(uid).await.unwrap();
        assert_eq!(header_size, b"Subject: hi\n\n".len() as u64);
        assert_eq!(body_size, b"hello body".len() as u64);

        let mut all = Vec::new();
        source.read_to_end(&mut all).await.unwrap();
        assert_eq!(all, content);
    }

    #[tokio::test]
    async fn get_headers_returns_requested_names_only() {
        let dir = tempfile::tempdir().unwrap();
        let maildir = Maildir::create(dir.path()).await.unwrap();
        tokio::fs::write(
            maildir.cur_dir().join("1.host"),
            b"Subject: hi\nFrom: a@b\n\nbody",
        )
        .await
        .unwrap();
        let mailbox = MaildirMailbox::open(maildir, Vec::new()).await.unwrap();
        let accessor = MaildirAccessor::new(&mailbox);

        let uid = NonZeroU32::new(1).unwrap();
        let mut parser = accessor
            .get_headers(uid, &["From".to_string()])
            .await
            .unwrap();
        let line = parser.next_line().await.unwrap().unwrap();
        assert_eq!(line.name, "From");
        assert!(parser.next_line().await.unwrap().is_none());
    }
}
