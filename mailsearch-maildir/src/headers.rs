//! Raw header-block scanning for Tier C's `HeaderParser` contract
//! (spec.md §6, expanded in SPEC_FULL.md §4.9): a small line scanner over
//! the message's header block, built directly on `tokio::io::AsyncBufReadExt`
//! rather than a MIME parser tied to a fixed field set.

use std::collections::VecDeque;

use async_trait::async_trait;
use mailsearch_core::collab::{HeaderLine, HeaderParser};
use mailsearch_core::SearchError;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

/// The result of scanning one message's header block.
pub struct HeaderBlock {
    pub lines: Vec<HeaderLine>,
    /// Physical byte length of the header block, including its
    /// terminating blank line — the boundary [`crate::accessor`] needs to
    /// split a file into `(header_size, body_size)`.
    pub header_size: u64,
}

/// Reads raw header lines up to (and including) the blank line that ends
/// the header block, unfolds continuations, and keeps only the ones in
/// `names` (empty `names` keeps everything).
pub async fn scan<R: AsyncRead + Unpin>(source: R, names: &[String]) -> Result<HeaderBlock, SearchError> {
    let mut reader = BufReader::new(source);
    let mut raw_lines: Vec<Vec<u8>> = Vec::new();
    let mut header_size: u64 = 0;

    loop {
        let mut line = Vec::new();
        let n = reader.read_until(b'\n', &mut line).await?;
        if n == 0 {
            break;
        }
        header_size += n as u64;
        let trimmed_len = line
            .iter()
            .rposition(|&b| b != b'\n' && b != b'\r')
            .map(|i| i + 1)
            .unwrap_or(0);
        line.truncate(trimmed_len);
        if line.is_empty() {
            break;
        }
        raw_lines.push(line);
    }

    Ok(HeaderBlock {
        lines: parse_lines(&raw_lines, names),
        header_size,
    })
}

fn parse_lines(raw_lines: &[Vec<u8>], names: &[String]) -> Vec<HeaderLine> {
    let mut out = Vec::new();
    let mut i = 0;
    while i < raw_lines.len() {
        let line = &raw_lines[i];
        let Some(colon) = line.iter().position(|&b| b == b':') else {
            i += 1;
            continue;
        };
        let name = String::from_utf8_lossy(&line[..colon]).trim().to_string();
        let mut value = line[colon + 1..].to_vec();
        while let Some(b' ') | Some(b'\t') = value.first().copied() {
            value.remove(0);
        }

        let mut j = i + 1;
        while j < raw_lines.len() {
            match raw_lines[j].first() {
                Some(b' ') | Some(b'\t') => {
                    value.push(b' ');
                    value.extend_from_slice(raw_lines[j].trim_ascii_start());
                    j += 1;
                }
                _ => break,
            }
        }

        let keep = names.is_empty() || names.iter().any(|n| n.eq_ignore_ascii_case(&name));
        if keep {
            out.push(HeaderLine {
                name,
                value: value.clone(),
                full_value: value,
                continues: false,
                eoh: false,
                use_full_value: true,
            });
        }
        i = j;
    }
    out
}

/// Feeds a pre-scanned [`HeaderBlock`]'s lines to the search core one at a
/// time, as [`HeaderParser`] requires.
pub struct RawHeaderParser {
    lines: VecDeque<HeaderLine>,
}

impl RawHeaderParser {
    pub fn new(lines: Vec<HeaderLine>) -> Self {
        Self {
            lines: lines.into(),
        }
    }
}

#[async_trait]
impl HeaderParser for RawHeaderParser {
    async fn next_line(&mut self) -> Result<Option<HeaderLine>, SearchError> {
        Ok(self.lines.pop_front())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scan_stops_at_blank_line_and_unfolds_continuations() {
        let msg = b"Subject: hello\nX-Long: part one\n continued\nFrom: a@b\n\nbody goes here";
        let block = scan(&msg[..], &[]).await.unwrap();
        assert_eq!(block.lines.len(), 3);
        assert_eq!(block.lines[1].name, "X-Long");
        assert_eq!(block.lines[1].full_value, b"part one continued");
        assert_eq!(block.header_size, msg.len() as u64 - b"body goes here".len() as u64);
    }

    #[tokio::test]
    async fn scan_filters_by_requested_names_case_insensitively() {
        let msg = b"Subject: hello\nFrom: a@b\n\n";
        let block = scan(&msg[..], &["subject".to_string()]).await.unwrap();
        assert_eq!(block.lines.len(), 1);
        assert_eq!(block.lines[0].name, "Subject");
    }
}
