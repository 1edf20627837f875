//! CR-injecting message streamer.
//!
//! A maildir message on disk is stored with bare `\n` line endings; IMAP
//! wants CRLF on the wire. `inject_cr` streams a window of the message's
//! *virtual* (CRLF-canonical) representation from its *physical* bytes,
//! injecting a `\r` ahead of every bare `\n` it encounters, without ever
//! materializing the whole message in memory.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::SearchError;

/// Physical/virtual byte counts for a whole message, as reported by the
/// backend (virtual counts every bare `\n` as two bytes).
#[derive(Debug, Clone, Copy)]
pub struct MessageSizes {
    pub physical_size: u64,
    pub virtual_size: u64,
}

/// Skips `virtual_skip` virtual bytes of `source`, returning whether the
/// last physical byte skipped was `\r` (so the slow-path scan downstream
/// knows whether a `\n` at its very first position still needs a `\r`).
///
/// A bare `\n` (one not preceded by `\r`) counts for *two* virtual bytes
/// here, since it materializes as `\r\n` in the virtual form; every other
/// physical byte counts for one.
async fn skip_virtual<R: AsyncRead + Unpin>(
    source: &mut R,
    mut virtual_skip: u64,
) -> Result<bool, SearchError> {
    let mut cr_skipped = false;
    let mut byte = [0u8; 1];
    while virtual_skip > 0 {
        let n = source.read(&mut byte).await?;
        if n == 0 {
            break;
        }
        let b = byte[0];
        let width = if b == b'\n' && !cr_skipped { 2 } else { 1 };
        cr_skipped = b == b'\r';
        virtual_skip = virtual_skip.saturating_sub(width);
    }
    Ok(cr_skipped)
}

/// Emits `min(max_virtual_bytes, virtual_size - virtual_skip)` bytes of the
/// virtual representation, starting `virtual_skip` virtual bytes into the
/// message, returning the number of physical bytes written (including
/// injected `\r`s).
pub async fn inject_cr<R, W>(
    sink: &mut W,
    source: &mut R,
    sizes: MessageSizes,
    virtual_skip: u64,
    max_virtual_bytes: u64,
) -> Result<u64, SearchError>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    if sizes.physical_size == 0 || virtual_skip >= sizes.virtual_size {
        return Ok(0);
    }
    let mut budget = max_virtual_bytes.min(sizes.virtual_size - virtual_skip);

    if sizes.physical_size == sizes.virtual_size {
        skip_physical(source, virtual_skip).await?;
        let mut limited = source.take(budget);
        let written = tokio::io::copy(&mut limited, sink).await?;
        return Ok(written);
    }

    let mut cr_skipped = skip_virtual(source, virtual_skip).await?;
    let mut written = 0u64;
    let mut buf = [0u8; 4096];

    while budget > 0 {
        let want = (buf.len() as u64).min(budget) as usize;
        let n = source.read(&mut buf[..want]).await?;
        if n == 0 {
            break;
        }

        // `start` is the first byte of the current unflushed run; `i` scans
        // ahead of it. `cr_skipped` tracks whether the virtual byte most
        // recently charged against `budget` was a `\r` — a bare `\n` is one
        // where it wasn't. A bare `\n` is charged against `budget` twice,
        // once for the injected `\r` and once for itself, matching the two
        // passes a push-back-capable reader would take over the same
        // source position (spec.md §4.6: "the `\n` is written on the next
        // iteration") — here the `\n` is already in `buf`, so the "next
        // iteration" is just the next pass of this same inner loop at the
        // same `i`, not a fresh read from `source`.
        let mut start = 0usize;
        let mut i = 0usize;
        while i < n && budget > 0 {
            let b = buf[i];
            if b == b'\n' && !cr_skipped {
                budget -= 1;
                sink.write_all(&buf[start..i]).await?;
                written += (i - start) as u64;
                sink.write_all(b"\r").await?;
                written += 1;
                cr_skipped = true;
                start = i;
                // Re-check budget before charging/writing the `\n` itself;
                // don't advance `i` or `start` past it yet.
                continue;
            }
            cr_skipped = b == b'\r';
            budget -= 1;
            i += 1;
        }

        if start < i {
            sink.write_all(&buf[start..i]).await?;
            written += (i - start) as u64;
        }
    }

    Ok(written)
}

async fn skip_physical<R: AsyncRead + Unpin>(
    source: &mut R,
    mut n: u64,
) -> Result<(), SearchError> {
    let mut buf = [0u8; 4096];
    while n > 0 {
        let want = (buf.len() as u64).min(n) as usize;
        let got = source.read(&mut buf[..want]).await?;
        if got == 0 {
            break;
        }
        n -= got as u64;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[tokio::test]
    async fn fast_path_zero_copy_when_sizes_match() {
        let input = b"hello\r\nworld\r\n".to_vec();
        let mut source = Cursor::new(input.clone());
        let mut sink = Vec::new();
        let sizes = MessageSizes {
            physical_size: input.len() as u64,
            virtual_size: input.len() as u64,
        };
        let n = inject_cr(&mut sink, &mut source, sizes, 0, 100)
            .await
            .unwrap();
        assert_eq!(n, input.len() as u64);
        assert_eq!(sink, input);
    }

    #[tokio::test]
    async fn fast_path_respects_virtual_skip_and_max() {
        let input = b"0123456789".to_vec();
        let mut source = Cursor::new(input.clone());
        let mut sink = Vec::new();
        let sizes = MessageSizes {
            physical_size: 10,
            virtual_size: 10,
        };
        let n = inject_cr(&mut sink, &mut source, sizes, 2, 4).await.unwrap();
        assert_eq!(n, 4);
        assert_eq!(sink, b"2345");
    }

    #[tokio::test]
    async fn slow_path_injects_missing_cr_before_bare_lf() {
        let input = b"ab\ncd\r\nef".to_vec();
        let mut source = Cursor::new(input);
        let mut sink = Vec::new();
        let sizes = MessageSizes {
            physical_size: 9,
            virtual_size: 10,
        };
        let n = inject_cr(&mut sink, &mut source, sizes, 0, 10)
            .await
            .unwrap();
        assert_eq!(sink, b"ab\r\ncd\r\nef");
        assert_eq!(n, 10);
    }

    #[tokio::test]
    async fn slow_path_stops_exactly_at_budget_on_injected_cr() {
        // `max_virtual_bytes` truncates the window one virtual byte after
        // the injected `\r`, right at the bare `\n`: the `\n` itself must
        // not be emitted, since it would be the 3rd virtual byte of a
        // 2-byte budget.
        let input = b"a\nb".to_vec();
        let mut source = Cursor::new(input);
        let mut sink = Vec::new();
        let sizes = MessageSizes {
            physical_size: 3,
            virtual_size: 4,
        };
        let n = inject_cr(&mut sink, &mut source, sizes, 0, 2)
            .await
            .unwrap();
        assert_eq!(sink, b"a\r");
        assert_eq!(n, 2);
    }

    #[tokio::test]
    async fn slow_path_respects_virtual_skip_mid_message() {
        let input = b"ab\ncd".to_vec();
        let mut source = Cursor::new(input);
        let mut sink = Vec::new();
        let sizes = MessageSizes {
            physical_size: 5,
            virtual_size: 6,
        };
        // skip "ab\r\n" (4 virtual bytes), leaving "cd"
        let n = inject_cr(&mut sink, &mut source, sizes, 4, 10)
            .await
            .unwrap();
        assert_eq!(sink, b"cd");
        assert_eq!(n, 2);
    }

    #[tokio::test]
    async fn terminates_mid_buffer_when_budget_exhausted() {
        let input = b"abcdef".to_vec();
        let mut source = Cursor::new(input);
        let mut sink = Vec::new();
        let sizes = MessageSizes {
            physical_size: 6,
            virtual_size: 6,
        };
        let n = inject_cr(&mut sink, &mut source, sizes, 0, 3)
            .await
            .unwrap();
        assert_eq!(sink, b"abc");
        assert_eq!(n, 3);
    }

    #[tokio::test]
    async fn zero_size_message_emits_nothing() {
        let mut source = Cursor::new(Vec::<u8>::new());
        let mut sink = Vec::new();
        let sizes = MessageSizes {
            physical_size: 0,
            virtual_size: 0,
        };
        let n = inject_cr(&mut sink, &mut source, sizes, 0, 10)
            .await
            .unwrap();
        assert_eq!(n, 0);
        assert!(sink.is_empty());
    }
}
