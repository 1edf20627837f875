//! The one concrete [`SubstringMatcher`] implementation: case-insensitive
//! substring search over `us-ascii`/`utf-8` text, with a carry buffer so a
//! match spanning two [`SubstringMatcher::feed`] calls isn't missed
//! (spec.md §4.2 Tier C "streamed in fixed-size chunks").

use mailsearch_core::collab::{SubstringMatcher, SubstringMatcherFactory};
use mailsearch_core::SearchError;
use mailsearch_types::Charset;

fn charset_supported(charset: &Charset) -> bool {
    let s = charset.as_ref();
    s.eq_ignore_ascii_case("us-ascii") || s.eq_ignore_ascii_case("utf-8") || s.eq_ignore_ascii_case("ascii")
}

pub struct AsciiCiMatcherFactory;

impl SubstringMatcherFactory for AsciiCiMatcherFactory {
    fn compile(&self, needle: &str, charset: &Charset) -> Result<Box<dyn SubstringMatcher>, SearchError> {
        if !charset_supported(charset) {
            return Err(SearchError::Charset);
        }
        if needle.is_empty() {
            return Err(SearchError::SearchKey);
        }
        Ok(Box::new(AsciiCiMatcher {
            needle: needle.as_bytes().to_ascii_lowercase(),
            carry: Vec::new(),
            found: false,
        }))
    }
}

/// Carries the trailing `needle.len() - 1` bytes of the previous chunk so
/// a needle split across a chunk boundary still matches.
pub struct AsciiCiMatcher {
    needle: Vec<u8>,
    carry: Vec<u8>,
    found: bool,
}

impl SubstringMatcher for AsciiCiMatcher {
    fn feed(&mut self, haystack: &[u8]) -> bool {
        if self.found {
            return true;
        }
        let mut buf = std::mem::take(&mut self.carry);
        buf.extend_from_slice(haystack);
        buf.make_ascii_lowercase();

        if buf.len() >= self.needle.len() {
            self.found = buf.windows(self.needle.len()).any(|w| w == self.needle.as_slice());
        }

        let keep = self.needle.len().saturating_sub(1);
        let start = buf.len().saturating_sub(keep);
        self.carry = buf[start..].to_vec();
        self.found
    }

    fn reset(&mut self) {
        self.carry.clear();
        self.found = false;
    }
}
