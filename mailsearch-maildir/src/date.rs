//! Date parsing for `SEARCH`/`SENT*` keys (spec.md §4.2, §6 — expanded in
//! SPEC_FULL.md §4.9). `parse_header_date` resolves the RFC-3501
//! timezone-insensitive SENT* convention: it returns the `Date:` header's
//! instant reinterpreted as if its local wall-clock time were UTC,
//! alongside the header's own offset from true UTC in minutes, so the
//! evaluator can compare naive calendar days regardless of the sender's
//! timezone.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};

use mailsearch_core::collab::DateParser;

pub struct ChronoDateParser;

impl DateParser for ChronoDateParser {
    fn parse_imap_date(&self, s: &str) -> Option<i64> {
        let date = NaiveDate::parse_from_str(s, "%d-%b-%Y").ok()?;
        Some(date.and_hms_opt(0, 0, 0)?.and_utc().timestamp())
    }

    fn parse_header_date(&self, raw: &[u8]) -> Option<(i64, i32)> {
        let text = std::str::from_utf8(raw).ok()?;
        let dt = DateTime::parse_from_rfc2822(text.trim()).ok()?;
        let tz_offset_minutes = -(dt.offset().local_minus_utc() / 60);
        let naive_utc_seconds = Utc.from_utc_datetime(&dt.naive_local()).timestamp();
        Some((naive_utc_seconds, tz_offset_minutes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_imap_textual_date_at_midnight_utc() {
        let parser = ChronoDateParser;
        assert_eq!(parser.parse_imap_date("01-Jan-2024"), Some(1704067200));
    }

    #[test]
    fn rejects_malformed_imap_date() {
        let parser = ChronoDateParser;
        assert_eq!(parser.parse_imap_date("not-a-date"), None);
    }

    #[test]
    fn parses_rfc2822_header_date_with_offset() {
        let parser = ChronoDateParser;
        let (naive_utc, tz) = parser
            .parse_header_date(b"Mon, 1 Jan 2024 10:00:00 +0200")
            .unwrap();
        assert_eq!(tz, -120);
        assert_eq!(naive_utc + (tz as i64) * 60, 1704096000);
    }
}
