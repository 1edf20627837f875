//! Address parsing/canonicalization for `HEADER_ADDRESS` (spec.md §4.2,
//! §6), grounded on the `mailparse::addrparse`/`MailAddr` usage in the
//! `FliegendeWurst-inboxid` example repo.

use mailparse::{addrparse, MailAddr};

use mailsearch_core::collab::{AddressParser, ParsedAddress};

pub struct MailparseAddressParser;

fn split_host(addr: &str) -> (Option<String>, Option<String>) {
    match addr.split_once('@') {
        Some((mailbox, host)) => (Some(mailbox.to_string()), Some(host.to_string())),
        None => (Some(addr.to_string()), None),
    }
}

fn flatten(addrs: mailparse::MailAddrList, out: &mut Vec<ParsedAddress>) {
    for addr in addrs.into_inner() {
        match addr {
            MailAddr::Single(info) => {
                let (mailbox, host) = split_host(&info.addr);
                out.push(ParsedAddress {
                    display_name: info.display_name,
                    mailbox,
                    host,
                });
            }
            MailAddr::Group(group) => {
                for info in group.addrs {
                    let (mailbox, host) = split_host(&info.addr);
                    out.push(ParsedAddress {
                        display_name: info.display_name,
                        mailbox,
                        host,
                    });
                }
            }
        }
    }
}

impl AddressParser for MailparseAddressParser {
    fn parse(&self, raw: &[u8]) -> Vec<ParsedAddress> {
        let text = String::from_utf8_lossy(raw);
        let Ok(parsed) = addrparse(&text) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        flatten(parsed, &mut out);
        out
    }

    fn canonicalize(&self, addrs: &[ParsedAddress]) -> Vec<u8> {
        let rendered = addrs
            .iter()
            .map(|a| {
                let mailbox = a.mailbox.as_deref().unwrap_or("");
                let host = a.host.as_deref().unwrap_or("");
                match &a.display_name {
                    Some(name) if !name.is_empty() => format!("{name} <{mailbox}@{host}>"),
                    _ => format!("<{mailbox}@{host}>"),
                }
            })
            .collect::<Vec<_>>()
            .join(" ");
        rendered.into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_display_name_and_splits_host() {
        let parser = MailparseAddressParser;
        let addrs = parser.parse(b"Jane Doe <jane@example.com>");
        assert_eq!(addrs.len(), 1);
        assert_eq!(addrs[0].display_name.as_deref(), Some("Jane Doe"));
        assert_eq!(addrs[0].mailbox.as_deref(), Some("jane"));
        assert_eq!(addrs[0].host.as_deref(), Some("example.com"));
    }

    #[test]
    fn canonicalize_folds_into_angle_brackets() {
        let parser = MailparseAddressParser;
        let addrs = parser.parse(b"Jane Doe <jane@example.com>, bob@example.org");
        let out = parser.canonicalize(&addrs);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Jane Doe <jane@example.com> <bob@example.org>"
        );
    }
}
