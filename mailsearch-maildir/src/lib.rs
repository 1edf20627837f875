//! Maildir-backed collaborator implementations: the concrete "external
//! subsystem" side of every trait `mailsearch-core::collab` declares
//! (spec.md §6), wiring them onto a plain `cur/`/`new/`/`tmp/` directory.

pub mod accessor;
pub mod address;
pub mod body;
pub mod date;
pub mod flagtx;
pub mod headers;
pub mod internal_date;
pub mod maildir;
pub mod matcher;
pub mod view;

pub use accessor::MaildirAccessor;
pub use address::MailparseAddressParser;
pub use body::RawBodyMatcher;
pub use date::ChronoDateParser;
pub use maildir::Maildir;
pub use matcher::AsciiCiMatcherFactory;
pub use view::MaildirMailbox;
