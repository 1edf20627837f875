//! The mailbox search core: range planner, three-tier predicate evaluator,
//! maildir flag codec, and CR-injecting message streamer (spec.md §1–§4).
//!
//! This crate takes no dependency on a concrete mailbox format or logger
//! configuration — it consumes the mailbox, the message store, and the
//! text-matching subsystems purely through the traits in [`collab`].
//! `mailsearch-maildir` supplies the concrete implementations that make a
//! [`session::Session`] runnable against a real `cur/` directory.

pub mod collab;
pub mod error;
pub mod evaluate;
pub mod maildir_flags;
pub mod range;
pub mod session;
pub mod stream;
pub mod ternary;

pub use error::SearchError;
pub use session::{Mail, Session, SortProgram};
pub use ternary::Ternary;
