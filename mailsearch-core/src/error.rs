//! Sticky session error type (spec.md §7).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SearchError {
    /// Invalid sequence set: zero, over-range, or inverted bounds
    /// (spec.md §4.1 point 2).
    #[error("invalid sequence set: {0}")]
    Syntax(String),

    /// The substring matcher rejected the session's charset.
    #[error("[BADCHARSET] Unknown charset")]
    Charset,

    /// The substring matcher rejected a search needle.
    #[error("Invalid search key")]
    SearchKey,

    /// Missing mandatory field or inconsistent header data.
    #[error("index corruption: {0}")]
    Corruption(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Set alongside [`SearchError::Io`] on the mailbox when a
    /// flag-update rename fails with `ENOSPC` (spec.md §4.4 / §7).
    #[error("no space left on device")]
    NoDiskSpace,
}
