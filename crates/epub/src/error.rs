//! Extraction Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.
//!
//! None of these ever reach the import flow; [`extract`](crate::extract)
//! absorbs them into sentinel metadata. They exist so tests and diagnostics
//! can see *why* a container was unreadable.

use derive_more::{Display, Error};

/// An extraction error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for extraction operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The bytes are not a readable zip archive.
    #[display("unreadable archive")]
    Archive,
    /// A required entry is missing from the archive.
    #[display("missing archive entry: {_0}")]
    MissingEntry(#[error(not(source))] String),
    /// The container or package XML is too broken to parse.
    #[display("malformed package XML")]
    MalformedXml,
    /// The container declares no rootfile to read metadata from.
    #[display("no rootfile declared in container.xml")]
    NoRootfile,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        // The file is either a valid EPUB or it's not.
        false
    }
}
