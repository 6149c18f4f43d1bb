//! Library Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.
//!
//! These kinds are the terminal outcomes a user-facing surface reports.
//! Lower layers raise their own, more specific kinds; the orchestration in
//! this crate is the single place that decides which of those are fatal to an
//! operation and maps them here.

use derive_more::{Display, Error};

/// A library error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for library operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The signed-in user already has this book; nothing was imported.
    #[display("this book is already in the library")]
    Duplicate,
    /// On-device storage failed; nothing reached the shared database.
    #[display("on-device storage error")]
    Storage,
    /// No user is signed in.
    #[display("not signed in")]
    NotAuthenticated,
    /// The shared record store or the identity lookup failed.
    #[display("library sync error")]
    Remote,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage | Self::Remote)
    }
}
