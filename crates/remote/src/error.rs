//! Record Store Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A record store error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for record store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The shared database could not be reached or a statement failed.
    #[display("library database error")]
    Database,
    /// Schema migrations could not be applied.
    #[display("library database migration error")]
    Migration,
    /// The owner already holds a record for this fingerprint.
    #[display("record already exists for this owner and fingerprint")]
    Constraint,
    /// No record with this id belongs to the owner.
    #[display("no record with id {_0}")]
    NotFound(#[error(not(source))] String),
    /// A stored value could not be converted back into a model.
    #[display("invalid record data: {_0}")]
    InvalidData(#[error(not(source))] &'static str),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Database)
    }
}
