//! Configuration Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};

/// A configuration error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for configuration operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The config file or environment could not be read into settings.
    #[display("could not load configuration")]
    Load,
    /// The platform reports no home directory to resolve paths against.
    #[display("no usable home directory to place application data in")]
    NoHome,
}

impl ErrorKind {
    /// Fix the file or the environment and run again; retrying won't.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
