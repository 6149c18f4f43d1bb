//! Access to per-user book records.

#[cfg(feature = "mock")]
mod memory;
mod sqlite;

#[cfg(feature = "mock")]
pub use self::memory::MemoryStore;
pub use self::sqlite::SqliteStore;

use crate::error::{ErrorKind, Result};
use crate::models::{BookRecord, NewBook, UserId};
use async_trait::async_trait;
use exn::ResultExt;
use quire_storage::Fingerprint;
use std::sync::Arc;
use time::UtcDateTime;

/// Book records in the shared backend, scoped to an explicit owner.
///
/// The caller resolves the authenticated user once and passes it into every
/// call; implementations must never return or touch another owner's rows.
/// Contract:
/// - [`list`](Self::list) orders by creation time, newest first, with ties
///   broken by insertion order.
/// - [`insert`](Self::insert) assigns the id and timestamps and fails with
///   [`Constraint`](crate::error::ErrorKind::Constraint) when the owner
///   already holds a record for the fingerprint.
/// - Mutations that match no row fail with
///   [`NotFound`](crate::error::ErrorKind::NotFound), never silently succeed.
/// - Progress percentages are clamped into [0, 100] on write (NaN becomes 0);
///   concurrent writers are last-write-wins.
#[async_trait]
pub trait RecordStore {
    /// All of the owner's records, newest first.
    async fn list(&self, owner: &UserId) -> Result<Vec<BookRecord>>;

    /// The owner's record for this content, if one exists.
    async fn find_by_fingerprint(&self, owner: &UserId, fingerprint: &Fingerprint) -> Result<Option<BookRecord>>;

    /// Create a record, returning it with its assigned id and timestamps.
    async fn insert(&self, owner: &UserId, book: NewBook) -> Result<BookRecord>;

    /// Store a reading position and progress percentage.
    async fn update_progress(&self, owner: &UserId, id: &str, locator: &str, percent: f64) -> Result<()>;

    /// Flip the favorite flag.
    async fn set_favorite(&self, owner: &UserId, id: &str, favorite: bool) -> Result<()>;

    /// Remove a record.
    async fn delete(&self, owner: &UserId, id: &str) -> Result<()>;
}

/// Shared handle to a record store.
pub type RecordStoreHandle = Arc<dyn RecordStore + Send + Sync>;

/// Progress as stored: clamped into [0, 100], with NaN pinned to 0.
pub(crate) fn clamp_percent(percent: f64) -> f64 {
    if percent.is_nan() { 0.0 } else { percent.clamp(0.0, 100.0) }
}

/// Current time at whole-second precision, the resolution record rows carry.
pub(crate) fn now_in_seconds() -> Result<UtcDateTime> {
    UtcDateTime::from_unix_timestamp(UtcDateTime::now().unix_timestamp())
        .or_raise(|| ErrorKind::InvalidData("timestamp"))
}

#[cfg(test)]
mod tests {
    use super::clamp_percent;
    use rstest::rstest;

    #[rstest]
    #[case::in_range(42.5, 42.5)]
    #[case::low_bound(0.0, 0.0)]
    #[case::high_bound(100.0, 100.0)]
    #[case::below(-3.0, 0.0)]
    #[case::above(150.0, 100.0)]
    #[case::negative_infinity(f64::NEG_INFINITY, 0.0)]
    #[case::infinity(f64::INFINITY, 100.0)]
    #[case::nan(f64::NAN, 0.0)]
    fn test_clamp_percent(#[case] input: f64, #[case] expected: f64) {
        assert_eq!(clamp_percent(input), expected);
    }
}
