//! In-memory record store for testing.

use super::{RecordStore, clamp_percent, now_in_seconds};
use crate::error::{ErrorKind, Result};
use crate::models::{BookRecord, NewBook, UserId};
use async_trait::async_trait;
use quire_storage::Fingerprint;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use tokio::sync::RwLock;

/// In-memory record store for testing.
///
/// Rows live in a `Vec` behind a [`RwLock`] in insertion order, with the same
/// constraint and not-found behavior as the SQLite store. Extras for tests:
/// an insert-call counter (the ingestion ordering tests assert on how many
/// times the store was even *asked* to insert) and forced-failure switches
/// posing as generic database errors.
///
/// # Examples
///
/// ```
/// use quire_remote::{MemoryStore, NewBook, RecordStore, UserId};
/// use quire_storage::Fingerprint;
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let store = MemoryStore::default();
/// let owner = UserId::new("reader-1");
/// store.insert(&owner, NewBook {
///     fingerprint: Fingerprint::of(b"epub bytes"),
///     title: "The Moonstone".to_string(),
///     author: "Wilkie Collins".to_string(),
///     cover: None,
/// }).await?;
/// assert_eq!(store.list(&owner).await?.len(), 1);
/// assert_eq!(store.insert_calls(), 1);
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct MemoryStore {
    rows: RwLock<Vec<BookRecord>>,
    insert_calls: AtomicUsize,
    fail_inserts: AtomicBool,
    fail_updates: AtomicBool,
    fail_deletes: AtomicBool,
}

impl MemoryStore {
    /// How many times [`insert`](RecordStore::insert) has been called,
    /// successfully or not.
    pub fn insert_calls(&self) -> usize {
        self.insert_calls.load(Ordering::Relaxed)
    }

    /// Make every subsequent insert fail with a database error.
    pub fn set_fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::Relaxed);
    }

    /// Make every subsequent progress/favorite update fail with a database error.
    pub fn set_fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::Relaxed);
    }

    /// Make every subsequent delete fail with a database error.
    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::Relaxed);
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn list(&self, owner: &UserId) -> Result<Vec<BookRecord>> {
        let rows = self.rows.read().await;
        let mut books: Vec<BookRecord> = rows.iter().filter(|row| &row.owner == owner).cloned().collect();
        // Newest first; reversing before the stable sort breaks created_at
        // ties in favor of the later insertion.
        books.reverse();
        books.sort_by_key(|record| std::cmp::Reverse(record.created_at));
        Ok(books)
    }

    async fn find_by_fingerprint(&self, owner: &UserId, fingerprint: &Fingerprint) -> Result<Option<BookRecord>> {
        let rows = self.rows.read().await;
        Ok(rows.iter().find(|row| &row.owner == owner && &row.fingerprint == fingerprint).cloned())
    }

    async fn insert(&self, owner: &UserId, book: NewBook) -> Result<BookRecord> {
        self.insert_calls.fetch_add(1, Ordering::Relaxed);
        if self.fail_inserts.load(Ordering::Relaxed) {
            exn::bail!(ErrorKind::Database);
        }
        let mut rows = self.rows.write().await;
        if rows.iter().any(|row| &row.owner == owner && row.fingerprint == book.fingerprint) {
            exn::bail!(ErrorKind::Constraint);
        }
        let now = now_in_seconds()?;
        let record = BookRecord {
            id: uuid::Uuid::new_v4().to_string(),
            owner: owner.clone(),
            fingerprint: book.fingerprint,
            title: book.title,
            author: book.author,
            cover: book.cover,
            reading_position: None,
            progress_percent: 0.0,
            is_favorite: false,
            collection: None,
            created_at: now,
            updated_at: now,
        };
        rows.push(record.clone());
        Ok(record)
    }

    async fn update_progress(&self, owner: &UserId, id: &str, locator: &str, percent: f64) -> Result<()> {
        if self.fail_updates.load(Ordering::Relaxed) {
            exn::bail!(ErrorKind::Database);
        }
        let mut rows = self.rows.write().await;
        let Some(record) = rows.iter_mut().find(|row| &row.owner == owner && row.id == id) else {
            exn::bail!(ErrorKind::NotFound(id.to_string()));
        };
        record.reading_position = Some(locator.to_string());
        record.progress_percent = clamp_percent(percent);
        record.updated_at = now_in_seconds()?;
        Ok(())
    }

    async fn set_favorite(&self, owner: &UserId, id: &str, favorite: bool) -> Result<()> {
        if self.fail_updates.load(Ordering::Relaxed) {
            exn::bail!(ErrorKind::Database);
        }
        let mut rows = self.rows.write().await;
        let Some(record) = rows.iter_mut().find(|row| &row.owner == owner && row.id == id) else {
            exn::bail!(ErrorKind::NotFound(id.to_string()));
        };
        record.is_favorite = favorite;
        record.updated_at = now_in_seconds()?;
        Ok(())
    }

    async fn delete(&self, owner: &UserId, id: &str) -> Result<()> {
        if self.fail_deletes.load(Ordering::Relaxed) {
            exn::bail!(ErrorKind::Database);
        }
        let mut rows = self.rows.write().await;
        let before = rows.len();
        rows.retain(|row| !(&row.owner == owner && row.id == id));
        if rows.len() == before {
            exn::bail!(ErrorKind::NotFound(id.to_string()));
        }
        Ok(())
    }
}
