//! SQLite implementation of the record store.

use super::{RecordStore, clamp_percent, now_in_seconds};
use crate::Database;
use crate::error::{ErrorKind, Result};
use crate::models::{BookRecord, BookRow, NewBook, UserId};
use async_trait::async_trait;
use exn::ResultExt;
use quire_storage::Fingerprint;
use sqlx::SqlitePool;
use time::UtcDateTime;
use tracing::instrument;

/// Record store backed by the shared SQLite database.
///
/// Schema lives under `migrations/`, one SQL file per statement under
/// `queries/`. The per-owner dedup rule is enforced by the schema's
/// `UNIQUE (owner_id, fingerprint)` index, which makes the database the
/// backstop when two imports of the same content race past the pre-check.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl From<&Database> for SqliteStore {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone() }
    }
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn is_unique_violation(error: &sqlx::Error) -> bool {
    matches!(error, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn list(&self, owner: &UserId) -> Result<Vec<BookRecord>> {
        let rows: Vec<BookRow> = sqlx::query_as(include_str!("../../queries/list_books.sql"))
            .bind(owner.as_str())
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter().map(BookRecord::try_from).collect()
    }

    async fn find_by_fingerprint(&self, owner: &UserId, fingerprint: &Fingerprint) -> Result<Option<BookRecord>> {
        let row: Option<BookRow> = sqlx::query_as(include_str!("../../queries/find_by_fingerprint.sql"))
            .bind(owner.as_str())
            .bind(fingerprint.as_str())
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(BookRecord::try_from).transpose()
    }

    #[instrument(skip(self, book), fields(owner = %owner, fingerprint = %book.fingerprint))]
    async fn insert(&self, owner: &UserId, book: NewBook) -> Result<BookRecord> {
        let now = now_in_seconds()?;
        // The record is assembled here rather than re-selected after the
        // INSERT; the row is exactly what we wrote.
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
        let row = BookRow::from(&record);
        let result = sqlx::query(include_str!("../../queries/insert_book.sql"))
            .bind(row.id)
            .bind(row.owner_id)
            .bind(row.fingerprint)
            .bind(row.title)
            .bind(row.author)
            .bind(row.cover)
            .bind(row.reading_position)
            .bind(row.progress_percent)
            .bind(row.is_favorite)
            .bind(row.collection)
            .bind(row.created_at)
            .bind(row.updated_at)
            .execute(&self.pool)
            .await;
        match result {
            Ok(_) => Ok(record),
            Err(error) if is_unique_violation(&error) => exn::bail!(ErrorKind::Constraint),
            Err(error) => Err(error).or_raise(|| ErrorKind::Database),
        }
    }

    async fn update_progress(&self, owner: &UserId, id: &str, locator: &str, percent: f64) -> Result<()> {
        let result = sqlx::query(include_str!("../../queries/update_progress.sql"))
            .bind(locator)
            .bind(clamp_percent(percent))
            .bind(UtcDateTime::now().unix_timestamp())
            .bind(owner.as_str())
            .bind(id)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        if result.rows_affected() == 0 {
            exn::bail!(ErrorKind::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn set_favorite(&self, owner: &UserId, id: &str, favorite: bool) -> Result<()> {
        let result = sqlx::query(include_str!("../../queries/set_favorite.sql"))
            .bind(favorite)
            .bind(UtcDateTime::now().unix_timestamp())
            .bind(owner.as_str())
            .bind(id)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        if result.rows_affected() == 0 {
            exn::bail!(ErrorKind::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn delete(&self, owner: &UserId, id: &str) -> Result<()> {
        let result = sqlx::query(include_str!("../../queries/delete_book.sql"))
            .bind(owner.as_str())
            .bind(id)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        if result.rows_affected() == 0 {
            exn::bail!(ErrorKind::NotFound(id.to_string()));
        }
        Ok(())
    }
}
