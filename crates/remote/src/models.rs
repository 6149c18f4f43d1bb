//! Record models and their database row forms.

use crate::error::{Error, ErrorKind};
use derive_more::Display;
use exn::ResultExt;
use quire_storage::Fingerprint;
use time::UtcDateTime;

/// Identifier of the user a record belongs to.
///
/// Every query against the shared database is scoped to one of these. The
/// value itself is opaque; it comes from the authentication boundary.
#[derive(Debug, Display, Clone, PartialEq, Eq, Hash)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One book on a user's shelf, as the shared database knows it.
///
/// The record is authoritative for metadata and reading state; the binary
/// content it describes lives on-device in the blob store, keyed by the same
/// fingerprint. A record without a local blob is not corruption, it just
/// hasn't been fetched onto this device.
#[derive(Debug, Clone, PartialEq)]
pub struct BookRecord {
    /// Assigned by the store on insert.
    pub id: String,
    pub owner: UserId,
    pub fingerprint: Fingerprint,
    pub title: String,
    pub author: String,
    /// Self-contained `data:` URL of the cover thumbnail.
    pub cover: Option<String>,
    /// Opaque locator owned by the reading surface.
    pub reading_position: Option<String>,
    /// In [0, 100].
    pub progress_percent: f64,
    pub is_favorite: bool,
    /// Reserved grouping label; ingestion never sets it.
    pub collection: Option<String>,
    pub created_at: UtcDateTime,
    pub updated_at: UtcDateTime,
}

/// The fields ingestion provides for a new record.
///
/// Everything else (id, reading state, timestamps) is assigned by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBook {
    pub fingerprint: Fingerprint,
    pub title: String,
    pub author: String,
    pub cover: Option<String>,
}

#[derive(sqlx::FromRow)]
pub(crate) struct BookRow {
    pub(crate) id: String,
    pub(crate) owner_id: String,
    pub(crate) fingerprint: String,
    pub(crate) title: String,
    pub(crate) author: String,
    pub(crate) cover: Option<String>,
    pub(crate) reading_position: Option<String>,
    pub(crate) progress_percent: f64,
    pub(crate) is_favorite: bool,
    pub(crate) collection: Option<String>,
    pub(crate) created_at: i64,
    pub(crate) updated_at: i64,
}

impl From<&BookRecord> for BookRow {
    fn from(record: &BookRecord) -> Self {
        Self {
            id: record.id.clone(),
            owner_id: record.owner.as_str().to_string(),
            fingerprint: record.fingerprint.to_string(),
            title: record.title.clone(),
            author: record.author.clone(),
            cover: record.cover.clone(),
            reading_position: record.reading_position.clone(),
            progress_percent: record.progress_percent,
            is_favorite: record.is_favorite,
            collection: record.collection.clone(),
            created_at: record.created_at.unix_timestamp(),
            updated_at: record.updated_at.unix_timestamp(),
        }
    }
}

impl TryFrom<BookRow> for BookRecord {
    type Error = Error;
    fn try_from(row: BookRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            owner: UserId::new(row.owner_id),
            fingerprint: row.fingerprint.parse::<Fingerprint>().or_raise(|| ErrorKind::InvalidData("fingerprint"))?,
            title: row.title,
            author: row.author,
            cover: row.cover,
            reading_position: row.reading_position,
            progress_percent: row.progress_percent,
            is_favorite: row.is_favorite,
            collection: row.collection,
            created_at: UtcDateTime::from_unix_timestamp(row.created_at)
                .or_raise(|| ErrorKind::InvalidData("creation date"))?,
            updated_at: UtcDateTime::from_unix_timestamp(row.updated_at)
                .or_raise(|| ErrorKind::InvalidData("update date"))?,
        })
    }
}
