//! Shelf orchestration for the Quire e-book library.
//!
//! [`Library`] ties the on-device blob store, the shared record store and the
//! identity source together behind one handle that owns every shelf rule:
//! imports run an ordered protocol that keeps both stores consistent,
//! removals go remote-first so a failure never strands an unreadable record,
//! and every successful mutation is announced to list subscribers.
//!
//! ```no_run
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use quire_library::Library;
//! use quire_remote::{Database, SqliteStore, StaticIdentity, UserId};
//! use quire_storage::FsStore;
//! use std::sync::Arc;
//!
//! let database = Database::connect("/home/reader/.local/share/quire/library.db").await?;
//! let library = Library::new(
//!     Arc::new(FsStore::new("/home/reader/.local/share/quire")?),
//!     Arc::new(SqliteStore::from(&database)),
//!     Arc::new(StaticIdentity::signed_in(UserId::new("reader-1"))),
//! );
//!
//! let bytes = std::fs::read("dracula.epub")?;
//! let record = library.add_book("dracula.epub", bytes).await?;
//! println!("imported {} by {}", record.title, record.author);
//! # Ok(())
//! # }
//! ```

pub mod error;
mod events;
mod ingest;

pub use crate::events::LibraryEvent;

use crate::error::{ErrorKind, Result};
use crate::events::EVENT_CAPACITY;
use exn::{OptionExt, ResultExt};
use quire_remote::{BookRecord, IdentityHandle, RecordStoreHandle, UserId};
use quire_storage::{Fingerprint, StoreHandle};
use std::collections::HashSet;
use tokio::sync::broadcast;
use tracing::instrument;

/// One user's view of the shelf, backed by the split persistence model.
///
/// Cloning is cheap and every clone shares the same stores and the same
/// event channel.
#[derive(Clone)]
pub struct Library {
    blobs: StoreHandle,
    records: RecordStoreHandle,
    identity: IdentityHandle,
    events: broadcast::Sender<LibraryEvent>,
}

impl Library {
    pub fn new(blobs: StoreHandle, records: RecordStoreHandle, identity: IdentityHandle) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self { blobs, records, identity, events }
    }

    /// Subscribe to shelf change announcements.
    ///
    /// Only mutations made after this call are delivered. A subscriber that
    /// falls far enough behind loses the oldest announcements first, which is
    /// harmless under the re-read-on-notify contract.
    pub fn subscribe(&self) -> broadcast::Receiver<LibraryEvent> {
        self.events.subscribe()
    }

    /// The signed-in user's shelf, newest first.
    ///
    /// Signed out there is no shelf to show, which is an empty listing and
    /// not an error.
    pub async fn books(&self) -> Result<Vec<BookRecord>> {
        let Some(owner) = self.current_user().await? else {
            return Ok(Vec::new());
        };
        self.records.list(&owner).await.or_raise(|| ErrorKind::Remote)
    }

    /// Import one file onto the shelf.
    ///
    /// Runs the full import protocol in [`ingest`]: fingerprint, duplicate
    /// pre-check, metadata and thumbnail extraction, on-device blob write,
    /// then the shared record insert. Announces [`LibraryEvent::Added`] once
    /// the record exists.
    pub async fn add_book(&self, original_name: impl AsRef<str>, content: Vec<u8>) -> Result<BookRecord> {
        let record = ingest::add_book(&self.blobs, &self.records, &self.identity, original_name, content).await?;
        self.notify(LibraryEvent::Added(record.id.clone()));
        Ok(record)
    }

    /// Save a reading position for one book.
    ///
    /// The record store clamps `percent` into `0.0..=100.0`; whatever the
    /// reader last reported wins.
    pub async fn update_progress(&self, id: &str, locator: &str, percent: f64) -> Result<()> {
        let owner = self.require_user().await?;
        self.records
            .update_progress(&owner, id, locator, percent)
            .await
            .or_raise(|| ErrorKind::Remote)?;
        self.notify(LibraryEvent::Updated(id.to_string()));
        Ok(())
    }

    /// Mark or unmark one book as a favorite.
    pub async fn set_favorite(&self, id: &str, favorite: bool) -> Result<()> {
        let owner = self.require_user().await?;
        self.records.set_favorite(&owner, id, favorite).await.or_raise(|| ErrorKind::Remote)?;
        self.notify(LibraryEvent::Updated(id.to_string()));
        Ok(())
    }

    /// Take one book off the shelf: shared record first, then the blob.
    ///
    /// The remote delete is the point of no return. Once it succeeds the
    /// book is gone from every device's listing, and a blob removal failure
    /// after that leaves nothing worse than an orphaned file for
    /// [`Library::reclaim_orphans`] to sweep up. The opposite order could
    /// destroy content that the shelf still points at.
    #[instrument(skip(self, record), fields(id = %record.id))]
    pub async fn remove(&self, record: &BookRecord) -> Result<()> {
        let owner = self.require_user().await?;
        self.records.delete(&owner, &record.id).await.or_raise(|| ErrorKind::Remote)?;
        self.blobs.delete(&record.fingerprint).await.or_raise(|| ErrorKind::Storage)?;
        self.notify(LibraryEvent::Removed(record.id.clone()));
        Ok(())
    }

    /// Delete every on-device blob the shelf no longer points at.
    ///
    /// Orphans accumulate from signed-out imports and from removals that
    /// died between the record delete and the blob delete. Returns the
    /// fingerprints that were reclaimed.
    ///
    /// Requires a signed-in user: without a shelf to compare against, every
    /// blob would look orphaned.
    #[instrument(skip(self))]
    pub async fn reclaim_orphans(&self) -> Result<Vec<Fingerprint>> {
        let owner = self.require_user().await?;
        let shelved: HashSet<Fingerprint> = self
            .records
            .list(&owner)
            .await
            .or_raise(|| ErrorKind::Remote)?
            .into_iter()
            .map(|record| record.fingerprint)
            .collect();
        let mut reclaimed = Vec::new();
        for fingerprint in self.blobs.fingerprints().await.or_raise(|| ErrorKind::Storage)? {
            if !shelved.contains(&fingerprint) {
                self.blobs.delete(&fingerprint).await.or_raise(|| ErrorKind::Storage)?;
                tracing::info!(%fingerprint, "reclaimed orphaned blob");
                reclaimed.push(fingerprint);
            }
        }
        Ok(reclaimed)
    }

    async fn current_user(&self) -> Result<Option<UserId>> {
        self.identity.current_user().await.or_raise(|| ErrorKind::Remote)
    }

    async fn require_user(&self) -> Result<UserId> {
        self.current_user().await?.ok_or_raise(|| ErrorKind::NotAuthenticated)
    }

    fn notify(&self, event: LibraryEvent) {
        // Nobody subscribed is fine; the send result only reports that.
        _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quire_remote::{Database, MemoryStore as MemoryRecords, NewBook, RecordStore, SqliteStore, StaticIdentity};
    use quire_storage::{Blob, BlobStore, MemoryStore as MemoryBlobs};
    use std::io::Write;
    use std::sync::Arc;

    fn reader() -> UserId {
        UserId::new("reader-1")
    }

    fn mock_library(identity: StaticIdentity) -> (Arc<MemoryBlobs>, Arc<MemoryRecords>, Library) {
        let blobs = Arc::new(MemoryBlobs::default());
        let records = Arc::new(MemoryRecords::default());
        let library = Library::new(blobs.clone(), records.clone(), Arc::new(identity));
        (blobs, records, library)
    }

    fn cover_png() -> Vec<u8> {
        let image = image::DynamicImage::ImageRgb8(image::RgbImage::from_fn(640, 480, |x, y| {
            image::Rgb([(x % 256) as u8, (y % 256) as u8, 96])
        }));
        let mut bytes = std::io::Cursor::new(Vec::new());
        image.write_to(&mut bytes, image::ImageFormat::Png).unwrap();
        bytes.into_inner()
    }

    fn epub_with_cover(title: &str, author: &str) -> Vec<u8> {
        let container = r#"<container><rootfiles>
            <rootfile full-path="OEBPS/content.opf" media-type="application/oebps-package+xml"/>
        </rootfiles></container>"#;
        let opf = format!(
            r#"<package xmlns:dc="http://purl.org/dc/elements/1.1/">
                <metadata><dc:title>{title}</dc:title><dc:creator>{author}</dc:creator></metadata>
                <manifest>
                    <item id="cover" href="cover.png" media-type="image/png" properties="cover-image"/>
                </manifest>
            </package>"#
        );
        let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
        let options = zip::write::SimpleFileOptions::default();
        writer.start_file("META-INF/container.xml", options).unwrap();
        writer.write_all(container.as_bytes()).unwrap();
        writer.start_file("OEBPS/content.opf", options).unwrap();
        writer.write_all(opf.as_bytes()).unwrap();
        writer.start_file("OEBPS/cover.png", options).unwrap();
        writer.write_all(&cover_png()).unwrap();
        writer.finish().unwrap().into_inner()
    }

    #[tokio::test]
    async fn test_signed_out_shelf_reads_empty() {
        let (_, records, library) = mock_library(StaticIdentity::signed_out());
        // Somebody's books exist; they're just not visible without a user.
        records
            .insert(&reader(), NewBook {
                fingerprint: Fingerprint::of(b"epub bytes"),
                title: "Hidden".to_string(),
                author: "Someone".to_string(),
                cover: None,
            })
            .await
            .unwrap();
        assert_eq!(library.books().await.unwrap(), Vec::new());
    }

    #[tokio::test]
    async fn test_books_lists_newest_first() {
        let (_, _, library) = mock_library(StaticIdentity::signed_in(reader()));
        for content in [b"one".to_vec(), b"two".to_vec(), b"three".to_vec()] {
            library.add_book("book.epub", content).await.unwrap();
        }
        let shelf = library.books().await.unwrap();
        let fingerprints: Vec<Fingerprint> = shelf.into_iter().map(|record| record.fingerprint).collect();
        assert_eq!(fingerprints, vec![
            Fingerprint::of(b"three"),
            Fingerprint::of(b"two"),
            Fingerprint::of(b"one"),
        ]);
    }

    #[tokio::test]
    async fn test_add_announces_added() {
        let (_, _, library) = mock_library(StaticIdentity::signed_in(reader()));
        let mut events = library.subscribe();
        let record = library.add_book("book.epub", b"epub bytes".to_vec()).await.unwrap();
        assert_eq!(events.try_recv().unwrap(), LibraryEvent::Added(record.id));
        assert!(events.try_recv().is_err(), "exactly one announcement");
    }

    #[tokio::test]
    async fn test_progress_and_favorite_announce_and_persist() {
        let (_, _, library) = mock_library(StaticIdentity::signed_in(reader()));
        let record = library.add_book("book.epub", b"epub bytes".to_vec()).await.unwrap();
        let mut events = library.subscribe();

        library.update_progress(&record.id, "epubcfi(/6/4!/4/10/2:3)", 37.5).await.unwrap();
        library.set_favorite(&record.id, true).await.unwrap();

        assert_eq!(events.try_recv().unwrap(), LibraryEvent::Updated(record.id.clone()));
        assert_eq!(events.try_recv().unwrap(), LibraryEvent::Updated(record.id.clone()));
        let shelf = library.books().await.unwrap();
        assert_eq!(shelf[0].reading_position.as_deref(), Some("epubcfi(/6/4!/4/10/2:3)"));
        assert_eq!(shelf[0].progress_percent, 37.5);
        assert!(shelf[0].is_favorite);
    }

    #[tokio::test]
    async fn test_clones_share_the_event_channel() {
        let (_, _, library) = mock_library(StaticIdentity::signed_in(reader()));
        let clone = library.clone();
        let mut events = library.subscribe();
        let record = clone.add_book("book.epub", b"epub bytes".to_vec()).await.unwrap();
        assert_eq!(events.try_recv().unwrap(), LibraryEvent::Added(record.id));
    }

    #[tokio::test]
    async fn test_mutations_require_sign_in() {
        let (blobs, records, library) = mock_library(StaticIdentity::signed_in(reader()));
        let record = library.add_book("book.epub", b"epub bytes".to_vec()).await.unwrap();

        // Same stores, nobody signed in.
        let signed_out =
            Library::new(blobs.clone(), records.clone(), Arc::new(StaticIdentity::signed_out()));
        let err = signed_out.update_progress(&record.id, "locator", 10.0).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotAuthenticated));
        let err = signed_out.set_favorite(&record.id, true).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotAuthenticated));
        let err = signed_out.remove(&record).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotAuthenticated));
        let err = signed_out.reclaim_orphans().await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotAuthenticated));

        // Nothing happened to the shelf.
        let shelf = library.books().await.unwrap();
        assert_eq!(shelf.len(), 1);
        assert_eq!(shelf[0].reading_position, None);
        assert!(!shelf[0].is_favorite);
        assert!(blobs.get(&record.fingerprint).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_unknown_id_surfaces_as_remote_error() {
        let (_, _, library) = mock_library(StaticIdentity::signed_in(reader()));
        let err = library.update_progress("no-such-id", "locator", 10.0).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Remote));
    }

    #[tokio::test]
    async fn test_remove_deletes_record_then_blob() {
        let (blobs, _, library) = mock_library(StaticIdentity::signed_in(reader()));
        let record = library.add_book("book.epub", b"epub bytes".to_vec()).await.unwrap();
        let mut events = library.subscribe();

        library.remove(&record).await.unwrap();

        assert!(library.books().await.unwrap().is_empty());
        assert!(blobs.get(&record.fingerprint).await.unwrap().is_none());
        assert_eq!(events.try_recv().unwrap(), LibraryEvent::Removed(record.id));
    }

    #[tokio::test]
    async fn test_failed_remote_delete_keeps_the_blob() {
        let (blobs, records, library) = mock_library(StaticIdentity::signed_in(reader()));
        let record = library.add_book("book.epub", b"epub bytes".to_vec()).await.unwrap();
        let mut events = library.subscribe();
        records.set_fail_deletes(true);

        let err = library.remove(&record).await.unwrap_err();

        // The remote delete never succeeded, so the blob must not be touched.
        assert!(matches!(&*err, ErrorKind::Remote));
        assert!(blobs.get(&record.fingerprint).await.unwrap().is_some());
        assert_eq!(library.books().await.unwrap().len(), 1);
        assert!(events.try_recv().is_err(), "failed removals are not announced");
    }

    #[tokio::test]
    async fn test_failed_blob_delete_leaves_a_reclaimable_orphan() {
        let (blobs, _, library) = mock_library(StaticIdentity::signed_in(reader()));
        let record = library.add_book("book.epub", b"epub bytes".to_vec()).await.unwrap();
        blobs.set_fail_deletes(true);

        let err = library.remove(&record).await.unwrap_err();

        // Past the point of no return: the record is gone, the blob stays.
        assert!(matches!(&*err, ErrorKind::Storage));
        assert!(library.books().await.unwrap().is_empty());
        assert!(blobs.get(&record.fingerprint).await.unwrap().is_some());

        // Once the disk recovers, the sweep finishes the job.
        blobs.set_fail_deletes(false);
        assert_eq!(library.reclaim_orphans().await.unwrap(), vec![record.fingerprint.clone()]);
        assert!(blobs.get(&record.fingerprint).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reclaim_spares_shelved_books() {
        let (blobs, _, library) = mock_library(StaticIdentity::signed_in(reader()));
        let record = library.add_book("book.epub", b"epub bytes".to_vec()).await.unwrap();
        // An orphan, as left behind by a signed-out import.
        let stray = Blob::new(b"stray bytes".to_vec(), "stray.epub");
        let stray_key = stray.fingerprint.clone();
        blobs.put(stray).await.unwrap();

        assert_eq!(library.reclaim_orphans().await.unwrap(), vec![stray_key.clone()]);
        assert!(blobs.get(&stray_key).await.unwrap().is_none());
        assert!(blobs.get(&record.fingerprint).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_end_to_end_shelf_lifecycle() {
        let temp_dir = tempfile::tempdir().unwrap();
        let database = Database::connect_in_memory().await.unwrap();
        let library = Library::new(
            Arc::new(quire_storage::FsStore::new(temp_dir.path()).unwrap()),
            Arc::new(SqliteStore::from(&database)),
            Arc::new(StaticIdentity::signed_in(reader())),
        );
        let mut events = library.subscribe();

        // Import a real EPUB and get real metadata back.
        let bytes = epub_with_cover("The Woman in White", "Wilkie Collins");
        let record = library.add_book("woman-in-white.epub", bytes.clone()).await.unwrap();
        assert_eq!(record.title, "The Woman in White");
        assert_eq!(record.author, "Wilkie Collins");
        let cover = record.cover.as_deref().unwrap();
        assert!(cover.starts_with("data:image/jpeg;base64,"));
        assert_eq!(events.try_recv().unwrap(), LibraryEvent::Added(record.id.clone()));

        // The same bytes again are refused up front.
        let err = library.add_book("again.epub", bytes).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Duplicate));

        // Read a bit, favorite it, and see both stick.
        library.update_progress(&record.id, "epubcfi(/6/4!/4/10/2:3)", 37.5).await.unwrap();
        library.set_favorite(&record.id, true).await.unwrap();
        let shelf = library.books().await.unwrap();
        assert_eq!(shelf.len(), 1);
        assert_eq!(shelf[0].reading_position.as_deref(), Some("epubcfi(/6/4!/4/10/2:3)"));
        assert_eq!(shelf[0].progress_percent, 37.5);
        assert!(shelf[0].is_favorite);

        // Take it off the shelf again; both stores end empty.
        library.remove(&record).await.unwrap();
        assert!(library.books().await.unwrap().is_empty());
        assert_eq!(events.try_recv().unwrap(), LibraryEvent::Updated(record.id.clone()));
        assert_eq!(events.try_recv().unwrap(), LibraryEvent::Updated(record.id.clone()));
        assert_eq!(events.try_recv().unwrap(), LibraryEvent::Removed(record.id.clone()));
        database.close().await;
    }
}
