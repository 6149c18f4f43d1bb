//! The import protocol.
//!
//! Step ordering in here is the correctness story of the whole system: the
//! duplicate pre-check runs before any state exists, the blob lands on-device
//! before the shared database hears about the book, and the store's
//! uniqueness constraint backstops the races the pre-check cannot see.

use crate::error::{ErrorKind, Result};
use exn::{OptionExt, ResultExt};
use quire_epub::extract;
use quire_remote::error::ErrorKind as RemoteErrorKind;
use quire_remote::{BookRecord, IdentityHandle, NewBook, RecordStoreHandle};
use quire_storage::{Blob, StoreHandle};
use tracing::instrument;

/// Import one file into the library.
///
/// The steps run strictly in order:
///
/// 1. fingerprint the content;
/// 2. resolve the signed-in user and check their shelf for the fingerprint,
///    stopping with [`ErrorKind::Duplicate`] before anything is written; a
///    signed-out import has no shelf to check and continues, to fail at
///    step 6 with only the step-5 blob left behind;
/// 3. extract metadata (never fails; degrades to sentinel values);
/// 4. render the cover thumbnail when a cover was found, tolerating absence;
/// 5. write the blob on-device; failure stops the import while the shared
///    database is still untouched;
/// 6. require the signed-in user; signed out leaves the step-5 blob as a
///    reclaimable orphan and nothing else;
/// 7. insert the record; a uniqueness violation here means another import
///    of the same content won the race, and surfaces as `Duplicate` too.
///
/// The facade takes care of step 8, notifying list subscribers on success.
#[instrument(
    skip(blobs, records, identity, original_name, content),
    fields(name = %original_name.as_ref(), size = content.len()),
)]
pub(crate) async fn add_book(
    blobs: &StoreHandle,
    records: &RecordStoreHandle,
    identity: &IdentityHandle,
    original_name: impl AsRef<str>,
    content: Vec<u8>,
) -> Result<BookRecord> {
    let blob = Blob::new(content, original_name.as_ref());
    let user = identity.current_user().await.or_raise(|| ErrorKind::Remote)?;
    if let Some(owner) = &user {
        let existing = records
            .find_by_fingerprint(owner, &blob.fingerprint)
            .await
            .or_raise(|| ErrorKind::Remote)?;
        if existing.is_some() {
            exn::bail!(ErrorKind::Duplicate);
        }
    }
    let meta = extract(&blob.content);
    let cover = meta.cover.as_ref().and_then(quire_cover::thumbnail);
    let fingerprint = blob.fingerprint.clone();
    blobs.put(blob).await.or_raise(|| ErrorKind::Storage)?;
    let owner = user.ok_or_raise(|| ErrorKind::NotAuthenticated)?;
    let book = NewBook { fingerprint, title: meta.title, author: meta.author, cover };
    match records.insert(&owner, book).await {
        Ok(record) => {
            tracing::info!(id = %record.id, title = %record.title, "book imported");
            Ok(record)
        },
        Err(err) if matches!(&*err, RemoteErrorKind::Constraint) => Err(err).or_raise(|| ErrorKind::Duplicate),
        Err(err) => Err(err).or_raise(|| ErrorKind::Remote),
    }
}
