//! In-memory blob store for testing.

use super::BlobStore;
use crate::blob::Blob;
use crate::error::{ErrorKind, Result};
use crate::fingerprint::Fingerprint;
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::io::Error as IoError;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

/// In-memory blob store for testing.
///
/// Blobs live in a `HashMap` behind a [`RwLock`], so all trait methods
/// operate on `&self` without external synchronisation. Failure switches let
/// tests force `put` or `delete` to fail with an I/O error, which is how
/// ingestion ordering under a broken disk gets exercised without a disk.
///
/// # Examples
///
/// ```
/// use quire_storage::{Blob, BlobStore, Fingerprint, MemoryStore};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let store = MemoryStore::with_blobs([Blob::new(b"epub bytes".to_vec(), "dracula.epub")]);
/// assert!(store.get(&Fingerprint::of(b"epub bytes")).await?.is_some());
///
/// store.set_fail_puts(true);
/// assert!(store.put(Blob::new(b"more".to_vec(), "x.epub")).await.is_err());
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct MemoryStore {
    blobs: RwLock<HashMap<Fingerprint, Blob>>,
    fail_puts: AtomicBool,
    fail_deletes: AtomicBool,
}

impl MemoryStore {
    /// Create a store pre-populated with blobs.
    pub fn with_blobs(blobs: impl IntoIterator<Item = Blob>) -> Self {
        let map = blobs.into_iter().map(|blob| (blob.fingerprint.clone(), blob)).collect();
        Self { blobs: RwLock::new(map), ..Self::default() }
    }

    /// Make every subsequent [`put`](BlobStore::put) fail with an I/O error.
    pub fn set_fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::Relaxed);
    }

    /// Make every subsequent [`delete`](BlobStore::delete) fail with an I/O error.
    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::Relaxed);
    }
}

#[async_trait]
impl BlobStore for MemoryStore {
    async fn put(&self, blob: Blob) -> Result<()> {
        if self.fail_puts.load(Ordering::Relaxed) {
            exn::bail!(ErrorKind::Io(IoError::other("forced put failure")));
        }
        self.blobs.write().await.insert(blob.fingerprint.clone(), blob);
        Ok(())
    }

    async fn get(&self, fingerprint: &Fingerprint) -> Result<Option<Blob>> {
        Ok(self.blobs.read().await.get(fingerprint).cloned())
    }

    async fn delete(&self, fingerprint: &Fingerprint) -> Result<()> {
        if self.fail_deletes.load(Ordering::Relaxed) {
            exn::bail!(ErrorKind::Io(IoError::other("forced delete failure")));
        }
        self.blobs.write().await.remove(fingerprint);
        Ok(())
    }

    async fn fingerprints(&self) -> Result<BTreeSet<Fingerprint>> {
        Ok(self.blobs.read().await.keys().cloned().collect())
    }
}
