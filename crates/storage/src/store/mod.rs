//! Blob store trait and implementations.
//!
//! Binary book content lives on the device, keyed by fingerprint; all
//! descriptive metadata lives in the remote record store. This module owns
//! the local half of that split.

mod fs;
#[cfg(feature = "mock")]
mod memory;

pub use self::fs::FsStore;
#[cfg(feature = "mock")]
pub use self::memory::MemoryStore;
use crate::blob::Blob;
use crate::error::Result;
use crate::fingerprint::Fingerprint;
use async_trait::async_trait;
use std::collections::BTreeSet;

/// Unified interface for on-device blob storage.
///
/// # Contract
/// - an absent key is a normal outcome, not an error (a record whose blob
///   hasn't been fetched to this device yet is a legitimate state);
/// - [`put`](Self::put) and [`delete`](Self::delete) are idempotent;
/// - operations on a single key are atomic from the caller's perspective:
///   a reader never observes a partially-written blob.
///
/// # Examples
///
/// ```no_run
/// use quire_storage::{Blob, BlobStore, FsStore};
///
/// # async fn example() -> quire_storage::error::Result<()> {
/// let store = FsStore::new("/home/me/.local/share/quire")?;
/// let blob = Blob::new(b"raw epub bytes".to_vec(), "dracula.epub");
/// let key = blob.fingerprint.clone();
/// store.put(blob).await?;
/// assert!(store.get(&key).await?.is_some());
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store a blob under its fingerprint, overwriting any previous entry.
    async fn put(&self, blob: Blob) -> Result<()>;

    /// Fetch a blob by fingerprint. `Ok(None)` when the key isn't stored here.
    async fn get(&self, fingerprint: &Fingerprint) -> Result<Option<Blob>>;

    /// Remove a blob. Deleting a key that was never stored is not an error.
    async fn delete(&self, fingerprint: &Fingerprint) -> Result<()>;

    /// Every fingerprint currently stored on this device.
    ///
    /// Not used by the happy-path import flow; this exists for
    /// reconciliation, so orphaned blobs can be found and reclaimed.
    async fn fingerprints(&self) -> Result<BTreeSet<Fingerprint>>;
}
