//! Filesystem blob store.
//!
//! Blobs are plain files under a `blobs/` subdirectory of the store root,
//! one content file and one JSON sidecar per fingerprint. Everything goes
//! through `tokio::fs` for async I/O.

use crate::blob::Blob;
use crate::error::{ErrorKind, Result};
use crate::fingerprint::Fingerprint;
use crate::store::BlobStore;
use async_trait::async_trait;
use exn::ResultExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::ffi::OsStr;
use std::fs::create_dir_all as sync_create_dir;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::instrument;

/// Subdirectory of the store root that holds blob files, so they never mix
/// with anything else living in the data directory (the record database,
/// config backups, whatever comes later).
const BLOBS_DIR: &str = "blobs";

/// What we remember about a blob besides its bytes. Lives next to the
/// content file as `<fingerprint>.json`.
#[derive(Serialize, Deserialize)]
struct Sidecar {
    original_name: String,
}

/// Filesystem-backed [`BlobStore`].
///
/// # Layout
///
/// ```text
/// <root>/blobs/<fingerprint>.epub   content (authoritative)
/// <root>/blobs/<fingerprint>.json   sidecar (original file name)
/// ```
///
/// # Atomicity
/// Every file is written to a unique temp name and renamed into place. The
/// sidecar is renamed *before* the content file and deleted *after* it, and
/// readers key off the content file alone, so no interleaving of put/delete
/// on one fingerprint can expose a torn blob.
#[derive(Debug, Clone)]
pub struct FsStore {
    blobs: PathBuf,
}

impl FsStore {
    /// Open (or create) a blob store rooted at `root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is not absolute, or if `<root>/blobs`
    /// exists and is not a directory.
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_absolute() {
            exn::bail!(ErrorKind::InvalidRoot(root));
        }
        let blobs = root.join(BLOBS_DIR);
        if blobs.exists() && !blobs.is_dir() {
            exn::bail!(ErrorKind::InvalidRoot(blobs));
        }
        // Use non-async here; it'll only happen once when the store is
        // opened and it's not worth making the constructor async for it.
        sync_create_dir(&blobs).map_err(|e| Self::map_io_error(e, &blobs))?;
        Ok(Self { blobs })
    }

    fn content_path(&self, fingerprint: &Fingerprint) -> PathBuf {
        self.blobs.join(format!("{fingerprint}.epub"))
    }

    fn sidecar_path(&self, fingerprint: &Fingerprint) -> PathBuf {
        self.blobs.join(format!("{fingerprint}.json"))
    }

    fn map_io_error(e: std::io::Error, path: &Path) -> ErrorKind {
        match e.kind() {
            std::io::ErrorKind::PermissionDenied => ErrorKind::PermissionDenied(path.to_path_buf()),
            _ => ErrorKind::Io(e),
        }
    }

    /// Write `data` to `<blobs>/<name>` via a temp file and an atomic rename.
    ///
    /// The temp name includes process and thread ids so two imports racing on
    /// the same fingerprint never share a temp file.
    async fn write_atomic(&self, name: &str, data: &[u8]) -> Result<()> {
        let target = self.blobs.join(name);
        let tmp = self
            .blobs
            .join(format!("{name}.{}.{:?}.tmp", std::process::id(), std::thread::current().id()));
        let mut file = fs::File::create(&tmp).await.map_err(|e| Self::map_io_error(e, &tmp))?;
        file.write_all(data).await.map_err(|e| Self::map_io_error(e, &tmp))?;
        file.sync_all().await.map_err(|e| Self::map_io_error(e, &tmp))?;
        drop(file);
        if let Err(err) = fs::rename(&tmp, &target).await {
            // Don't leave the temp file behind on failure.
            _ = fs::remove_file(&tmp).await;
            return Err(exn::Exn::from(Self::map_io_error(err, &target)));
        }
        Ok(())
    }

    async fn remove_quiet(&self, path: PathBuf) -> Result<()> {
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            // Deleting a key that was never stored is a no-op, not an error.
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(exn::Exn::from(Self::map_io_error(err, &path))),
        }
    }

    /// Sidecar loss is survivable: the content file is the authority and the
    /// original name only feeds diagnostics and export.
    async fn original_name(&self, fingerprint: &Fingerprint) -> String {
        match fs::read(self.sidecar_path(fingerprint)).await {
            Ok(bytes) => match serde_json::from_slice::<Sidecar>(&bytes) {
                Ok(sidecar) => sidecar.original_name,
                Err(err) => {
                    tracing::warn!(%fingerprint, error = %err, "unreadable blob sidecar, falling back to key name");
                    format!("{fingerprint}.epub")
                },
            },
            Err(_) => format!("{fingerprint}.epub"),
        }
    }
}

#[async_trait]
impl BlobStore for FsStore {
    #[instrument(skip(self, blob), fields(fingerprint = %blob.fingerprint, size = blob.content.len()), level = "debug")]
    async fn put(&self, blob: Blob) -> Result<()> {
        let sidecar = serde_json::to_vec(&Sidecar { original_name: blob.original_name })
            .or_raise(|| ErrorKind::InvalidData("sidecar"))?;
        // Sidecar first: visibility pivots on the content rename, so a crash
        // between the two writes never exposes a half-stored blob.
        self.write_atomic(&format!("{}.json", blob.fingerprint), &sidecar).await?;
        self.write_atomic(&format!("{}.epub", blob.fingerprint), &blob.content).await?;
        Ok(())
    }

    async fn get(&self, fingerprint: &Fingerprint) -> Result<Option<Blob>> {
        let path = self.content_path(fingerprint);
        let content = match fs::read(&path).await {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(exn::Exn::from(Self::map_io_error(err, &path))),
        };
        let original_name = self.original_name(fingerprint).await;
        Ok(Some(Blob {
            fingerprint: fingerprint.clone(),
            content,
            original_name,
        }))
    }

    #[instrument(skip(self), level = "debug")]
    async fn delete(&self, fingerprint: &Fingerprint) -> Result<()> {
        // Content first, so the blob disappears for readers before the
        // sidecar goes.
        self.remove_quiet(self.content_path(fingerprint)).await?;
        self.remove_quiet(self.sidecar_path(fingerprint)).await?;
        Ok(())
    }

    async fn fingerprints(&self) -> Result<BTreeSet<Fingerprint>> {
        let mut found = BTreeSet::new();
        let mut entries = match fs::read_dir(&self.blobs).await {
            Ok(entries) => entries,
            // A store that was never written to has nothing to report.
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(found),
            Err(err) => return Err(exn::Exn::from(Self::map_io_error(err, &self.blobs))),
        };
        while let Some(entry) = entries.next_entry().await.map_err(|e| Self::map_io_error(e, &self.blobs))? {
            let path = entry.path();
            if path.extension() != Some(OsStr::new("epub")) {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(OsStr::to_str) else {
                continue;
            };
            // Anything that isn't a well-formed fingerprint name (stray
            // downloads, leftover temp files) is not ours to report.
            if let Ok(fingerprint) = stem.parse::<Fingerprint>() {
                found.insert(fingerprint);
            }
        }
        Ok(found)
    }
}
