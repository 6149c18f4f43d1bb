//! Content fingerprinting.
//!
//! A fingerprint is the deduplication key for the whole system: the local
//! blob store keys on it, and the remote record store enforces per-owner
//! uniqueness on it. Both sides must agree on the rendering, so it lives
//! here as a real type instead of a bare `String`.

use crate::error::{Error, ErrorKind};
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::str::FromStr;

/// Length of the hex rendering (BLAKE3, 32 bytes).
const HEX_LEN: usize = 64;
/// Chunk size for incremental hashing of large files.
const READ_CHUNK: usize = 64 * 1024;

/// A deterministic digest of a file's binary content.
///
/// Rendered as 64 lowercase hex characters. The same bytes always produce
/// the same fingerprint, across calls, restarts, and devices.
///
/// # Examples
///
/// ```
/// use quire_storage::Fingerprint;
///
/// let one = Fingerprint::of(b"identical bytes");
/// let two = Fingerprint::of(b"identical bytes");
/// assert_eq!(one, two);
/// assert_eq!(one.as_str().len(), 64);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, derive_more::Display)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Fingerprint a complete in-memory buffer.
    pub fn of(content: impl AsRef<[u8]>) -> Self {
        Self(blake3::hash(content.as_ref()).to_string())
    }

    /// Fingerprint a byte stream incrementally.
    ///
    /// Reads in fixed-size chunks so arbitrarily large files never need to
    /// be materialized a second time just to be hashed.
    pub fn from_reader(mut reader: impl Read) -> std::io::Result<Self> {
        let mut hasher = blake3::Hasher::new();
        let mut chunk = [0u8; READ_CHUNK];
        loop {
            let read = reader.read(&mut chunk)?;
            if read == 0 {
                break;
            }
            hasher.update(&chunk[..read]);
        }
        Ok(Self(hasher.finalize().to_string()))
    }

    /// The hex rendering of this fingerprint.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for Fingerprint {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != HEX_LEN || !s.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f')) {
            exn::bail!(ErrorKind::InvalidFingerprint(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }
}
