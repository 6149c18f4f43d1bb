pub mod error;
mod extract;
mod models;

pub use crate::extract::Extractor;
pub use crate::models::{BookMeta, CoverImage, UNKNOWN_AUTHOR, UNKNOWN_TITLE};

use crate::error::Result;
use tracing::instrument;

/// Easy, top-level entrypoint: best-effort metadata for an EPUB file.
///
/// Never fails the caller. Anything that stops the container from being read
/// (not a zip at all, no rootfile, broken package XML, an unreadable declared
/// cover) degrades to the sentinel values, because a corrupt-but-present book
/// is still worth keeping. The degradation shows up in the return value
/// instead of arriving as an error.
///
/// ```
/// use quire_epub::{UNKNOWN_AUTHOR, UNKNOWN_TITLE};
///
/// let meta = quire_epub::extract(b"definitely not an epub");
/// assert_eq!(meta.title, UNKNOWN_TITLE);
/// assert_eq!(meta.author, UNKNOWN_AUTHOR);
/// assert!(meta.cover.is_none());
/// ```
#[instrument(skip(bytes), fields(size = bytes.as_ref().len()))]
pub fn extract(bytes: impl AsRef<[u8]>) -> BookMeta {
    match try_extract(bytes.as_ref()) {
        Ok(meta) => meta,
        Err(err) => {
            tracing::warn!(error = ?err, "metadata extraction degraded to sentinel values");
            BookMeta::unknown()
        },
    }
}

/// The fallible pipeline behind [`extract`].
fn try_extract(bytes: &[u8]) -> Result<BookMeta> {
    Extractor::open(bytes)?.metadata()
}
