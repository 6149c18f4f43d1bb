use std::fmt;

/// Title used when extraction cannot produce one.
pub const UNKNOWN_TITLE: &str = "Unknown Title";
/// Author used when extraction cannot produce one.
pub const UNKNOWN_AUTHOR: &str = "Unknown Author";

/// Metadata recovered from an EPUB package document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookMeta {
    pub title: String,
    pub author: String,
    /// The declared cover resource, when the package names one.
    pub cover: Option<CoverImage>,
}

impl BookMeta {
    /// The sentinel metadata used when a container can't be read at all.
    pub fn unknown() -> Self {
        Self {
            title: UNKNOWN_TITLE.to_string(),
            author: UNKNOWN_AUTHOR.to_string(),
            cover: None,
        }
    }
}

/// An undecoded cover image pulled out of the container.
#[derive(Clone, PartialEq, Eq)]
pub struct CoverImage {
    pub data: Vec<u8>,
    /// Media type declared in the manifest. Advisory only; decoders sniff
    /// the real format from the bytes.
    pub media_type: String,
}

impl fmt::Debug for CoverImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The raw bytes are noise in logs; the length is the useful part.
        f.debug_struct("CoverImage")
            .field("media_type", &self.media_type)
            .field("data", &format_args!("{} bytes", self.data.len()))
            .finish()
    }
}
