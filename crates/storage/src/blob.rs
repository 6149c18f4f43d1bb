use crate::fingerprint::Fingerprint;

/// A locally stored book file: the raw bytes of the original import plus the
/// little we know about where they came from.
///
/// The fingerprint is the primary key. Binary content is authoritative here
/// and nowhere else; the remote side only ever sees metadata about it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    pub fingerprint: Fingerprint,
    pub content: Vec<u8>,
    /// File name at import time. Kept for diagnostics and export; never parsed.
    pub original_name: String,
}

impl Blob {
    /// Build a blob from raw file content, fingerprinting it in the process.
    pub fn new(content: Vec<u8>, original_name: impl Into<String>) -> Self {
        Self {
            fingerprint: Fingerprint::of(&content),
            content,
            original_name: original_name.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_fingerprints_content() {
        let blob = Blob::new(b"epub bytes".to_vec(), "dracula.epub");
        assert_eq!(blob.fingerprint, Fingerprint::of(b"epub bytes"));
        assert_eq!(blob.original_name, "dracula.epub");
    }
}
