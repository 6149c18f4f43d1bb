//! EPUB package parsing.
//!
//! An EPUB is a zip archive whose `META-INF/container.xml` points at a
//! package document (the OPF). The package carries Dublin Core metadata
//! (`dc:title`, `dc:creator`) plus a manifest of resources, one of which may
//! be designated as the cover. That's all we read; rendering concerns like
//! the spine never enter the picture.

use crate::error::{ErrorKind, Result};
use crate::models::{BookMeta, CoverImage, UNKNOWN_AUTHOR, UNKNOWN_TITLE};
use exn::ResultExt;
use quick_xml::events::{BytesStart, Event};
use quick_xml::reader::Reader;
use std::io::{Cursor, Read};
use std::path::Path;
use zip::ZipArchive;
use zip::result::ZipError;

const CONTAINER_PATH: &str = "META-INF/container.xml";
/// Manifests predating EPUB 3 often leave the media type off the cover item.
const FALLBACK_COVER_TYPE: &str = "image/jpeg";

/// Which Dublin Core element the parser is currently inside.
enum Field {
    Title,
    Creator,
}

/// Metadata as declared by the package document, before sentinel fallback.
struct PackageMeta {
    title: Option<String>,
    creator: Option<String>,
    cover: Option<CoverRef>,
}

/// A manifest entry designated as the cover.
struct CoverRef {
    href: String,
    media_type: Option<String>,
}

/// One `<item>` from the package manifest.
#[derive(Default)]
struct ManifestItem {
    id: String,
    href: String,
    media_type: Option<String>,
    properties: String,
}

/// One-shot reader over an in-memory EPUB container.
///
/// Most callers want the top-level [`extract`](crate::extract) instead; this
/// is the fallible inner layer for anyone who needs to know *why* a
/// container was unreadable.
pub struct Extractor<'a> {
    archive: ZipArchive<Cursor<&'a [u8]>>,
}

impl<'a> Extractor<'a> {
    /// Open the zip structure. Fails if the bytes are not an archive at all.
    pub fn open(bytes: &'a [u8]) -> Result<Self> {
        let archive = ZipArchive::new(Cursor::new(bytes)).or_raise(|| ErrorKind::Archive)?;
        Ok(Self { archive })
    }

    /// Read title, author, and the designated cover from the package.
    ///
    /// Title and creator fall back to the sentinels individually when the
    /// package simply doesn't declare them; a cover that is declared but
    /// unreadable is an error (the caller decides how much to degrade).
    pub fn metadata(mut self) -> Result<BookMeta> {
        let container = self.read_entry(CONTAINER_PATH)?;
        let opf_path = rootfile_path(&container)?;
        let opf = self.read_entry(&opf_path)?;
        let package = parse_package(&opf)?;
        let cover = self.resolve_cover(&opf_path, package.cover)?;
        Ok(BookMeta {
            title: package.title.unwrap_or_else(|| UNKNOWN_TITLE.to_string()),
            author: package.creator.unwrap_or_else(|| UNKNOWN_AUTHOR.to_string()),
            cover,
        })
    }

    fn read_entry(&mut self, name: &str) -> Result<String> {
        let bytes = self.read_entry_bytes(name)?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn read_entry_bytes(&mut self, name: &str) -> Result<Vec<u8>> {
        let mut entry = match self.archive.by_name(name) {
            Ok(entry) => entry,
            Err(ZipError::FileNotFound) => exn::bail!(ErrorKind::MissingEntry(name.to_string())),
            Err(_) => exn::bail!(ErrorKind::Archive),
        };
        let mut bytes = Vec::new();
        entry.read_to_end(&mut bytes).or_raise(|| ErrorKind::Archive)?;
        Ok(bytes)
    }

    fn resolve_cover(&mut self, opf_path: &str, cover: Option<CoverRef>) -> Result<Option<CoverImage>> {
        let Some(cover) = cover else {
            return Ok(None);
        };
        // Hrefs are relative to the directory holding the package document,
        // and zip entry names always use forward slashes.
        let opf_dir = Path::new(opf_path).parent().unwrap_or(Path::new(""));
        let entry = opf_dir.join(&cover.href).to_string_lossy().replace('\\', "/");
        let data = self.read_entry_bytes(&entry)?;
        Ok(Some(CoverImage {
            data,
            media_type: cover.media_type.unwrap_or_else(|| FALLBACK_COVER_TYPE.to_string()),
        }))
    }
}

/// Pull the package document path out of `container.xml`.
fn rootfile_path(container: &str) -> Result<String> {
    let mut reader = Reader::from_str(container);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e) | Event::Empty(e)) if e.local_name().as_ref() == b"rootfile" => {
                for attr in e.attributes().flatten() {
                    if attr.key.as_ref() == b"full-path" {
                        return Ok(String::from_utf8_lossy(&attr.value).into_owned());
                    }
                }
            },
            Ok(Event::Eof) => break,
            Err(_) => exn::bail!(ErrorKind::MalformedXml),
            _ => {},
        }
        buf.clear();
    }
    exn::bail!(ErrorKind::NoRootfile)
}

/// Walk the package document for Dublin Core fields and the cover.
///
/// Element names are matched on their local part, so `dc:title` and plain
/// `title` both land. The cover is designated either by an EPUB 3 manifest
/// property or, in older packages, by a `<meta name="cover">` naming a
/// manifest id.
fn parse_package(opf: &str) -> Result<PackageMeta> {
    let mut reader = Reader::from_str(opf);
    let mut buf = Vec::new();
    let mut meta = PackageMeta { title: None, creator: None, cover: None };
    let mut items: Vec<ManifestItem> = Vec::new();
    let mut cover_id: Option<String> = None;
    let mut in_metadata = false;
    let mut capture: Option<Field> = None;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"metadata" => in_metadata = true,
                b"title" if in_metadata => capture = Some(Field::Title),
                b"creator" if in_metadata => capture = Some(Field::Creator),
                b"meta" if in_metadata => scan_meta_cover(&e, &mut cover_id),
                b"item" => items.push(manifest_item(&e)),
                _ => {},
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                b"meta" if in_metadata => scan_meta_cover(&e, &mut cover_id),
                b"item" => items.push(manifest_item(&e)),
                _ => {},
            },
            Ok(Event::Text(e)) => {
                if let (Some(field), Ok(text)) = (&capture, e.unescape()) {
                    let text = text.trim();
                    let slot = match field {
                        Field::Title => &mut meta.title,
                        Field::Creator => &mut meta.creator,
                    };
                    // First occurrence wins; packages listing several
                    // creators keep the primary one.
                    if !text.is_empty() && slot.is_none() {
                        *slot = Some(text.to_string());
                    }
                }
            },
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"metadata" => in_metadata = false,
                b"title" | b"creator" => capture = None,
                _ => {},
            },
            Ok(Event::Eof) => break,
            Err(_) => exn::bail!(ErrorKind::MalformedXml),
            _ => {},
        }
        buf.clear();
    }

    meta.cover = designate_cover(items, cover_id);
    Ok(meta)
}

fn scan_meta_cover(e: &BytesStart<'_>, cover_id: &mut Option<String>) {
    let mut name = None;
    let mut content = None;
    for attr in e.attributes().flatten() {
        match attr.key.as_ref() {
            b"name" => name = Some(String::from_utf8_lossy(&attr.value).into_owned()),
            b"content" => content = Some(String::from_utf8_lossy(&attr.value).into_owned()),
            _ => {},
        }
    }
    if name.as_deref() == Some("cover") && cover_id.is_none() {
        *cover_id = content;
    }
}

fn manifest_item(e: &BytesStart<'_>) -> ManifestItem {
    let mut item = ManifestItem::default();
    for attr in e.attributes().flatten() {
        let value = String::from_utf8_lossy(&attr.value).into_owned();
        match attr.key.as_ref() {
            b"id" => item.id = value,
            b"href" => item.href = value,
            b"media-type" => item.media_type = Some(value),
            b"properties" => item.properties = value,
            _ => {},
        }
    }
    item
}

fn designate_cover(items: Vec<ManifestItem>, cover_id: Option<String>) -> Option<CoverRef> {
    // An explicit EPUB 3 property beats the legacy meta indirection.
    let by_property = items
        .iter()
        .position(|item| item.properties.split_whitespace().any(|p| p == "cover-image"));
    let by_id = cover_id.and_then(|id| items.iter().position(|item| item.id == id));
    let item = items.into_iter().nth(by_property.or(by_id)?)?;
    Some(CoverRef { href: item.href, media_type: item.media_type })
}
