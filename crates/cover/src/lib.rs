//! Cover thumbnail rendering.
//!
//! Turns whatever image an EPUB declares as its cover into a small JPEG,
//! embedded as a `data:` URL so a library record carries its own cover art
//! with no reference back to device-local files.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ExtendedColorType, GenericImageView, ImageEncoder};
use quire_epub::CoverImage;
use tracing::instrument;

/// Widest edge of a rendered thumbnail, in pixels.
pub const MAX_EDGE: u32 = 300;
const JPEG_QUALITY: u8 = 80;
const DATA_URL_PREFIX: &str = "data:image/jpeg;base64,";

/// Render a cover into an embeddable JPEG thumbnail.
///
/// The image is scaled so its wider edge is exactly [`MAX_EDGE`] pixels.
/// Smaller covers are kept at their original size; thumbnails never upscale.
/// Returns `None` when the cover bytes can't be decoded or re-encoded, since
/// a record without cover art is still a perfectly good record.
///
/// ```
/// assert_eq!(quire_cover::thumbnail(&quire_epub::CoverImage {
///     data: b"not an image".to_vec(),
///     media_type: "image/jpeg".to_string(),
/// }), None);
/// ```
#[instrument(skip(cover), fields(media_type = %cover.media_type, size = cover.data.len()))]
pub fn thumbnail(cover: &CoverImage) -> Option<String> {
    match render(&cover.data) {
        Ok(url) => Some(url),
        Err(error) => {
            tracing::warn!(%error, "cover could not be rendered, continuing without thumbnail");
            None
        },
    }
}

fn render(data: &[u8]) -> Result<String, image::ImageError> {
    let decoded = image::load_from_memory(data)?;
    let (width, height) = decoded.dimensions();
    let scaled = if width.max(height) > MAX_EDGE {
        decoded.resize(MAX_EDGE, MAX_EDGE, FilterType::Lanczos3)
    } else {
        decoded
    };
    Ok(format!("{DATA_URL_PREFIX}{}", BASE64.encode(encode_jpeg(&scaled)?)))
}

fn encode_jpeg(image: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    // JPEG has no alpha channel; flatten before encoding.
    let rgb = image.to_rgb8();
    let mut jpeg = Vec::new();
    JpegEncoder::new_with_quality(&mut jpeg, JPEG_QUALITY).write_image(
        rgb.as_raw(),
        rgb.width(),
        rgb.height(),
        ExtendedColorType::Rgb8,
    )?;
    Ok(jpeg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage, Rgba, RgbaImage};
    use rstest::rstest;
    use std::io::Cursor;

    fn png_cover(width: u32, height: u32) -> CoverImage {
        let img = RgbImage::from_fn(width, height, |x, y| {
            Rgb([(x % 256) as u8, (y % 256) as u8, 128])
        });
        let mut data = Vec::new();
        DynamicImage::ImageRgb8(img).write_to(&mut Cursor::new(&mut data), ImageFormat::Png).unwrap();
        CoverImage { data, media_type: "image/png".to_string() }
    }

    /// Decode a rendered data URL back into pixel dimensions.
    fn rendered_dimensions(url: &str) -> (u32, u32) {
        let encoded = url.strip_prefix(DATA_URL_PREFIX).expect("jpeg data url");
        let jpeg = BASE64.decode(encoded).unwrap();
        image::load_from_memory(&jpeg).unwrap().dimensions()
    }

    #[rstest]
    #[case::landscape(600, 400, 300, 200)]
    #[case::portrait(400, 600, 200, 300)]
    #[case::square(512, 512, 300, 300)]
    #[case::exactly_at_cap(300, 150, 300, 150)]
    #[case::small_stays_small(120, 80, 120, 80)]
    fn test_wider_edge_capped(#[case] w: u32, #[case] h: u32, #[case] want_w: u32, #[case] want_h: u32) {
        let url = thumbnail(&png_cover(w, h)).expect("cover should render");
        assert_eq!(rendered_dimensions(&url), (want_w, want_h));
    }

    #[test]
    fn test_output_is_a_jpeg_data_url() {
        let url = thumbnail(&png_cover(10, 10)).unwrap();
        assert!(url.starts_with(DATA_URL_PREFIX));
    }

    #[test]
    fn test_alpha_is_flattened() {
        // JPEG encoding rejects a four-channel buffer outright.
        let img = RgbaImage::from_fn(40, 30, |_, _| Rgba([10, 20, 30, 128]));
        let mut data = Vec::new();
        DynamicImage::ImageRgba8(img).write_to(&mut Cursor::new(&mut data), ImageFormat::Png).unwrap();
        let cover = CoverImage { data, media_type: "image/png".to_string() };
        let url = thumbnail(&cover).expect("cover should render");
        assert_eq!(rendered_dimensions(&url), (40, 30));
    }

    #[test]
    fn test_deterministic_for_same_input() {
        let cover = png_cover(64, 64);
        assert_eq!(thumbnail(&cover), thumbnail(&cover));
    }

    #[rstest]
    #[case::empty(Vec::new())]
    #[case::garbage(b"definitely not an image".to_vec())]
    #[case::truncated_png({
        let mut data = png_cover(32, 32).data;
        data.truncate(data.len() / 2);
        data
    })]
    fn test_undecodable_cover_is_none(#[case] data: Vec<u8>) {
        let cover = CoverImage { data, media_type: "image/jpeg".to_string() };
        assert_eq!(thumbnail(&cover), None);
    }
}
