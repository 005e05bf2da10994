//! Image transform engine.
//!
//! Pure functions over bytes: probe an image's header, and produce a
//! width-constrained JPEG rendition together with the hash of the encoded
//! output. Nothing here touches the filesystem.

pub mod hash;

use std::io::Cursor;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, ImageReader};

use crate::error::TransformError;

pub use hash::content_hash;

/// JPEG quality used for every variant.
pub const JPEG_QUALITY: u8 = 90;

/// File extension of every encoded variant.
pub const VARIANT_EXTENSION: &str = "jpg";

/// Header-level facts about a source image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageInfo {
    pub width: u32,
    pub height: u32,
    pub format: ImageFormat,
}

/// One encoded rendition.
#[derive(Debug, Clone)]
pub struct TransformedImage {
    pub bytes: Vec<u8>,
    pub content_hash: String,
    pub width: u32,
    pub height: u32,
}

/// Reads format and dimensions without decoding pixel data.
pub fn probe(bytes: &[u8]) -> Result<ImageInfo, TransformError> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| TransformError::UnprocessableImage(e.to_string()))?;

    let format = reader.format().ok_or_else(|| {
        TransformError::UnprocessableImage("unrecognized image format".to_string())
    })?;

    let (width, height) = reader
        .into_dimensions()
        .map_err(|e| TransformError::UnprocessableImage(e.to_string()))?;

    if width == 0 || height == 0 {
        return Err(TransformError::UnprocessableImage(format!(
            "image has no usable dimensions ({}x{})",
            width, height
        )));
    }

    Ok(ImageInfo {
        width,
        height,
        format,
    })
}

/// Target dimensions for a width-constrained resize. Never upscales.
pub fn target_dimensions(width: u32, height: u32, target_width: u32) -> (u32, u32) {
    if target_width >= width {
        return (width, height);
    }
    let scaled = (height as f64 * target_width as f64 / width as f64).round() as u32;
    (target_width, scaled.max(1))
}

/// Decodes the full source once so several widths can be rendered from it.
pub fn decode(source: &[u8]) -> Result<DynamicImage, TransformError> {
    let info = probe(source)?;
    image::load_from_memory_with_format(source, info.format)
        .map_err(|e| TransformError::UnprocessableImage(e.to_string()))
}

/// Resizes a decoded image to `target_width` (aspect preserved) and encodes
/// it as JPEG at [`JPEG_QUALITY`].
pub fn render(img: &DynamicImage, target_width: u32) -> Result<TransformedImage, TransformError> {
    let _span = tracing::debug_span!("render", target_width).entered();

    let (width, height) = target_dimensions(img.width(), img.height(), target_width);

    // JPEG has no alpha channel; flatten everything to 8-bit RGB.
    let rgb = if width == img.width() {
        img.to_rgb8()
    } else {
        img.resize_exact(width, height, FilterType::Lanczos3).to_rgb8()
    };

    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY)
        .encode_image(&rgb)
        .map_err(|e| TransformError::Encode {
            width: target_width,
            reason: e.to_string(),
        })?;

    let content_hash = content_hash(&bytes);

    Ok(TransformedImage {
        bytes,
        content_hash,
        width,
        height,
    })
}

/// [`decode`] then [`render`] for a single width.
pub fn transform(source: &[u8], target_width: u32) -> Result<TransformedImage, TransformError> {
    render(&decode(source)?, target_width)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_probe_png() {
        let bytes = test_images::rgb(64, 32, ImageFormat::Png);
        let info = probe(&bytes).unwrap();
        assert_eq!(info.width, 64);
        assert_eq!(info.height, 32);
        assert_eq!(info.format, ImageFormat::Png);
    }

    #[test]
    fn test_probe_rejects_text() {
        let result = probe(b"definitely not an image");
        assert!(matches!(result, Err(TransformError::UnprocessableImage(_))));
    }

    #[test]
    fn test_probe_rejects_truncated_header() {
        let bytes = test_images::rgb(64, 32, ImageFormat::Png);
        let result = probe(&bytes[..12]);
        assert!(matches!(result, Err(TransformError::UnprocessableImage(_))));
    }

    #[test]
    fn test_target_dimensions_preserves_aspect() {
        assert_eq!(target_dimensions(2000, 1000, 800), (800, 400));
        assert_eq!(target_dimensions(1000, 333, 500), (500, 167));
    }

    #[test]
    fn test_target_dimensions_never_upscales() {
        assert_eq!(target_dimensions(640, 480, 1024), (640, 480));
        assert_eq!(target_dimensions(640, 480, 640), (640, 480));
    }

    #[test]
    fn test_target_dimensions_keeps_at_least_one_row() {
        assert_eq!(target_dimensions(10_000, 1, 100), (100, 1));
    }

    #[test]
    fn test_transform_downscales_to_jpeg() {
        let bytes = test_images::rgb(200, 100, ImageFormat::Png);
        let out = transform(&bytes, 50).unwrap();

        assert_eq!((out.width, out.height), (50, 25));
        let info = probe(&out.bytes).unwrap();
        assert_eq!(info.format, ImageFormat::Jpeg);
        assert_eq!((info.width, info.height), (50, 25));
        assert_eq!(out.content_hash, content_hash(&out.bytes));
    }

    #[test]
    fn test_transform_is_deterministic() {
        let bytes = test_images::rgb(120, 90, ImageFormat::Jpeg);
        let a = transform(&bytes, 60).unwrap();
        let b = transform(&bytes, 60).unwrap();
        assert_eq!(a.content_hash, b.content_hash);
        assert_eq!(a.bytes, b.bytes);
    }

    #[test]
    fn test_transform_different_widths_differ() {
        let bytes = test_images::rgb(120, 90, ImageFormat::Png);
        let a = transform(&bytes, 60).unwrap();
        let b = transform(&bytes, 30).unwrap();
        assert_ne!(a.content_hash, b.content_hash);
    }

    #[test]
    fn test_transform_does_not_upscale() {
        let bytes = test_images::rgb(40, 30, ImageFormat::Png);
        let out = transform(&bytes, 1024).unwrap();
        assert_eq!((out.width, out.height), (40, 30));
    }

    #[test]
    fn test_transform_flattens_alpha() {
        let bytes = test_images::rgba_png(32, 32);
        let out = transform(&bytes, 16).unwrap();
        assert_eq!(probe(&out.bytes).unwrap().format, ImageFormat::Jpeg);
    }

    #[test]
    fn test_transform_rejects_garbage() {
        let result = transform(b"GIF89a but not really", 100);
        assert!(matches!(result, Err(TransformError::UnprocessableImage(_))));
    }

    #[test]
    fn test_render_from_one_decode_matches_transform() {
        let bytes = test_images::rgb(300, 200, ImageFormat::Png);
        let decoded = decode(&bytes).unwrap();

        for width in [240, 120, 600] {
            let rendered = render(&decoded, width).unwrap();
            let direct = transform(&bytes, width).unwrap();
            assert_eq!(rendered.content_hash, direct.content_hash);
            assert_eq!((rendered.width, rendered.height), (direct.width, direct.height));
        }
    }

    #[test]
    fn test_decode_rejects_text() {
        assert!(matches!(
            decode(b"plain text"),
            Err(TransformError::UnprocessableImage(_))
        ));
    }
}
