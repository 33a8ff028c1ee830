#![deny(unreachable_pub)]

//! Thumbnail Action (§4.11): decode a PNG or JPEG, resize to a requested
//! width preserving aspect ratio, re-encode as JPEG, and hand back the
//! Base64-encoded bytes. Decoding and encoding are CPU-bound, so they run
//! on a blocking thread while the async worker is free to do other work.

use std::path::Path;

use base64::Engine;
use image::imageops::FilterType;

pub const DEFAULT_THUMBNAIL_WIDTH: u32 = 100;
const JPEG_QUALITY: u8 = 70;

#[derive(Debug, thiserror::Error)]
pub enum ThumbnailError {
    #[error("failed to read image file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to decode or encode image: {0}")]
    Image(#[from] image::ImageError),
    #[error("thumbnail generation task did not complete")]
    WorkerPanicked,
}

/// Reads `path`, decodes it as PNG or JPEG, resizes to `width` (or
/// [`DEFAULT_THUMBNAIL_WIDTH`]) preserving aspect ratio, re-encodes as JPEG
/// at quality 70, and returns the Base64-encoded result.
pub async fn generate_thumbnail_base64(path: &Path, width: Option<u32>) -> Result<String, ThumbnailError> {
    let bytes = tokio::fs::read(path).await?;
    let width = width.unwrap_or(DEFAULT_THUMBNAIL_WIDTH).max(1);

    tokio::task::spawn_blocking(move || encode_thumbnail(&bytes, width))
        .await
        .map_err(|_| ThumbnailError::WorkerPanicked)?
}

fn encode_thumbnail(bytes: &[u8], width: u32) -> Result<String, ThumbnailError> {
    let image = image::load_from_memory(bytes)?;
    let source_width = image.width().max(1);
    let height = ((image.height() as u64 * width as u64) / source_width as u64).max(1) as u32;
    let resized = image.resize_exact(width, height, FilterType::Lanczos3);

    let mut out = Vec::new();
    let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY);
    resized.write_with_encoder(encoder)?;

    Ok(base64::engine::general_purpose::STANDARD.encode(&out))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{DynamicImage, RgbImage};

    fn write_test_png(path: &Path, width: u32, height: u32) {
        let image = DynamicImage::ImageRgb8(RgbImage::new(width, height));
        image.save_with_format(path, image::ImageFormat::Png).unwrap();
    }

    #[tokio::test]
    async fn resizes_preserving_aspect_ratio_and_reencodes_as_jpeg() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("source.png");
        write_test_png(&path, 200, 100);

        let encoded = generate_thumbnail_base64(&path, Some(50)).await.unwrap();
        let bytes = base64::engine::general_purpose::STANDARD.decode(&encoded).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.width(), 50);
        assert_eq!(decoded.height(), 25);
    }

    #[tokio::test]
    async fn default_width_is_used_when_none_given() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("source.png");
        write_test_png(&path, 400, 400);

        let encoded = generate_thumbnail_base64(&path, None).await.unwrap();
        let bytes = base64::engine::general_purpose::STANDARD.decode(&encoded).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.width(), DEFAULT_THUMBNAIL_WIDTH);
    }

    #[tokio::test]
    async fn missing_file_produces_an_io_error() {
        let result = generate_thumbnail_base64(Path::new("/tmp/does-not-exist.png"), None).await;
        assert!(matches!(result, Err(ThumbnailError::Io(_))));
    }

    #[tokio::test]
    async fn unsupported_bytes_produce_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("not-an-image.png");
        tokio::fs::write(&path, b"not an image at all").await.unwrap();

        let result = generate_thumbnail_base64(&path, None).await;
        assert!(matches!(result, Err(ThumbnailError::Image(_))));
    }
}
