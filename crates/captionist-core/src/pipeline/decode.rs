//! Decode-once image preparation.
//!
//! An upload is decoded exactly once. From that single bitmap we derive:
//! the canonical JPEG sent to caption providers, an EXIF-free re-encode of
//! the original for storage, and the thumbnail.

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat};
use std::io::Cursor;
use std::time::Duration;
use tokio::time::timeout;

use super::thumbnail::ThumbnailGenerator;
use crate::config::{LimitsConfig, ThumbnailConfig};
use crate::error::ImageError;

/// JPEG quality of the canonical provider payload. Fixed so identical
/// uploads always produce identical provider bytes.
pub const CANONICAL_JPEG_QUALITY: u8 = 90;

/// JPEG quality used when re-encoding stored originals.
const ORIGINAL_JPEG_QUALITY: u8 = 95;

/// An image in the canonical form every provider receives.
#[derive(Debug, Clone)]
pub struct NormalizedImage {
    /// RGB8 bitmap, longest edge within the configured limit
    pub image: DynamicImage,
    /// Deterministic JPEG encoding of `image`
    pub jpeg: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Everything derived from one decode of an upload.
#[derive(Debug, Clone)]
pub struct PreparedImage {
    pub normalized: NormalizedImage,
    /// The original re-encoded in its own format, with metadata stripped
    pub sanitized_original: Vec<u8>,
    /// JPEG thumbnail bytes
    pub thumbnail: Vec<u8>,
}

/// Decodes uploads and derives provider, storage, and thumbnail encodings.
pub struct ImageNormalizer {
    limits: LimitsConfig,
    thumbnails: ThumbnailGenerator,
}

impl ImageNormalizer {
    pub fn new(limits: LimitsConfig, thumbnail: ThumbnailConfig) -> Self {
        Self {
            limits,
            thumbnails: ThumbnailGenerator::new(thumbnail),
        }
    }

    /// Decode and prepare an upload on a blocking thread, bounded by the decode timeout.
    pub async fn prepare(
        &self,
        bytes: Vec<u8>,
        format: ImageFormat,
    ) -> Result<PreparedImage, ImageError> {
        let max_dimension = self.limits.max_image_dimension;
        let thumbnails = self.thumbnails.clone();
        let timeout_duration = Duration::from_millis(self.limits.decode_timeout_ms);

        let result = timeout(timeout_duration, async move {
            tokio::task::spawn_blocking(move || {
                prepare_sync(&bytes, format, max_dimension, &thumbnails)
            })
            .await
        })
        .await;

        match result {
            Ok(Ok(prepared)) => prepared,
            Ok(Err(e)) => Err(ImageError::Decode(format!("Task join error: {e}"))),
            Err(_) => Err(ImageError::Timeout {
                timeout_ms: self.limits.decode_timeout_ms,
            }),
        }
    }
}

/// Synchronous preparation (runs in spawn_blocking).
pub(crate) fn prepare_sync(
    bytes: &[u8],
    format: ImageFormat,
    max_dimension: u32,
    thumbnails: &ThumbnailGenerator,
) -> Result<PreparedImage, ImageError> {
    let decoded = decode_bytes(bytes)?;
    let sanitized_original = encode_as(&decoded, format)?;
    let thumbnail = thumbnails.generate_bytes(&decoded)?;
    let normalized = normalize(decoded, max_dimension)?;

    Ok(PreparedImage {
        normalized,
        sanitized_original,
        thumbnail,
    })
}

/// Decode bytes, detecting the format by content.
pub fn decode_bytes(bytes: &[u8]) -> Result<DynamicImage, ImageError> {
    let reader = image::ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .map_err(|e| ImageError::Decode(format!("Cannot detect image format: {e}")))?;
    reader.decode().map_err(|e| ImageError::Decode(e.to_string()))
}

/// Convert to RGB8, bound the longest edge, and encode the canonical JPEG.
pub fn normalize(image: DynamicImage, max_dimension: u32) -> Result<NormalizedImage, ImageError> {
    let (width, height) = image.dimensions();
    let image = if width.max(height) > max_dimension {
        image.resize(max_dimension, max_dimension, FilterType::Lanczos3)
    } else {
        image
    };
    let image = DynamicImage::ImageRgb8(image.to_rgb8());
    let jpeg = encode_jpeg(&image, CANONICAL_JPEG_QUALITY)?;
    let (width, height) = image.dimensions();

    Ok(NormalizedImage {
        image,
        jpeg,
        width,
        height,
    })
}

/// Encode as JPEG at a fixed quality. Alpha is dropped.
pub fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>, ImageError> {
    let rgb = image.to_rgb8();
    let mut buffer = Vec::new();
    {
        let mut encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
        encoder
            .encode_image(&rgb)
            .map_err(|e| ImageError::Encode(e.to_string()))?;
    }
    Ok(buffer)
}

fn encode_as(image: &DynamicImage, format: ImageFormat) -> Result<Vec<u8>, ImageError> {
    match format {
        ImageFormat::Png => {
            let mut buffer = Cursor::new(Vec::new());
            image
                .write_to(&mut buffer, ImageFormat::Png)
                .map_err(|e| ImageError::Encode(e.to_string()))?;
            Ok(buffer.into_inner())
        }
        _ => encode_jpeg(image, ORIGINAL_JPEG_QUALITY),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgba, RgbaImage};

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            width,
            height,
            Rgba([200, 30, 30, 128]),
        ));
        let mut buffer = Cursor::new(Vec::new());
        img.write_to(&mut buffer, ImageFormat::Png).unwrap();
        buffer.into_inner()
    }

    #[test]
    fn test_normalize_downscales_long_edge() {
        let img = DynamicImage::new_rgb8(3000, 1500);
        let normalized = normalize(img, 2048).unwrap();
        assert_eq!(normalized.width, 2048);
        assert_eq!(normalized.height, 1024);
        assert_eq!(&normalized.jpeg[0..3], &[0xFF, 0xD8, 0xFF]);
    }

    #[test]
    fn test_normalize_keeps_small_images() {
        let normalized = normalize(DynamicImage::new_rgb8(64, 48), 2048).unwrap();
        assert_eq!((normalized.width, normalized.height), (64, 48));
    }

    #[test]
    fn test_canonical_encoding_is_deterministic() {
        let bytes = png_bytes(40, 30);
        let a = normalize(decode_bytes(&bytes).unwrap(), 2048).unwrap();
        let b = normalize(decode_bytes(&bytes).unwrap(), 2048).unwrap();
        assert_eq!(a.jpeg, b.jpeg);
    }

    #[test]
    fn test_prepare_sync_png_keeps_png_original() {
        let bytes = png_bytes(500, 250);
        let thumbnails = ThumbnailGenerator::new(ThumbnailConfig {
            size: 100,
            quality: 80,
        });
        let prepared = prepare_sync(&bytes, ImageFormat::Png, 2048, &thumbnails).unwrap();

        assert_eq!(&prepared.sanitized_original[0..4], &[0x89, b'P', b'N', b'G']);
        assert_eq!(&prepared.thumbnail[0..3], &[0xFF, 0xD8, 0xFF]);
        assert_eq!(prepared.normalized.width, 500);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = decode_bytes(&[0xFF, 0xD8, 0xFF, 0x00, 0x01]).unwrap_err();
        assert!(matches!(err, ImageError::Decode(_)));
    }

    #[tokio::test]
    async fn test_prepare_async() {
        let normalizer = ImageNormalizer::new(LimitsConfig::default(), ThumbnailConfig::default());
        let prepared = normalizer
            .prepare(png_bytes(20, 20), ImageFormat::Png)
            .await
            .unwrap();
        assert_eq!(prepared.normalized.height, 20);
    }
}
