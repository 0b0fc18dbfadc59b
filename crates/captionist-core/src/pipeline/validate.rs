//! Upload validation before any decoding happens.

use image::ImageFormat;

use crate::config::LimitsConfig;
use crate::error::ImageError;

/// Validates uploaded image payloads.
pub struct Validator {
    limits: LimitsConfig,
}

impl Validator {
    /// Create a new validator with the given limits.
    pub fn new(limits: LimitsConfig) -> Self {
        Self { limits }
    }

    /// Perform quick validation before full decode.
    ///
    /// Checks:
    /// - Payload is not empty
    /// - Payload size is within limits
    /// - Payload starts with JPEG or PNG magic bytes
    pub fn validate(&self, bytes: &[u8]) -> Result<ImageFormat, ImageError> {
        if bytes.is_empty() {
            return Err(ImageError::Empty);
        }

        let max_bytes = self
            .limits
            .max_image_size_mb
            .checked_mul(1024 * 1024)
            .unwrap_or(u64::MAX);
        if bytes.len() as u64 > max_bytes {
            return Err(ImageError::TooLarge {
                size_bytes: bytes.len() as u64,
                max_mb: self.limits.max_image_size_mb,
            });
        }

        detect_format(bytes).ok_or_else(|| {
            ImageError::UnsupportedFormat("only JPEG and PNG uploads are accepted".to_string())
        })
    }
}

/// Identify JPEG or PNG from the leading bytes.
pub fn detect_format(bytes: &[u8]) -> Option<ImageFormat> {
    // JPEG: FF D8 FF
    if bytes.len() >= 3 && bytes[0] == 0xFF && bytes[1] == 0xD8 && bytes[2] == 0xFF {
        return Some(ImageFormat::Jpeg);
    }

    // PNG: 89 50 4E 47
    if bytes.len() >= 4
        && bytes[0] == 0x89
        && bytes[1] == b'P'
        && bytes[2] == b'N'
        && bytes[3] == b'G'
    {
        return Some(ImageFormat::Png);
    }

    None
}

/// MIME type for an accepted upload format.
pub fn content_type(format: ImageFormat) -> &'static str {
    match format {
        ImageFormat::Png => "image/png",
        _ => "image/jpeg",
    }
}
