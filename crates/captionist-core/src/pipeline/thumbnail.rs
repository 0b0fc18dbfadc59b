//! Thumbnail generation with JPEG output.

use image::DynamicImage;

use super::decode::encode_jpeg;
use crate::config::ThumbnailConfig;
use crate::error::ImageError;

/// Generates thumbnails from images.
#[derive(Debug, Clone)]
pub struct ThumbnailGenerator {
    config: ThumbnailConfig,
}

impl ThumbnailGenerator {
    /// Create a new thumbnail generator with the given configuration.
    pub fn new(config: ThumbnailConfig) -> Self {
        Self { config }
    }

    /// Generate a thumbnail and return the JPEG bytes.
    ///
    /// Resizes maintaining aspect ratio so the longest edge equals `config.size`.
    /// Images already smaller than that are only re-encoded.
    pub fn generate_bytes(&self, image: &DynamicImage) -> Result<Vec<u8>, ImageError> {
        if image.width().max(image.height()) <= self.config.size {
            return encode_jpeg(image, self.config.quality);
        }
        let thumbnail = image.thumbnail(self.config.size, self.config.size);
        encode_jpeg(&thumbnail, self.config.quality)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::GenericImageView;

    #[test]
    fn test_thumbnail_generation() {
        let generator = ThumbnailGenerator::new(ThumbnailConfig {
            size: 128,
            quality: 80,
        });

        let img = DynamicImage::new_rgb8(1000, 500);
        let bytes = generator.generate_bytes(&img).unwrap();

        // JPEG files start with FF D8 FF
        assert_eq!(&bytes[0..3], &[0xFF, 0xD8, 0xFF]);
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.dimensions(), (128, 64));
    }

    #[test]
    fn test_thumbnail_of_small_image_keeps_size() {
        let generator = ThumbnailGenerator::new(ThumbnailConfig::default());
        let img = DynamicImage::new_rgb8(40, 20);
        let bytes = generator.generate_bytes(&img).unwrap();
        let decoded = image::load_from_memory(&bytes).unwrap();
        assert_eq!(decoded.dimensions(), (40, 20));
    }
}
