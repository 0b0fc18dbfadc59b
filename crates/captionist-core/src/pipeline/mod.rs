//! Image handling for uploads.
//!
//! - **validate**: size and magic-byte checks (JPEG/PNG only)
//! - **decode**: decode once, derive canonical JPEG, sanitized original, thumbnail
//! - **thumbnail**: JPEG thumbnails
//! - **hash**: BLAKE3 content hashes
//! - **discovery**: find images in directories for batch captioning

pub mod decode;
pub mod discovery;
pub mod hash;
pub mod thumbnail;
pub mod validate;

pub use decode::{ImageNormalizer, NormalizedImage, PreparedImage};
pub use discovery::{discover, DiscoveredFile};
pub use hash::content_hash;
pub use thumbnail::ThumbnailGenerator;
pub use validate::Validator;
