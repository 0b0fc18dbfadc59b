//! Content hashing for uploaded images.

use blake3::Hasher as Blake3Hasher;

/// BLAKE3 hash of an in-memory upload, hex encoded.
pub fn content_hash(data: &[u8]) -> String {
    let mut hasher = Blake3Hasher::new();
    hasher.update(data);
    hasher.finalize().to_hex().to_string()
}
