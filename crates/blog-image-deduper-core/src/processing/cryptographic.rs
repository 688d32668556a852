//! Content hashing of stored objects.

/// Blake3 hash of an object's bytes, as lowercase hex
pub fn content_hash(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}
