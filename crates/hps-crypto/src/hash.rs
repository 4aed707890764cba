use hps_core::ContentHash;
use sha2::{Digest, Sha256};

/// Compute SHA-256 of arbitrary bytes → 32-byte array.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// SHA-256 as lowercase hex.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}

/// Derive a ContentHash from the canonical framed blob bytes.
pub fn content_hash_of(framed: &[u8]) -> ContentHash {
    ContentHash::from_bytes(sha256(framed))
}
