//! Content digests for cached page blobs.

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of a page blob.
pub fn page_digest(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}
