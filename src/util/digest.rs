// ============================================================================
// src/util/digest.rs – One-way secret digests for credential comparison
// ============================================================================

use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

/// Lower-case hex SHA-256 of `secret`, the format the credential store keeps.
pub fn secret_digest(secret: &str) -> Zeroizing<String> {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    Zeroizing::new(hex::encode(hasher.finalize()))
}

/// Compare two hex digests without short-circuiting on the first mismatch.
/// Case-insensitive so hand-edited upper-case digests still match.
pub fn digests_match(computed: &str, stored: &str) -> bool {
    let a = computed.as_bytes();
    let b = stored.trim().as_bytes();
    if a.len() != b.len() {
        return false;
    }
    a.iter()
        .zip(b)
        .fold(0u8, |acc, (x, y)| {
            acc | (x.to_ascii_lowercase() ^ y.to_ascii_lowercase())
        })
        == 0
}
