/// Refresh token fingerprints
///
/// Session rows store a SHA-256 of the refresh token, never the token
/// itself. Comparison is constant-time.

use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 of a token (64 chars)
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Checks a presented token against a stored fingerprint
pub fn verify_token_hash(token: &str, stored_hash: &str) -> bool {
    constant_time_eq(hash_token(token).as_bytes(), stored_hash.as_bytes())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_stable_hex() {
        let hash = hash_token("refresh-token");
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, hash_token("refresh-token"));
        assert_ne!(hash, hash_token("refresh-token2"));
    }

    #[test]
    fn test_verify_token_hash() {
        let hash = hash_token("abc");
        assert!(verify_token_hash("abc", &hash));
        assert!(!verify_token_hash("abd", &hash));
        assert!(!verify_token_hash("abc", "short"));
    }
}
