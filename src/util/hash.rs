//! Hashing utilities for rule digests.

use sha2::{Digest, Sha256};

/// Width in hex characters of a rule digest.
pub const RULE_DIGEST_LEN: usize = 32;

/// Compute SHA256 hash of a byte slice.
pub fn sha256_bytes(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Compute SHA256 hash of a string.
pub fn sha256_str(s: &str) -> String {
    sha256_bytes(s.as_bytes())
}

/// Digest of a generated build rule, [`RULE_DIGEST_LEN`] lowercase hex chars.
pub fn rule_digest(content: &str) -> String {
    let mut hash = sha256_str(content);
    hash.truncate(RULE_DIGEST_LEN);
    hash
}

/// Whether `s` looks like a rule digest.
pub fn is_rule_digest(s: &str) -> bool {
    s.len() == RULE_DIGEST_LEN && s.bytes().all(|b| b.is_ascii_hexdigit())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_str() {
        let hash = sha256_str("hello");
        assert_eq!(
            hash,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_rule_digest_width() {
        let digest = rule_digest("hello");
        assert_eq!(digest, "2cf24dba5fb0a30e26e83b2ac5b9e29e");
        assert!(is_rule_digest(&digest));
    }

    #[test]
    fn test_rule_digest_changes_with_content() {
        assert_ne!(rule_digest("cc -O2 a.c"), rule_digest("cc -O3 a.c"));
        assert!(!is_rule_digest("xyz"));
    }
}
