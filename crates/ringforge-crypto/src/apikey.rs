//! API key generation and hashing.
//!
//! Raw keys are never persisted. The directory stores the hex-encoded
//! SHA-256 hash and an 8-character display prefix; validation hashes the
//! presented key and compares in constant time.

use rand::Rng;
use rand::distributions::Alphanumeric;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use zeroize::Zeroizing;

/// Display prefix length kept alongside the hash.
pub const API_KEY_PREFIX_LEN: usize = 8;

const RAW_SUFFIX_LEN: usize = 24;

/// A freshly minted raw API key. Exists only at issuance time; the hub holds
/// the hash afterwards.
#[derive(Debug)]
pub struct RawApiKey {
    raw: Zeroizing<String>,
}

impl RawApiKey {
    /// Mint a key of the given kind tag (`live`, `test`, `admin`):
    /// `rf_{kind}_` + 24 base62 characters.
    #[must_use]
    pub fn generate(kind: &str) -> Self {
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(RAW_SUFFIX_LEN)
            .map(char::from)
            .collect();
        Self {
            raw: Zeroizing::new(format!("rf_{kind}_{suffix}")),
        }
    }

    /// Wrap an externally supplied raw key.
    #[must_use]
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self {
            raw: Zeroizing::new(raw.into()),
        }
    }

    /// The raw key string. Hand out once, then drop.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.raw
    }

    /// Hex-encoded SHA-256 of the raw key.
    #[must_use]
    pub fn hash(&self) -> String {
        hash_api_key(&self.raw)
    }

    /// The 8-character display prefix.
    #[must_use]
    pub fn prefix(&self) -> String {
        self.raw.chars().take(API_KEY_PREFIX_LEN).collect()
    }
}

/// Hex-encoded SHA-256 of a raw API key.
#[must_use]
pub fn hash_api_key(raw: &str) -> String {
    let digest = Sha256::digest(raw.as_bytes());
    hex::encode(digest)
}

/// Constant-time equality on two hex hash strings.
#[must_use]
pub fn hashes_equal(a: &str, b: &str) -> bool {
    a.as_bytes().ct_eq(b.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_key_shape() {
        let key = RawApiKey::generate("live");
        let raw = key.expose();
        assert!(raw.starts_with("rf_live_"));
        assert_eq!(raw.len(), "rf_live_".len() + RAW_SUFFIX_LEN);
        assert_eq!(key.prefix(), "rf_live_");
    }

    #[test]
    fn test_hash_is_sha256_hex() {
        let key = RawApiKey::from_raw("rf_live_AAAAAAAAAAAAAAAAAAAAAAAA");
        let hash = key.hash();
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, hash_api_key(key.expose()));
    }

    #[test]
    fn test_altered_byte_changes_hash() {
        let a = hash_api_key("rf_live_AAAAAAAAAAAAAAAAAAAAAAAA");
        let b = hash_api_key("rf_live_AAAAAAAAAAAAAAAAAAAAAAAB");
        assert_ne!(a, b);
        assert!(!hashes_equal(&a, &b));
        assert!(hashes_equal(&a, &a));
    }

    #[test]
    fn test_distinct_keys() {
        assert_ne!(
            RawApiKey::generate("live").hash(),
            RawApiKey::generate("live").hash()
        );
    }
}
