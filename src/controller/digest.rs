//! # Content Digest
//!
//! SHA-256 fingerprint of a rendered Secret's full `data` map. Entries are
//! hashed in sorted key order and every key and value is prefixed with its
//! length (u64, little-endian), so two maps hash equal exactly when their
//! content is equal.

use k8s_openapi::api::core::v1::Secret;
use k8s_openapi::ByteString;
use sha2::{Digest as _, Sha256};
use std::collections::BTreeMap;
use std::fmt;

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Digest([u8; 32]);

impl Digest {
    /// Digest of a Secret with no data
    pub fn empty() -> Self {
        digest(&BTreeMap::new())
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{byte:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({self})")
    }
}

pub fn digest(data: &BTreeMap<String, ByteString>) -> Digest {
    let mut hasher = Sha256::new();
    for (key, value) in data {
        hasher.update((key.len() as u64).to_le_bytes());
        hasher.update(key.as_bytes());
        hasher.update((value.0.len() as u64).to_le_bytes());
        hasher.update(&value.0);
    }
    Digest(hasher.finalize().into())
}

/// Digest of an existing Secret's `data`; a missing Secret hashes like an empty one
///
/// `stringData` is write-only on the API server and is never read back, so
/// only `data` takes part.
pub fn secret_digest(secret: Option<&Secret>) -> Digest {
    match secret.and_then(|s| s.data.as_ref()) {
        Some(data) => digest(data),
        None => Digest::empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bytes(value: &str) -> ByteString {
        ByteString(value.as_bytes().to_vec())
    }

    #[test]
    fn test_digest_ignores_insertion_order() {
        let mut first = BTreeMap::new();
        first.insert("b".to_string(), bytes("2"));
        first.insert("a".to_string(), bytes("1"));

        let mut second = BTreeMap::new();
        second.insert("a".to_string(), bytes("1"));
        second.insert("b".to_string(), bytes("2"));

        assert_eq!(digest(&first), digest(&second));
    }

    #[test]
    fn test_digest_changes_with_value() {
        let before = BTreeMap::from([("greeting".to_string(), bytes("Hello alice"))]);
        let after = BTreeMap::from([("greeting".to_string(), bytes("Hello bob"))]);
        assert_ne!(digest(&before), digest(&after));
    }

    #[test]
    fn test_digest_distinguishes_entry_boundaries() {
        let joined = BTreeMap::from([("ab".to_string(), bytes("c"))]);
        let split = BTreeMap::from([("a".to_string(), bytes("bc"))]);
        assert_ne!(digest(&joined), digest(&split));
    }

    #[test]
    fn test_missing_secret_matches_empty_data() {
        let secret = Secret {
            data: Some(BTreeMap::new()),
            ..Secret::default()
        };
        assert_eq!(secret_digest(None), Digest::empty());
        assert_eq!(secret_digest(Some(&secret)), Digest::empty());
        assert_eq!(secret_digest(Some(&Secret::default())), Digest::empty());
    }

    #[test]
    fn test_display_is_lowercase_hex() {
        let text = Digest::empty().to_string();
        assert_eq!(text.len(), 64);
        assert!(text.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        // sha256 of no input
        assert_eq!(
            text,
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
