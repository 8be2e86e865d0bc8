//! Authorized SSH key parsing

use base64::Engine;
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

const KEY_TYPE_PREFIXES: &[&str] = &["ssh-", "ecdsa-", "sk-"];

/// A parsed `authorized_keys` line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizedKey {
    pub key_type: String,
    pub blob: Vec<u8>,
    pub comment: String,
}

impl AuthorizedKey {
    pub fn parse(payload: &str) -> Result<Self> {
        let mut fields = payload.split_whitespace();
        let key_type = fields
            .next()
            .ok_or_else(|| Error::InvalidInput("empty SSH key".to_string()))?;
        if !KEY_TYPE_PREFIXES.iter().any(|p| key_type.starts_with(p)) {
            return Err(Error::InvalidInput(format!("unsupported SSH key type {key_type:?}")));
        }
        let encoded = fields
            .next()
            .ok_or_else(|| Error::InvalidInput("SSH key is missing its key data".to_string()))?;
        let blob = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| Error::InvalidInput(format!("SSH key data is not valid base64: {e}")))?;
        let comment = fields.collect::<Vec<_>>().join(" ");

        Ok(Self {
            key_type: key_type.to_string(),
            blob,
            comment,
        })
    }

    /// Hex encoded SHA-256 of the key blob. Contains no `:`, so it can be
    /// embedded in composite IDs.
    pub fn fingerprint(&self) -> String {
        hex::encode(Sha256::digest(&self.blob))
    }
}

/// Fingerprint of an `authorized_keys` line.
pub fn fingerprint(payload: &str) -> Result<String> {
    Ok(AuthorizedKey::parse(payload)?.fingerprint())
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &str = "ssh-ed25519 AAAAC3NzaC1lZDI1NTE5AAAAIGr8dPLa7nH0KmGgBNnX1cKx8bGgqH6k2H3e3fJ5CbQK alice@laptop";

    #[test]
    fn test_parse_authorized_key() {
        let key = AuthorizedKey::parse(KEY).unwrap();
        assert_eq!(key.key_type, "ssh-ed25519");
        assert_eq!(key.comment, "alice@laptop");
        assert!(!key.blob.is_empty());
    }

    #[test]
    fn test_fingerprint_is_stable_and_colon_free() {
        let a = fingerprint(KEY).unwrap();
        let b = fingerprint(&format!("  {KEY}  ")).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(!a.contains(':'));
    }

    #[test]
    fn test_rejects_bad_keys() {
        assert!(AuthorizedKey::parse("").is_err());
        assert!(AuthorizedKey::parse("rsa AAAA").is_err());
        assert!(AuthorizedKey::parse("ssh-rsa").is_err());
        assert!(AuthorizedKey::parse("ssh-rsa not*base64").is_err());
    }
}
