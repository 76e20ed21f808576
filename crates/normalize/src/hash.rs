//! Fingerprinting for normalized text.
//!
//! # Algorithm
//!
//! ```text
//! SHA-256(version.to_be_bytes() || 0x00 || language || 0x1f || plain_text || 0x1e || scope)
//! ```
//!
//! - `version`: normalization version, so a behavior change never collides
//!   with results produced by an older normalizer
//! - `language`: the resolved language tag
//! - `scope`: opaque caller digest; the coordinator passes the effective rule
//!   profile so differently configured analyses get distinct keys
//!
//! The fingerprint is a lookup key only. It is never used as a credential.
//!
//! ```rust
//! use normalize::{hash_text, Fingerprint};
//!
//! let a = Fingerprint::compute(1, "en", "hello world", b"");
//! let b = Fingerprint::compute(1, "en", "hello world", b"");
//! assert_eq!(a, b);
//! assert_eq!(a.to_hex().len(), 64);
//! assert_ne!(a, Fingerprint::compute(2, "en", "hello world", b""));
//! assert_eq!(hash_text("hello").len(), 64);
//! ```

use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;

/// Fixed-length content hash used as the cache and storage key.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    pub const LEN: usize = 32;

    pub fn compute(version: u32, language: &str, text: &str, scope: &[u8]) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(version.to_be_bytes());
        hasher.update([0x00]);
        hasher.update(language.as_bytes());
        hasher.update([0x1f]);
        hasher.update(text.as_bytes());
        hasher.update([0x1e]);
        hasher.update(scope);
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&hasher.finalize());
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", &self.to_hex()[..12])
    }
}

impl FromStr for Fingerprint {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(Self(bytes))
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Fingerprint {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(DeError::custom)
    }
}

/// Hash arbitrary text with SHA-256 and return a hex digest.
///
/// Version-agnostic; used for keys that do not need a rule scope, such as
/// the rendered-HTML cache.
pub fn hash_text(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_changes_fingerprint() {
        let a = Fingerprint::compute(1, "en", "same text", b"profile-a");
        let b = Fingerprint::compute(1, "en", "same text", b"profile-b");
        assert_ne!(a, b);
    }

    #[test]
    fn language_changes_fingerprint() {
        let a = Fingerprint::compute(1, "en", "same text", b"");
        let b = Fingerprint::compute(1, "de", "same text", b"");
        assert_ne!(a, b);
    }

    #[test]
    fn separators_prevent_field_shifting() {
        let a = Fingerprint::compute(1, "en", "xtext", b"");
        let b = Fingerprint::compute(1, "enx", "text", b"");
        assert_ne!(a, b);
    }

    #[test]
    fn hex_parse_and_serde() {
        let fp = Fingerprint::compute(1, "en", "hello", b"");
        let parsed: Fingerprint = fp.to_hex().parse().unwrap();
        assert_eq!(parsed, fp);

        let json = serde_json::to_string(&fp).unwrap();
        assert_eq!(json, format!("\"{}\"", fp.to_hex()));
        let back: Fingerprint = serde_json::from_str(&json).unwrap();
        assert_eq!(back, fp);
    }

    #[test]
    fn bad_hex_rejected() {
        assert!("zz".parse::<Fingerprint>().is_err());
        assert!("abcd".parse::<Fingerprint>().is_err());
    }
}
