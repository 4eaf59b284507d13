//! 32-byte digest used for transaction ids, proof references and the audit chain.

use crate::error::TypesError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// A 32-byte Blake2b-256 digest.
///
/// Serialized as a hex string in human-readable formats (JSON, TOML) and as
/// raw bytes otherwise.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hash256([u8; 32]);

impl Hash256 {
    pub const ZERO: Self = Self([0u8; 32]);

    pub fn new(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    /// Parse a 64-character lowercase or uppercase hex string.
    pub fn from_hex(s: &str) -> Result<Self, TypesError> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s, &mut bytes).map_err(|_| TypesError::InvalidHash(s.to_string()))?;
        Ok(Self(bytes))
    }

    /// Short form for log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl Default for Hash256 {
    fn default() -> Self {
        Self::ZERO
    }
}

impl fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash256({})", self.short())
    }
}

impl fmt::Display for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(&self.0))
    }
}

impl Serialize for Hash256 {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_string())
        } else {
            self.0.serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for Hash256 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            Self::from_hex(&s).map_err(serde::de::Error::custom)
        } else {
            <[u8; 32]>::deserialize(deserializer).map(Self)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_display_parses_back() {
        let hash = Hash256::new([0xab; 32]);
        assert_eq!(Hash256::from_hex(&hash.to_string()).unwrap(), hash);
        assert_eq!(hash.short(), "abababab");
    }

    #[test]
    fn human_readable_formats_use_hex() {
        #[derive(Serialize, Deserialize)]
        struct Wrap {
            h: Hash256,
        }
        let hash = Hash256::new([0x01; 32]);
        let text = toml::to_string(&Wrap { h: hash }).unwrap();
        assert!(text.contains(&"01".repeat(32)));
        let back: Wrap = toml::from_str(&text).unwrap();
        assert_eq!(back.h, hash);
    }

    #[test]
    fn malformed_hex_is_rejected() {
        assert!(Hash256::from_hex("zz").is_err());
        assert!(Hash256::from_hex(&"ab".repeat(31)).is_err());
    }
}
