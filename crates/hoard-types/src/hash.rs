use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::error::TypeError;

/// Number of characters in a [`Hash`].
pub const HASH_LEN: usize = 12;

/// Content identifier: the first 12 characters of the lowercase base32
/// encoding of the SHA-256 digest of the content.
///
/// Byte-identical payloads always produce the same `Hash`. It is used for
/// deduplication only and makes no integrity claims beyond collision
/// avoidance.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hash([u8; HASH_LEN]);

impl Hash {
    /// Compute the hash of raw bytes.
    pub fn of(data: &[u8]) -> Self {
        let digest = Sha256::digest(data);
        let encoded = data_encoding::BASE32_NOPAD.encode(&digest);
        let mut out = [0u8; HASH_LEN];
        for (slot, byte) in out.iter_mut().zip(encoded.bytes()) {
            *slot = byte.to_ascii_lowercase();
        }
        Self(out)
    }

    /// Hash the concatenation of several strings without allocating the
    /// joined buffer.
    pub fn of_strings<'a, I>(parts: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut hasher = Sha256::new();
        for part in parts {
            hasher.update(part.as_bytes());
        }
        let encoded = data_encoding::BASE32_NOPAD.encode(&hasher.finalize());
        let mut out = [0u8; HASH_LEN];
        for (slot, byte) in out.iter_mut().zip(encoded.bytes()) {
            *slot = byte.to_ascii_lowercase();
        }
        Self(out)
    }

    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0).expect("hash is ascii")
    }

    fn is_hash_char(b: u8) -> bool {
        b.is_ascii_lowercase() || (b'2'..=b'7').contains(&b)
    }
}

impl FromStr for Hash {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        if bytes.len() != HASH_LEN || !bytes.iter().all(|b| Self::is_hash_char(*b)) {
            return Err(TypeError::InvalidHash(s.to_string()));
        }
        let mut out = [0u8; HASH_LEN];
        out.copy_from_slice(bytes);
        Ok(Self(out))
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self.as_str())
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn known_value() {
        // SHA-256("") base32 begins 4OYMIQUY7QOBJGX3...
        assert_eq!(Hash::of(b"").as_str(), "4oymiquy7qob");
    }

    #[test]
    fn equal_content_equal_hash() {
        assert_eq!(Hash::of(b"payload"), Hash::of(b"payload"));
        assert_ne!(Hash::of(b"payload"), Hash::of(b"payload2"));
    }

    #[test]
    fn of_strings_matches_concatenation() {
        let joined = Hash::of(b"abcdef");
        let parts = Hash::of_strings(["ab", "cd", "ef"]);
        assert_eq!(joined, parts);
    }

    #[test]
    fn parse_rejects_bad_input() {
        assert!("short".parse::<Hash>().is_err());
        assert!("ABCDEFGHIJKL".parse::<Hash>().is_err());
        assert!("abcdefghijk1".parse::<Hash>().is_err());
        assert!("abcdefghijk2".parse::<Hash>().is_ok());
    }

    #[test]
    fn serde_as_plain_string() {
        let hash = Hash::of(b"serde");
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json, format!("\"{hash}\""));
        let back: Hash = serde_json::from_str(&json).unwrap();
        assert_eq!(back, hash);
    }

    proptest! {
        #[test]
        fn hash_always_parses_back(data in proptest::collection::vec(any::<u8>(), 0..256)) {
            let hash = Hash::of(&data);
            prop_assert_eq!(hash.as_str().len(), HASH_LEN);
            prop_assert_eq!(hash.as_str().parse::<Hash>().unwrap(), hash);
        }
    }
}
