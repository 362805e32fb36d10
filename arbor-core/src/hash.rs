//! Fixed-size digest values shared by trees, nodes and paths.

use std::fmt;

use serde::de::{self, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::TreeError;

/// A digest of exactly `N` bytes. Digests of different sizes are distinct types.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Hash<const N: usize> {
    bytes: [u8; N],
}

pub type Hash256 = Hash<32>;
pub type Hash384 = Hash<48>;
pub type Hash512 = Hash<64>;

impl<const N: usize> Hash<N> {
    pub const fn new(bytes: [u8; N]) -> Self {
        Self { bytes }
    }

    /// The all-zero digest.
    pub const fn zero() -> Self {
        Self { bytes: [0u8; N] }
    }

    pub fn as_bytes(&self) -> &[u8; N] {
        &self.bytes
    }

    pub fn to_bytes(self) -> [u8; N] {
        self.bytes
    }

    /// Read a digest from a slice of exactly `N` bytes.
    pub fn from_slice(data: &[u8]) -> Result<Self, TreeError> {
        let bytes: [u8; N] = data.try_into().map_err(|_| {
            TreeError::MalformedData(format!(
                "digest length: expected {}, got {}",
                N,
                data.len()
            ))
        })?;
        Ok(Self { bytes })
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    pub fn from_hex(s: &str) -> Result<Self, TreeError> {
        let raw = hex::decode(s).map_err(|e| TreeError::MalformedData(e.to_string()))?;
        Self::from_slice(&raw)
    }

    /// Hex rendering of the first `len` bytes, for compact debug output.
    pub fn to_string_prefix(&self, len: usize) -> String {
        hex::encode(&self.bytes[..len.min(N)])
    }
}

impl<const N: usize> Default for Hash<N> {
    fn default() -> Self {
        Self::zero()
    }
}

impl<const N: usize> From<[u8; N]> for Hash<N> {
    fn from(bytes: [u8; N]) -> Self {
        Self { bytes }
    }
}

impl<const N: usize> AsRef<[u8]> for Hash<N> {
    fn as_ref(&self) -> &[u8] {
        &self.bytes
    }
}

impl<const N: usize> fmt::Display for Hash<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl<const N: usize> fmt::Debug for Hash<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash<{}>({})", N, self.to_hex())
    }
}

impl<const N: usize> Serialize for Hash<N> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_hex())
        } else {
            serializer.serialize_bytes(&self.bytes)
        }
    }
}

struct HashVisitor<const N: usize>;

impl<'de, const N: usize> Visitor<'de> for HashVisitor<N> {
    type Value = Hash<N>;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a {}-byte digest", N)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
        Hash::from_hex(v).map_err(E::custom)
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Self::Value, E> {
        Hash::from_slice(v).map_err(E::custom)
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Self::Value, A::Error> {
        let mut bytes = [0u8; N];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = seq
                .next_element()?
                .ok_or_else(|| de::Error::invalid_length(i, &self))?;
        }
        Ok(Hash::new(bytes))
    }
}

impl<'de, const N: usize> Deserialize<'de> for Hash<N> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            deserializer.deserialize_str(HashVisitor::<N>)
        } else {
            deserializer.deserialize_bytes(HashVisitor::<N>)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_roundtrip() {
        let mut bytes = [0u8; 32];
        bytes[0] = 0xAB;
        bytes[31] = 0x01;
        let h = Hash256::new(bytes);

        let hex = h.to_hex();
        assert_eq!(hex.len(), 64);
        assert!(hex.starts_with("ab"));
        assert_eq!(Hash256::from_hex(&hex).unwrap(), h);
        assert_eq!(h.to_string(), hex);
    }

    #[test]
    fn test_from_slice_wrong_length() {
        assert!(Hash256::from_slice(&[0u8; 31]).is_err());
        assert!(Hash256::from_slice(&[0u8; 48]).is_err());
        assert!(Hash384::from_slice(&[0u8; 48]).is_ok());
    }

    #[test]
    fn test_from_hex_rejects_wrong_size() {
        let h = Hash384::new([7u8; 48]);
        assert!(Hash256::from_hex(&h.to_hex()).is_err());
        assert!(Hash256::from_hex("zz").is_err());
    }

    #[test]
    fn test_prefix_rendering() {
        let h = Hash::<4>::new([0xDE, 0xAD, 0xBE, 0xEF]);
        assert_eq!(h.to_string_prefix(2), "dead");
        assert_eq!(h.to_string_prefix(10), "deadbeef");
        assert_eq!(h.to_string_prefix(0), "");
    }

    #[test]
    fn test_default_is_zero() {
        assert_eq!(Hash512::default(), Hash512::zero());
        assert_eq!(Hash512::default().as_bytes(), &[0u8; 64]);
    }

    #[test]
    fn test_bincode_roundtrip() {
        let h = Hash512::new([0x5A; 64]);
        let bytes = bincode::serialize(&h).unwrap();
        let decoded: Hash512 = bincode::deserialize(&bytes).unwrap();
        assert_eq!(decoded, h);
    }

    #[test]
    fn test_bincode_rejects_short_digest() {
        let short = Hash::<16>::new([1u8; 16]);
        let bytes = bincode::serialize(&short).unwrap();
        let result: std::result::Result<Hash256, _> = bincode::deserialize(&bytes);
        assert!(result.is_err());
    }
}
