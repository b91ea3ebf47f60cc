// File: wlroot-hash/src/lib.rs
use core::fmt;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use sha3::{Digest as _, Keccak256};
use thiserror::Error;

pub const DIGEST_LEN: usize = 32; // 256-bit output

#[derive(Debug, Error, Clone, PartialEq)]
pub enum HashError {
    #[error("digest must be {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("invalid hex digest: {0}")]
    InvalidHex(#[from] hex::FromHexError),
}

/// A Keccak-256 output. Ordering is byte-lexicographic, which is the order
/// used for both leaf sorting and sorted-pair hashing.
#[derive(Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Digest([u8; DIGEST_LEN]);

impl Digest {
    #[inline]
    pub const fn new(bytes: [u8; DIGEST_LEN]) -> Self { Digest(bytes) }

    pub fn from_slice(bytes: &[u8]) -> Result<Self, HashError> {
        let arr: [u8; DIGEST_LEN] = bytes.try_into().map_err(|_| HashError::InvalidLength {
            expected: DIGEST_LEN,
            actual: bytes.len(),
        })?;
        Ok(Digest(arr))
    }

    /// Accepts an optional `0x` prefix.
    pub fn from_hex(s: &str) -> Result<Self, HashError> {
        let s = s.trim();
        let s = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")).unwrap_or(s);
        let bytes = hex::decode(s)?;
        Self::from_slice(&bytes)
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] { &self.0 }

    #[inline]
    pub fn to_vec(&self) -> Vec<u8> { self.0.to_vec() }
}

impl AsRef<[u8]> for Digest {
    fn as_ref(&self) -> &[u8] { &self.0 }
}

impl From<[u8; DIGEST_LEN]> for Digest {
    fn from(bytes: [u8; DIGEST_LEN]) -> Self { Digest(bytes) }
}

impl TryFrom<&[u8]> for Digest {
    type Error = HashError;
    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> { Self::from_slice(bytes) }
}

impl core::str::FromStr for Digest {
    type Err = HashError;
    fn from_str(s: &str) -> Result<Self, Self::Err> { Self::from_hex(s) }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(&self.to_hex()) }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}

// Hex string for human-readable formats, raw bytes otherwise (bincode).
impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_hex())
        } else {
            serializer.serialize_bytes(&self.0)
        }
    }
}

struct DigestVisitor;

impl<'de> de::Visitor<'de> for DigestVisitor {
    type Value = Digest;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "a {}-byte digest as bytes or hex string", DIGEST_LEN)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Digest, E> {
        Digest::from_hex(v).map_err(E::custom)
    }

    fn visit_bytes<E: de::Error>(self, v: &[u8]) -> Result<Digest, E> {
        Digest::from_slice(v).map_err(E::custom)
    }

    fn visit_seq<A: de::SeqAccess<'de>>(self, mut seq: A) -> Result<Digest, A::Error> {
        let mut out = [0u8; DIGEST_LEN];
        for (i, slot) in out.iter_mut().enumerate() {
            *slot = seq.next_element()?.ok_or_else(|| de::Error::invalid_length(i, &self))?;
        }
        Ok(Digest(out))
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            deserializer.deserialize_str(DigestVisitor)
        } else {
            deserializer.deserialize_bytes(DigestVisitor)
        }
    }
}

/// Ethereum Keccak-256 (pre-NIST padding), used for leaves and inner nodes alike.
#[inline]
pub fn keccak256(data: &[u8]) -> Digest {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    Digest(hasher.finalize().into())
}

/// `keccak256(min(a, b) || max(a, b))`
#[inline]
pub fn hash_sorted_pair(a: &Digest, b: &Digest) -> Digest {
    let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
    let mut hasher = Keccak256::new();
    hasher.update(lo.0);
    hasher.update(hi.0);
    Digest(hasher.finalize().into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keccak256_known_answers() {
        assert_eq!(
            keccak256(b"").to_hex(),
            "0xc5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
        assert_eq!(
            keccak256(b"abc").to_hex(),
            "0x4e03657aea45a94fc7d47ba826c8d667c0d1e6e33a64a036ec44f58fa12d6c45"
        );
    }

    #[test]
    fn sorted_pair_is_commutative_and_ordered() {
        let a = keccak256(b"a");
        let b = keccak256(b"b");
        assert_eq!(hash_sorted_pair(&a, &b), hash_sorted_pair(&b, &a));

        let (lo, hi) = if a < b { (a, b) } else { (b, a) };
        let mut buf = lo.to_vec();
        buf.extend_from_slice(hi.as_ref());
        assert_eq!(hash_sorted_pair(&a, &b), keccak256(&buf));
    }

    #[test]
    fn digest_hex_and_length_checks() {
        let d = keccak256(b"hello");
        assert_eq!(Digest::from_hex(&d.to_hex()).unwrap(), d);
        assert_eq!(Digest::from_hex(&d.to_hex()[2..]).unwrap(), d);
        assert_eq!(
            Digest::from_slice(&[0u8; 31]),
            Err(HashError::InvalidLength { expected: 32, actual: 31 })
        );
        assert!(matches!(Digest::from_hex("0xzz"), Err(HashError::InvalidHex(_))));
    }

    #[test]
    fn digest_ordering_is_lexicographic() {
        let mut lo = [0u8; DIGEST_LEN];
        let mut hi = [0u8; DIGEST_LEN];
        lo[31] = 0xff;
        hi[0] = 0x01;
        assert!(Digest::new(lo) < Digest::new(hi));
    }

    #[test]
    fn digest_bincode_roundtrip() {
        let d = keccak256(b"x");
        let enc = bincode::serialize(&d).unwrap();
        let back: Digest = bincode::deserialize(&enc).unwrap();
        assert_eq!(back, d);
    }
}
