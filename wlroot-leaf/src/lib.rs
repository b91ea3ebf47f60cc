// File: wlroot-leaf/src/lib.rs
//! Packed leaf encoding for whitelist entries.
//!
//! The pre-image of a leaf is `address (20 bytes) || timestamp (32 bytes, big-endian)`,
//! the same bytes `solidityPack(["address", "uint256"], [addr, ts])` produces, so any
//! verifier that knows the layout can rebuild it without extra framing.
use core::fmt;
use core::str::FromStr;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use wlroot_hash::{keccak256, Digest};

pub const ADDRESS_LEN: usize = 20;
pub const TIMESTAMP_LEN: usize = 32;
pub const PREIMAGE_LEN: usize = ADDRESS_LEN + TIMESTAMP_LEN;

pub type Preimage = [u8; PREIMAGE_LEN];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodingError {
    #[error("identity must be {expected} bytes, got {actual}")]
    IdentityWidth { expected: usize, actual: usize },
    #[error("timestamp must be non-negative, got {0}")]
    NegativeTimestamp(i128),
    #[error("timestamp does not fit in {bits} bits")]
    TimestampOverflow { bits: usize },
    #[error("invalid timestamp {0:?}: expected decimal digits")]
    InvalidTimestamp(String),
    #[error("invalid address {0:?}: expected 40 hex digits")]
    InvalidAddress(String),
}

/// A 20-byte account address.
#[derive(Copy, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(pub [u8; ADDRESS_LEN]);

impl Address {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, EncodingError> {
        let arr: [u8; ADDRESS_LEN] = bytes.try_into().map_err(|_| EncodingError::IdentityWidth {
            expected: ADDRESS_LEN,
            actual: bytes.len(),
        })?;
        Ok(Address(arr))
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8; ADDRESS_LEN] { &self.0 }
}

impl FromStr for Address {
    type Err = EncodingError;

    /// Case-insensitive, `0x` prefix optional. Checksum casing is not enforced.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let t = s.trim();
        let t = t.strip_prefix("0x").or_else(|| t.strip_prefix("0X")).unwrap_or(t);
        if t.len() != 2 * ADDRESS_LEN {
            return Err(EncodingError::InvalidAddress(s.to_string()));
        }
        let bytes = hex::decode(t).map_err(|_| EncodingError::InvalidAddress(s.to_string()))?;
        Address::from_slice(&bytes)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self)
    }
}

/// One whitelist row: who, and since when (seconds since the Unix epoch).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Entry {
    pub address: Address,
    pub timestamp: u64,
}

impl Entry {
    pub fn new(address: Address, timestamp: u64) -> Self { Self { address, timestamp } }

    /// Validating constructor for raw inputs.
    pub fn try_new(identity: &[u8], timestamp: i128) -> Result<Self, EncodingError> {
        let address = Address::from_slice(identity)?;
        if timestamp < 0 {
            return Err(EncodingError::NegativeTimestamp(timestamp));
        }
        let timestamp = u64::try_from(timestamp).map_err(|_| EncodingError::TimestampOverflow { bits: 64 })?;
        Ok(Self { address, timestamp })
    }

    pub fn preimage(&self) -> Preimage {
        pack(&self.address, &u256_be_from_u128(self.timestamp as u128))
    }

    pub fn leaf_hash(&self) -> Digest { keccak256(&self.preimage()) }
}

/// Encode a raw `(identity, timestamp)` pair into its leaf pre-image.
pub fn encode(identity: &[u8], timestamp: i128) -> Result<Preimage, EncodingError> {
    let address = Address::from_slice(identity)?;
    if timestamp < 0 {
        return Err(EncodingError::NegativeTimestamp(timestamp));
    }
    Ok(pack(&address, &u256_be_from_u128(timestamp as u128)))
}

/// Like [`encode`], with the timestamp given as a decimal string of any length
/// up to the full 256-bit range.
pub fn encode_decimal(identity: &[u8], timestamp: &str) -> Result<Preimage, EncodingError> {
    let address = Address::from_slice(identity)?;
    let ts = u256_be_from_decimal(timestamp)?;
    Ok(pack(&address, &ts))
}

fn pack(address: &Address, ts: &[u8; TIMESTAMP_LEN]) -> Preimage {
    let mut out = [0u8; PREIMAGE_LEN];
    out[..ADDRESS_LEN].copy_from_slice(&address.0);
    out[ADDRESS_LEN..].copy_from_slice(ts);
    out
}

fn u256_be_from_u128(x: u128) -> [u8; TIMESTAMP_LEN] {
    let mut out = [0u8; TIMESTAMP_LEN];
    out[TIMESTAMP_LEN - 16..].copy_from_slice(&x.to_be_bytes());
    out
}

fn u256_be_from_decimal(s: &str) -> Result<[u8; TIMESTAMP_LEN], EncodingError> {
    let mut t = s.trim();
    if let Some(rest) = t.strip_prefix('-') {
        if !rest.is_empty() && rest.bytes().all(|c| c.is_ascii_digit()) {
            // "-0" is zero
            if rest.bytes().all(|c| c == b'0') {
                t = rest;
            } else {
                let v = rest.parse::<i128>().map(|v| -v).unwrap_or(i128::MIN);
                return Err(EncodingError::NegativeTimestamp(v));
            }
        }
    }
    if t.is_empty() || !t.bytes().all(|c| c.is_ascii_digit()) {
        return Err(EncodingError::InvalidTimestamp(s.to_string()));
    }
    let mut acc = [0u8; TIMESTAMP_LEN];
    for c in t.bytes() {
        // acc = acc * 10 + digit, least significant byte last
        let mut carry = (c - b'0') as u16;
        for limb in acc.iter_mut().rev() {
            let v = (*limb as u16) * 10 + carry;
            *limb = v as u8;
            carry = v >> 8;
        }
        if carry != 0 {
            return Err(EncodingError::TimestampOverflow { bits: 8 * TIMESTAMP_LEN });
        }
    }
    Ok(acc)
}
