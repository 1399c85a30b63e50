//! Hash key derivation.
//!
//! Every node maps `(map name, key)` to the same [`HashKey`] regardless of
//! cluster state, which lets a forwarded request carry only the hash key.
//! Changing the algorithm or seed breaks routing between nodes of
//! different versions, so both are pinned under [`HASH_VERSION`].

use std::fmt;
use std::str::FromStr;

use crate::error::DMapError;

pub const HASH_VERSION: u8 = 1;

const HASH_SEED: u32 = 0x646d_6170;

pub type PartitionId = u64;

#[derive(
    serde::Serialize,
    serde::Deserialize,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
)]
pub struct HashKey(pub u64);

impl HashKey {
    #[inline]
    pub fn partition(&self, partition_count: u64) -> PartitionId {
        self.0 % partition_count.max(1)
    }
}

impl fmt::Display for HashKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl FromStr for HashKey {
    type Err = DMapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        u64::from_str_radix(s, 16)
            .map(HashKey)
            .map_err(|e| DMapError::Internal(format!("invalid hkey `{s}`: {e}")))
    }
}

/// Derives the hash key of `key` in the map `map_name`.
///
/// The input is `len(map_name) as u32 LE || map_name || key`, hashed with
/// MurmurHash3 x64-128; the low 64 bits are the hash key.
pub fn derive(map_name: &str, key: &str) -> HashKey {
    let mut buf = Vec::with_capacity(4 + map_name.len() + key.len());
    buf.extend_from_slice(&(map_name.len() as u32).to_le_bytes());
    buf.extend_from_slice(map_name.as_bytes());
    buf.extend_from_slice(key.as_bytes());
    let (low, _high) = mur3::murmurhash3_x64_128(&buf, HASH_SEED);
    HashKey(low)
}
