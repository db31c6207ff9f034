//! Overlay network address derived from a public key
//!
//! Format: `200:gggg:gggg:gggg:gggg:gggg:gggg:gggg:gggg`
//!
//! The 16 address bytes are the first 16 bytes of `SHA-512(public_key)`.
//! Hashing first means the address never carries raw key bytes.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha512};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::keypair::PUBLIC_KEY_SIZE;

/// Address length in bytes
pub const ADDRESS_SIZE: usize = 16;

/// Constant leading group identifying the address family
pub const NETWORK_PREFIX: &str = "200";

/// Number of 2-byte groups after the prefix
const GROUPS: usize = ADDRESS_SIZE / 2;

/// Failure to parse the canonical address text
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AddressParseError {
    #[error("Address must start with '200:'")]
    WrongPrefix,

    #[error("Address must have 8 groups after the prefix, got {0}")]
    GroupCount(usize),

    #[error("Invalid address group '{0}': expected 4 lowercase hex digits")]
    BadGroup(String),
}

/// A 16-byte overlay address.
///
/// A pure function of the public key: the same key always yields the same
/// address. Not secret.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MeshAddress([u8; ADDRESS_SIZE]);

impl MeshAddress {
    /// Derive the address for a 32-byte public key
    pub fn derive(public_key: &[u8; PUBLIC_KEY_SIZE]) -> Self {
        let digest = Sha512::digest(public_key);
        let mut bytes = [0u8; ADDRESS_SIZE];
        bytes.copy_from_slice(&digest[..ADDRESS_SIZE]);
        MeshAddress(bytes)
    }

    pub fn from_bytes(bytes: [u8; ADDRESS_SIZE]) -> Self {
        MeshAddress(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; ADDRESS_SIZE] {
        &self.0
    }
}

impl fmt::Display for MeshAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(NETWORK_PREFIX)?;
        for pair in self.0.chunks_exact(2) {
            write!(f, ":{:02x}{:02x}", pair[0], pair[1])?;
        }
        Ok(())
    }
}

impl FromStr for MeshAddress {
    type Err = AddressParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(':');
        if parts.next() != Some(NETWORK_PREFIX) {
            return Err(AddressParseError::WrongPrefix);
        }

        let groups: Vec<&str> = parts.collect();
        if groups.len() != GROUPS {
            return Err(AddressParseError::GroupCount(groups.len()));
        }

        let mut bytes = [0u8; ADDRESS_SIZE];
        for (i, group) in groups.iter().enumerate() {
            let canonical = group.len() == 4
                && group
                    .chars()
                    .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c));
            if !canonical {
                return Err(AddressParseError::BadGroup(group.to_string()));
            }
            hex::decode_to_slice(group, &mut bytes[i * 2..i * 2 + 2])
                .map_err(|_| AddressParseError::BadGroup(group.to_string()))?;
        }

        Ok(MeshAddress(bytes))
    }
}

impl Serialize for MeshAddress {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for MeshAddress {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}
