use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::hex::{decode_into, encode};
use crate::HashError;

/// Hex length of a SHA-1 object name.
pub const SHA1_HEX_LEN: usize = 40;
/// Hex length of a SHA-256 object name.
pub const SHA256_HEX_LEN: usize = 64;

/// The name of a commit as reported by a git host.
///
/// Stored as raw digest bytes so that two spellings of the same name
/// (upper and lower case) compare equal and hash identically.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Sha {
    Sha1([u8; 20]),
    Sha256([u8; 32]),
}

impl Sha {
    /// Parse a full 40 or 64 character hex object name.
    pub fn from_hex(hex: &str) -> Result<Self, HashError> {
        match hex.len() {
            SHA1_HEX_LEN => {
                let mut bytes = [0u8; 20];
                decode_into(hex, &mut bytes)?;
                Ok(Self::Sha1(bytes))
            }
            SHA256_HEX_LEN => {
                let mut bytes = [0u8; 32];
                decode_into(hex, &mut bytes)?;
                Ok(Self::Sha256(bytes))
            }
            actual => Err(HashError::InvalidLength { actual }),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Self::Sha1(b) => b,
            Self::Sha256(b) => b,
        }
    }

    /// Full lowercase hex form.
    pub fn to_hex(&self) -> String {
        encode(self.as_bytes())
    }

    /// Seven character abbreviation, as printed by `git log --oneline`.
    pub fn short(&self) -> String {
        let mut hex = self.to_hex();
        hex.truncate(7);
        hex
    }
}

impl fmt::Display for Sha {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Sha {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Sha({})", &self.to_hex()[..8])
    }
}

impl FromStr for Sha {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s.trim())
    }
}

impl Serialize for Sha {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Sha {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Sha::from_hex(&raw).map_err(serde::de::Error::custom)
    }
}
