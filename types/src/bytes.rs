//! Fixed-width byte newtypes that travel as `0x`-prefixed hex.
//!
//! Addresses, public keys, digests and transaction hashes all share the same
//! wire shape. Parsing is strict about length and lenient about the prefix
//! and letter case; display is always lowercase with the prefix.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum HexParseError {
    #[error("invalid {kind}: {source}")]
    Encoding {
        kind: &'static str,
        source: hex::FromHexError,
    },
    #[error("invalid {kind}: expected {expected} bytes, got {actual}")]
    Length {
        kind: &'static str,
        expected: usize,
        actual: usize,
    },
}

fn decode_fixed<const N: usize>(kind: &'static str, raw: &str) -> Result<[u8; N], HexParseError> {
    let trimmed = raw.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);
    let bytes = hex::decode(digits).map_err(|source| HexParseError::Encoding { kind, source })?;
    <[u8; N]>::try_from(bytes.as_slice()).map_err(|_| HexParseError::Length {
        kind,
        expected: N,
        actual: bytes.len(),
    })
}

macro_rules! fixed_hex {
    ($(#[$meta:meta])* $name:ident, $len:expr, $kind:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name([u8; $len]);

        impl $name {
            pub const LEN: usize = $len;

            #[must_use]
            pub const fn new(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            pub fn parse(raw: &str) -> Result<Self, HexParseError> {
                decode_fixed::<$len>($kind, raw).map(Self)
            }

            #[must_use]
            pub const fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            #[must_use]
            pub const fn into_bytes(self) -> [u8; $len] {
                self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "0x{}", hex::encode(self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({self})", stringify!($name))
            }
        }

        impl From<[u8; $len]> for $name {
            fn from(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }
        }

        impl TryFrom<String> for $name {
            type Error = HexParseError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                Self::parse(&value)
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.to_string()
            }
        }

        impl std::str::FromStr for $name {
            type Err = HexParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }
    };
}

fixed_hex!(
    /// A 20-byte account address.
    Address,
    20,
    "address"
);

fixed_hex!(
    /// A 32-byte X25519 public key as registered on-chain.
    PublicKey,
    32,
    "public key"
);

fixed_hex!(
    /// A 32-byte Keccak-256 digest.
    Hash32,
    32,
    "hash"
);

fixed_hex!(
    /// Reference to a confirmed transaction.
    TxHash,
    32,
    "transaction hash"
);

impl Address {
    pub const ZERO: Self = Self([0; 20]);
}
