//! Fixed-width byte identifiers
//!
//! Provides [`Address`] (20 bytes), [`Selector`] (4 bytes) and [`TxHash`]
//! (32 bytes). All three are `Copy`, print as `0x`-prefixed lowercase hex and
//! parse from hex with or without the prefix. Addresses written in mixed case
//! must carry a valid EIP-55 checksum; all-lower and all-upper input is
//! accepted as is.

use crate::keccak::keccak256;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

macro_rules! fixed_bytes {
    ($(#[$meta:meta])* $name:ident, $len:expr, $expecting:literal) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        pub struct $name([u8; $len]);

        impl $name {
            /// Width in bytes
            pub const LEN: usize = $len;

            /// The all-zero value
            pub const ZERO: Self = Self([0u8; $len]);

            /// Create from raw bytes
            #[inline]
            #[must_use]
            pub const fn new(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            /// Get reference to the underlying bytes
            #[inline]
            #[must_use]
            pub const fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            /// Convert to byte array (consumes self)
            #[inline]
            #[must_use]
            pub const fn into_bytes(self) -> [u8; $len] {
                self.0
            }

            /// Create from a byte slice
            ///
            /// # Errors
            /// Returns error if the slice is not exactly the right width
            #[inline]
            pub fn from_slice(bytes: &[u8]) -> Result<Self, BytesError> {
                if bytes.len() != $len {
                    return Err(BytesError::InvalidLength {
                        expected: $len,
                        actual: bytes.len(),
                    });
                }
                let mut arr = [0u8; $len];
                arr.copy_from_slice(bytes);
                Ok(Self(arr))
            }

            /// Check if every byte is zero
            #[inline]
            #[must_use]
            pub const fn is_zero(&self) -> bool {
                let mut i = 0;
                while i < $len {
                    if self.0[i] != 0 {
                        return false;
                    }
                    i += 1;
                }
                true
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
                write!(f, "0x{}", hex::encode(self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self)
            }
        }

        impl FromStr for $name {
            type Err = BytesError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let digits = s
                    .strip_prefix("0x")
                    .or_else(|| s.strip_prefix("0X"))
                    .unwrap_or(s);
                let bytes = hex::decode(digits)?;
                let value = Self::from_slice(&bytes)?;
                value.check_case(digits)?;
                Ok(value)
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl From<[u8; $len]> for $name {
            fn from(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }
        }

        impl serde::Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: serde::Serializer,
            {
                if serializer.is_human_readable() {
                    serializer.serialize_str(&self.to_string())
                } else {
                    serializer.serialize_bytes(&self.0)
                }
            }
        }

        impl<'de> serde::Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: serde::Deserializer<'de>,
            {
                struct BytesVisitor;

                impl<'de> serde::de::Visitor<'de> for BytesVisitor {
                    type Value = $name;

                    fn expecting(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
                        formatter.write_str($expecting)
                    }

                    fn visit_str<E>(self, value: &str) -> Result<Self::Value, E>
                    where
                        E: serde::de::Error,
                    {
                        value.parse().map_err(serde::de::Error::custom)
                    }

                    fn visit_bytes<E>(self, value: &[u8]) -> Result<Self::Value, E>
                    where
                        E: serde::de::Error,
                    {
                        $name::from_slice(value).map_err(serde::de::Error::custom)
                    }
                }

                if deserializer.is_human_readable() {
                    deserializer.deserialize_str(BytesVisitor)
                } else {
                    deserializer.deserialize_bytes(BytesVisitor)
                }
            }
        }
    };
}

fixed_bytes!(
    /// A 20-byte account or contract address
    ///
    /// The zero address is the "null facet" sentinel used by `Remove` cuts and
    /// by cut transactions that carry no initializer.
    Address,
    20,
    "a 20-byte address as hex string"
);

fixed_bytes!(
    /// A 4-byte function selector: the routing key of a diamond
    Selector,
    4,
    "a 4-byte selector as hex string"
);

fixed_bytes!(
    /// A 32-byte transaction hash
    TxHash,
    32,
    "a 32-byte transaction hash as hex string"
);

/// Letter-case validation of parsed hex text
trait CheckCase {
    fn check_case(&self, _digits: &str) -> Result<(), BytesError> {
        Ok(())
    }
}

impl CheckCase for Selector {}

impl CheckCase for TxHash {}

impl CheckCase for Address {
    fn check_case(&self, digits: &str) -> Result<(), BytesError> {
        let has_upper = digits.chars().any(|c| c.is_ascii_uppercase());
        let has_lower = digits.chars().any(|c| c.is_ascii_lowercase());
        if !(has_upper && has_lower) {
            return Ok(());
        }
        let expected = self.to_checksum();
        if expected[2..] == *digits {
            Ok(())
        } else {
            Err(BytesError::InvalidChecksum { expected })
        }
    }
}

impl Address {
    /// Mixed-case checksum encoding (EIP-55)
    #[must_use]
    pub fn to_checksum(&self) -> String {
        let lower = hex::encode(self.0);
        let hash = keccak256(lower.as_bytes());
        let mut out = String::with_capacity(42);
        out.push_str("0x");
        for (i, c) in lower.chars().enumerate() {
            let nibble = if i % 2 == 0 {
                hash[i / 2] >> 4
            } else {
                hash[i / 2] & 0x0f
            };
            if c.is_ascii_alphabetic() && nibble >= 8 {
                out.push(c.to_ascii_uppercase());
            } else {
                out.push(c);
            }
        }
        out
    }
}

impl Selector {
    /// Derive the selector of a canonical signature such as `transfer(address,uint256)`
    ///
    /// The signature must already be normalized; see
    /// [`Function::signature`](crate::abi::Function::signature).
    #[inline]
    #[must_use]
    pub fn from_signature(signature: &str) -> Self {
        let hash = keccak256(signature.as_bytes());
        Self([hash[0], hash[1], hash[2], hash[3]])
    }
}

impl TxHash {
    /// Hash arbitrary bytes into a transaction-hash-shaped identifier
    #[inline]
    #[must_use]
    pub fn compute(data: &[u8]) -> Self {
        Self(keccak256(data))
    }
}

/// Errors that can occur when parsing fixed-width identifiers
#[derive(Debug, thiserror::Error)]
pub enum BytesError {
    /// Wrong width
    #[error("invalid length: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// Hex encoding error
    #[error("hex decode error: {0}")]
    HexDecode(#[from] hex::FromHexError),

    /// Mixed-case address whose letter case is not its EIP-55 checksum
    #[error("bad address checksum, expected {expected}")]
    InvalidChecksum { expected: String },
}
