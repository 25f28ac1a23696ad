//! # Core Types
//!
//! Addresses, amounts, and the kind of asset a vault holds. All amounts are
//! `u128` in the asset's smallest unit, so an 18-decimal token fits without
//! scaling tricks.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Quantity of an asset in its smallest indivisible unit.
pub type Amount = u128;

/// Longest address we accept from the outside world.
pub const MAX_ADDRESS_LENGTH: usize = 128;

// ---------------------------------------------------------------------------
// Address
// ---------------------------------------------------------------------------

/// Errors from parsing an [`Address`] out of untrusted input.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("address is empty")]
    Empty,

    #[error("address longer than {MAX_ADDRESS_LENGTH} bytes")]
    TooLong,

    #[error("address contains whitespace or control characters")]
    InvalidCharacter,
}

/// Opaque account reference on whichever ledger holds the asset.
///
/// The vault never interprets the contents; equality is all it needs.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    /// Wraps a trusted identifier without validation.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(AddressError::Empty);
        }
        if s.len() > MAX_ADDRESS_LENGTH {
            return Err(AddressError::TooLong);
        }
        if s.chars().any(|c| c.is_whitespace() || c.is_control()) {
            return Err(AddressError::InvalidCharacter);
        }
        Ok(Self(s.to_string()))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Address {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Address {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// ---------------------------------------------------------------------------
// AssetKind
// ---------------------------------------------------------------------------

/// The single asset a vault custodies, fixed at construction.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetKind {
    /// The platform's native currency.
    Native,
    /// A fungible token identified by its ledger address.
    Token(Address),
}

impl AssetKind {
    /// Token ledger address, or `None` for native currency.
    pub fn token_address(&self) -> Option<&Address> {
        match self {
            AssetKind::Native => None,
            AssetKind::Token(addr) => Some(addr),
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetKind::Native => write!(f, "native"),
            AssetKind::Token(addr) => write!(f, "token:{}", addr),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_valid_address() {
        let addr: Address = "0xD559b7f7440f96184592F38b7955bb2d3EbfA5Ce".parse().unwrap();
        assert_eq!(addr.as_str(), "0xD559b7f7440f96184592F38b7955bb2d3EbfA5Ce");
    }

    #[test]
    fn parse_rejects_bad_input() {
        assert_eq!("".parse::<Address>(), Err(AddressError::Empty));
        assert_eq!("a b".parse::<Address>(), Err(AddressError::InvalidCharacter));
        let long = "x".repeat(MAX_ADDRESS_LENGTH + 1);
        assert_eq!(long.parse::<Address>(), Err(AddressError::TooLong));
    }

    #[test]
    fn asset_kind_token_address() {
        let token = AssetKind::Token(Address::new("token:ctt"));
        assert_eq!(token.token_address(), Some(&Address::new("token:ctt")));
        assert_eq!(AssetKind::Native.token_address(), None);
        assert_eq!(token.to_string(), "token:token:ctt");
        assert_eq!(AssetKind::Native.to_string(), "native");
    }

    #[test]
    fn address_serializes_as_plain_string() {
        let json = serde_json::to_string(&Address::new("alice")).unwrap();
        assert_eq!(json, "\"alice\"");
    }
}
