use alloy_primitives::B256;
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display, Formatter};
use std::str::FromStr;

/// Identity of a fungible asset. Tokens carry no state of their own; edges refer to them by mint.
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TokenMint(pub B256);

impl TokenMint {
    pub const fn new(mint: B256) -> Self {
        Self(mint)
    }

    // For testing purposes
    pub fn random() -> Self {
        Self(B256::random())
    }

    // For testing purposes
    pub const fn repeat_byte(byte: u8) -> Self {
        Self(B256::repeat_byte(byte))
    }

    pub fn as_slice(&self) -> &[u8] {
        self.0.as_slice()
    }

    /// Leading byte of the mint, used to partition detection work across shards.
    pub fn shard_key(&self) -> u8 {
        self.0[0]
    }
}

impl From<B256> for TokenMint {
    fn from(mint: B256) -> Self {
        Self(mint)
    }
}

impl FromStr for TokenMint {
    type Err = alloy_primitives::hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(B256::from_str(s)?))
    }
}

impl Display for TokenMint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#}", self.0)
    }
}

impl Debug for TokenMint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "TokenMint({})", self.0)
    }
}
