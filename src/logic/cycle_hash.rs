use crate::graph::PoolEdge;
use alloy_primitives::hex;
use serde::{Deserialize, Serialize};
use sha2::digest::Update;
use sha2::{Digest, Sha256};
use std::fmt::{Debug, Display};
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;

/// Route identity of a cycle: sha256 over every leg's input token, pool and direction.
///
/// Prices and depths are not hashed, so the same route found in two passes (or by two shards)
/// hashes the same. The starting leg is part of the route: a rotation of a cycle is a different
/// route.
#[derive(Clone, Copy, Default, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct CycleHash(pub [u8; 32]);

#[derive(Debug, Error, PartialEq)]
pub enum ParseCycleHashError {
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),
    #[error("cycle hash must be 32 bytes, got {0}")]
    Length(usize),
}

impl CycleHash {
    pub fn from_edges(edges: &[Arc<PoolEdge>]) -> Self {
        let mut hasher = Sha256::new();
        for edge in edges {
            Update::update(&mut hasher, edge.token_in.as_slice());
            Update::update(&mut hasher, edge.pool_id.as_slice());
            Update::update(&mut hasher, &[edge.direction.as_byte()]);
        }
        CycleHash(hasher.finalize().into())
    }

    /// First four bytes, enough to tell routes apart in log lines.
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl Display for CycleHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&hex::encode_prefixed(self.0))
    }
}

impl Debug for CycleHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CycleHash({})", self.short())
    }
}

impl FromStr for CycleHash {
    type Err = ParseCycleHashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s)?;
        let hash: [u8; 32] = bytes.as_slice().try_into().map_err(|_| ParseCycleHashError::Length(bytes.len()))?;
        Ok(CycleHash(hash))
    }
}

impl From<CycleHash> for String {
    fn from(hash: CycleHash) -> Self {
        hash.to_string()
    }
}

impl TryFrom<String> for CycleHash {
    type Error = ParseCycleHashError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}
