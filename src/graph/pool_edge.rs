use crate::errors::ArbError;
use crate::pools::{DexKind, Direction, PoolId, PoolState, SlippageModel};
use crate::token::TokenMint;
use crate::utils::constants::BASIS_POINTS;
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// One exchange direction through one pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoolEdge {
    pub pool_id: PoolId,
    pub direction: Direction,
    pub dex_kind: DexKind,
    pub token_in: TokenMint,
    pub token_out: TokenMint,
    /// token_out per unit token_in, before fees
    pub price: f64,
    /// Liquidity available on the input side
    pub depth: f64,
    pub fee_bps: u32,
    pub sequence: u64,
    pub updated_at_ms: u64,
    pub is_active: bool,
}

impl Display for PoolEdge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}({})@{} {}->{} px={} depth={}", self.dex_kind, self.direction, self.pool_id, self.token_in, self.token_out, self.price, self.depth)
    }
}

impl PoolEdge {
    pub fn price(&self) -> f64 {
        self.price
    }

    /// Zero-depth, zero-price and deactivated edges are skipped by traversal.
    pub fn is_traversable(&self) -> bool {
        self.is_active && self.depth > 0.0 && self.price > 0.0
    }

    /// Leg output for `amount_in`, using the pool kind's curve.
    pub fn apply_trade(&self, amount_in: f64, slippage: &SlippageModel) -> f64 {
        match self.dex_kind.curve_class() {
            Some(curve) => curve.apply_trade(self.price, self.fee_bps, self.depth, amount_in, slippage),
            None => 0.0,
        }
    }
}

/// Inbound refresher event for one direction of one pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeUpdate {
    pub pool_id: PoolId,
    pub direction: Direction,
    #[serde(deserialize_with = "DexKind::deserialize_lossy")]
    pub dex_kind: DexKind,
    pub token_a: TokenMint,
    pub token_b: TokenMint,
    pub price: f64,
    pub depth: f64,
    pub fee_bps: u32,
    pub sequence: u64,
}

impl EdgeUpdate {
    /// Both direction updates for one pool, with price and depth derived from its decoded state.
    pub fn from_pool_state(
        pool_id: PoolId,
        dex_kind: DexKind,
        token_a: TokenMint,
        token_b: TokenMint,
        state: &PoolState,
        fee_bps: u32,
        sequence: u64,
    ) -> [EdgeUpdate; 2] {
        [Direction::AToB, Direction::BToA].map(|direction| EdgeUpdate {
            pool_id,
            direction,
            dex_kind,
            token_a,
            token_b,
            price: state.price(direction),
            depth: state.depth(direction),
            fee_bps,
            sequence,
        })
    }

    pub fn token_in(&self) -> TokenMint {
        match self.direction {
            Direction::AToB => self.token_a,
            Direction::BToA => self.token_b,
        }
    }

    pub fn token_out(&self) -> TokenMint {
        match self.direction {
            Direction::AToB => self.token_b,
            Direction::BToA => self.token_a,
        }
    }

    pub fn validate(&self) -> Result<(), ArbError> {
        if !self.dex_kind.is_known() {
            return Err(ArbError::malformed(self.pool_id, "unknown dex kind"));
        }
        if self.token_a == self.token_b {
            return Err(ArbError::malformed(self.pool_id, "pool tokens must differ"));
        }
        if !self.price.is_finite() || self.price < 0.0 {
            return Err(ArbError::malformed(self.pool_id, format!("price must be finite and >= 0, got {}", self.price)));
        }
        if !self.depth.is_finite() || self.depth < 0.0 {
            return Err(ArbError::malformed(self.pool_id, format!("depth must be finite and >= 0, got {}", self.depth)));
        }
        if self.fee_bps as f64 >= BASIS_POINTS {
            return Err(ArbError::malformed(self.pool_id, format!("fee must be below 100%, got {} bps", self.fee_bps)));
        }
        Ok(())
    }

    pub(crate) fn to_edge(&self, updated_at_ms: u64, is_active: bool) -> PoolEdge {
        PoolEdge {
            pool_id: self.pool_id,
            direction: self.direction,
            dex_kind: self.dex_kind,
            token_in: self.token_in(),
            token_out: self.token_out(),
            price: self.price,
            depth: self.depth,
            fee_bps: self.fee_bps,
            sequence: self.sequence,
            updated_at_ms,
            is_active,
        }
    }
}
