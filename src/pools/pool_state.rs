use super::pool_id::Direction;
use crate::utils::constants::{BASIS_POINTS, Q64};
use serde::{Deserialize, Serialize};

/// Decoded on-chain state of a pool, as delivered by the refresher. Prices are quoted as
/// token_b per token_a for `AToB`; depth is expressed in units of the input token.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "curve", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PoolState {
    ConstantProduct { reserve_a: f64, reserve_b: f64 },
    ConcentratedLiquidity { sqrt_price_x64: u128, liquidity: f64 },
    BinBased { bin_step_bps: u16, active_id: i32, reserve_a: f64, reserve_b: f64 },
}

impl PoolState {
    /// Spot price (output per unit input) for the given direction. Zero when the state
    /// cannot quote, which keeps the edge out of traversal.
    pub fn price(&self, direction: Direction) -> f64 {
        let a_to_b = match self {
            PoolState::ConstantProduct { reserve_a, reserve_b } => {
                if *reserve_a <= 0.0 {
                    return 0.0;
                }
                reserve_b / reserve_a
            }
            PoolState::ConcentratedLiquidity { sqrt_price_x64, .. } => {
                let sqrt_price = *sqrt_price_x64 as f64 / Q64;
                sqrt_price * sqrt_price
            }
            PoolState::BinBased { bin_step_bps, active_id, .. } => (1.0 + *bin_step_bps as f64 / BASIS_POINTS).powi(*active_id),
        };
        match direction {
            Direction::AToB => a_to_b,
            Direction::BToA if a_to_b > 0.0 => 1.0 / a_to_b,
            Direction::BToA => 0.0,
        }
    }

    /// Liquidity available on the input side of the given direction.
    pub fn depth(&self, direction: Direction) -> f64 {
        match self {
            PoolState::ConstantProduct { reserve_a, reserve_b } | PoolState::BinBased { reserve_a, reserve_b, .. } => match direction {
                Direction::AToB => *reserve_a,
                Direction::BToA => *reserve_b,
            },
            PoolState::ConcentratedLiquidity { sqrt_price_x64, liquidity } => {
                let sqrt_price = *sqrt_price_x64 as f64 / Q64;
                if sqrt_price <= 0.0 {
                    return 0.0;
                }
                // virtual reserves: x = L / sqrt(P), y = L * sqrt(P)
                match direction {
                    Direction::AToB => liquidity / sqrt_price,
                    Direction::BToA => liquidity * sqrt_price,
                }
            }
        }
    }
}
