use crate::pools::PoolId;

/// Every way a single candidate can fail inside the decision engine. None of them is fatal:
/// the affected edge, cycle or plan is dropped and the engine moves on.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ArbError {
    #[error("malformed edge update for pool {pool_id}: {reason}")]
    MalformedEdge { pool_id: PoolId, reason: String },
    #[error("untradeable leg through pool {pool_id}: depth {depth} below minimum {min_depth}")]
    UntradeableLeg { pool_id: PoolId, depth: f64, min_depth: f64 },
    #[error("no positive-profit trade size found (best net profit {best_profit})")]
    OptimizationNoProfit { best_profit: f64 },
    #[error("simulation failed: {0}")]
    SimulationFailed(String),
    #[error("simulation timed out after {timeout_ms} ms")]
    SimulationTimeout { timeout_ms: u64 },
    #[error("plan is stale: {elapsed_ms} ms elapsed, budget {budget_ms} ms")]
    Stale { elapsed_ms: u64, budget_ms: u64 },
    #[error("simulated profit {net_profit} does not clear costs {costs} by buffer {buffer}")]
    InsufficientProfit { net_profit: f64, costs: f64, buffer: f64 },
    #[error("enumeration abandoned component of {component_size} tokens after {visited} node visits")]
    EnumerationBudgetExceeded { component_size: usize, visited: usize },
    #[error("unknown pool {0}")]
    UnknownPool(PoolId),
}

impl ArbError {
    pub(crate) fn malformed(pool_id: PoolId, reason: impl Into<String>) -> Self {
        Self::MalformedEdge { pool_id, reason: reason.into() }
    }

    /// Latency-driven discards, as opposed to outright rejections.
    pub fn is_stale(&self) -> bool {
        matches!(self, ArbError::Stale { .. } | ArbError::SimulationTimeout { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ArbError::InsufficientProfit { net_profit: 0.02, costs: 0.018, buffer: 0.01 };
        assert_eq!(err.to_string(), "simulated profit 0.02 does not clear costs 0.018 by buffer 0.01");
        assert!(ArbError::SimulationTimeout { timeout_ms: 10 }.is_stale());
        assert!(!ArbError::SimulationFailed("revert".to_string()).is_stale());
    }
}
