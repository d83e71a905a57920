use super::cycle::Cycle;
use crate::config::EngineConfig;
use crate::utils::constants::BASIS_POINTS;

/// Cheap first cut on the raw price product of a cycle.
///
/// Fees, slippage and execution costs are all ignored here, so passing this filter is necessary
/// but never sufficient; the optimizer and the validation gate do the real accounting.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProfitPreFilter {
    threshold: f64,
}

impl ProfitPreFilter {
    pub fn new(min_profit_basis_points: u32) -> Self {
        Self { threshold: 1.0 + min_profit_basis_points as f64 / BASIS_POINTS }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.min_profit_basis_points)
    }

    /// Price product a cycle must strictly exceed.
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn passes(&self, cycle: &Cycle) -> bool {
        self.passes_product(cycle.price_product())
    }

    pub fn passes_product(&self, price_product: f64) -> bool {
        price_product > self.threshold
    }

    /// Split cycles into (accepted, rejected), keeping discovery order in both.
    pub fn filter(&self, cycles: Vec<Cycle>) -> (Vec<Cycle>, Vec<Cycle>) {
        cycles.into_iter().partition(|cycle| self.passes(cycle))
    }
}
