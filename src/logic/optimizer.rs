use super::cycle::Cycle;
use super::types::{CostBudget, PlannedLeg, TradePlan};
use crate::config::EngineConfig;
use crate::errors::ArbError;
use crate::pools::SlippageModel;
use crate::utils::constants::LIQUIDITY_CAP_FRACTION;
use rayon::prelude::*;
use std::sync::Arc;
use tracing::debug;

/// Sizes a cycle's input amount to maximize `f(x) = output(x) - x - costs`.
///
/// `output(x)` chains every leg's curve with fee and slippage applied. The search is a bounded
/// ternary search over `[min_amount_in, upper_bound]`; `f` is not guaranteed unimodal for every
/// pool kind, so the result is the best sampled amount (both domain ends included), not an exact
/// optimum.
#[derive(Debug, Clone)]
pub struct AmountOptimizer {
    slippage: SlippageModel,
    min_tradeable_depth: f64,
    min_amount_in: f64,
    max_iterations: usize,
    priority_fee_per_leg: f64,
    tip_estimate: f64,
    fixed_cost_buffer: f64,
}

impl AmountOptimizer {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            slippage: SlippageModel::from_config(config),
            min_tradeable_depth: config.min_tradeable_depth,
            min_amount_in: config.min_amount_in,
            max_iterations: config.max_search_iterations,
            priority_fee_per_leg: config.priority_fee_per_leg,
            tip_estimate: config.tip_estimate,
            fixed_cost_buffer: config.fixed_cost_buffer,
        }
    }

    pub fn with_slippage(mut self, slippage: SlippageModel) -> Self {
        self.slippage = slippage;
        self
    }

    pub fn slippage(&self) -> &SlippageModel {
        &self.slippage
    }

    /// `min(available_capital, min leg depth / 10)`.
    pub fn upper_bound(&self, cycle: &Cycle, available_capital: f64) -> f64 {
        available_capital.min(cycle.min_depth() * LIQUIDITY_CAP_FRACTION)
    }

    pub fn costs(&self, cycle: &Cycle) -> CostBudget {
        CostBudget::new(self.priority_fee_per_leg * cycle.hop_count() as f64, self.tip_estimate, self.fixed_cost_buffer)
    }

    /// Fails on the first leg too shallow to trade.
    pub fn check_tradeable(&self, cycle: &Cycle) -> Result<(), ArbError> {
        match cycle.edges().iter().find(|edge| !(edge.depth >= self.min_tradeable_depth)) {
            Some(edge) => Err(ArbError::UntradeableLeg { pool_id: edge.pool_id, depth: edge.depth, min_depth: self.min_tradeable_depth }),
            None => Ok(()),
        }
    }

    /// Run `amount_in` through every leg, each leg's output feeding the next.
    pub fn simulate_legs(&self, cycle: &Cycle, amount_in: f64) -> Vec<PlannedLeg> {
        let mut amount = amount_in;
        cycle
            .edges()
            .iter()
            .map(|edge| {
                let amount_out = edge.apply_trade(amount, &self.slippage);
                let leg = PlannedLeg {
                    pool_id: edge.pool_id,
                    direction: edge.direction,
                    dex_kind: edge.dex_kind,
                    token_in: edge.token_in,
                    token_out: edge.token_out,
                    amount_in: amount,
                    expected_amount_out: amount_out,
                };
                amount = amount_out;
                leg
            })
            .collect()
    }

    pub fn output(&self, cycle: &Cycle, amount_in: f64) -> f64 {
        cycle.edges().iter().fold(amount_in, |amount, edge| edge.apply_trade(amount, &self.slippage))
    }

    pub fn net_profit(&self, cycle: &Cycle, amount_in: f64) -> f64 {
        self.output(cycle, amount_in) - amount_in - self.costs(cycle).total()
    }

    pub fn optimize(&self, cycle: Arc<Cycle>, available_capital: f64) -> Result<TradePlan, ArbError> {
        self.check_tradeable(&cycle)?;

        let upper = self.upper_bound(&cycle, available_capital);
        let lower = self.min_amount_in;
        if !(upper >= lower) {
            let best_profit = self.net_profit(&cycle, upper.max(0.0));
            debug!(correlation_id = %cycle.correlation_id(), upper, lower, "Empty search domain");
            return Err(ArbError::OptimizationNoProfit { best_profit });
        }

        let (best_amount, best_profit, iterations) = self.search(&cycle, lower, upper);
        debug!(correlation_id = %cycle.correlation_id(), best_amount, best_profit, iterations, "Amount search finished");

        if !(best_profit > 0.0) {
            return Err(ArbError::OptimizationNoProfit { best_profit });
        }

        let legs = self.simulate_legs(&cycle, best_amount);
        let costs = self.costs(&cycle);
        Ok(TradePlan::new(cycle, best_amount, legs, costs))
    }

    /// Optimize every cycle, on the rayon pool when `parallel` is set. Results keep input order.
    pub fn optimize_all(&self, cycles: Vec<Arc<Cycle>>, available_capital: f64, parallel: bool) -> Vec<(Arc<Cycle>, Result<TradePlan, ArbError>)> {
        if parallel {
            cycles
                .into_par_iter()
                .map(|cycle| {
                    let result = self.optimize(cycle.clone(), available_capital);
                    (cycle, result)
                })
                .collect()
        } else {
            cycles
                .into_iter()
                .map(|cycle| {
                    let result = self.optimize(cycle.clone(), available_capital);
                    (cycle, result)
                })
                .collect()
        }
    }

    /// Returns (best amount, best f, iterations used).
    fn search(&self, cycle: &Cycle, lower: f64, upper: f64) -> (f64, f64, usize) {
        let f = |x: f64| self.net_profit(cycle, x);

        let mut best = (lower, f(lower));
        let consider = |x: f64, fx: f64, best: &mut (f64, f64)| {
            if fx > best.1 {
                *best = (x, fx);
            }
        };
        consider(upper, f(upper), &mut best);

        let (mut left, mut right) = (lower, upper);
        let mut iterations = 0;
        while right - left > self.min_amount_in && iterations < self.max_iterations {
            let third = (right - left) / 3.0;
            let (m1, m2) = (left + third, right - third);
            let (f1, f2) = (f(m1), f(m2));
            consider(m1, f1, &mut best);
            consider(m2, f2, &mut best);

            if f1 < f2 {
                left = m1;
            } else {
                right = m2;
            }
            iterations += 1;
        }

        let mid = (left + right) / 2.0;
        consider(mid, f(mid), &mut best);

        (best.0, best.1, iterations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{EdgeUpdate, PoolEdge};
    use crate::pools::{DexKind, Direction, PoolId};
    use crate::token::TokenMint;
    use std::time::Instant;

    fn edge(pool: u8, from: u8, to: u8, price: f64, depth: f64, fee_bps: u32) -> Arc<PoolEdge> {
        let update = EdgeUpdate {
            pool_id: PoolId::repeat_byte(pool),
            direction: Direction::AToB,
            dex_kind: DexKind::RaydiumCp,
            token_a: TokenMint::repeat_byte(from),
            token_b: TokenMint::repeat_byte(to),
            price,
            depth,
            fee_bps,
            sequence: 1,
        };
        Arc::new(update.to_edge(0, true))
    }

    fn cycle(prices: [f64; 3], depths: [f64; 3], fee_bps: u32) -> Arc<Cycle> {
        let edges = vec![
            edge(1, 1, 2, prices[0], depths[0], fee_bps),
            edge(2, 2, 3, prices[1], depths[1], fee_bps),
            edge(3, 3, 1, prices[2], depths[2], fee_bps),
        ];
        Arc::new(Cycle::new(edges, Instant::now()).expect("valid cycle"))
    }

    fn optimizer() -> AmountOptimizer {
        AmountOptimizer::from_config(&EngineConfig::default())
    }

    #[test]
    fn test_untradeable_leg() {
        let cycle = cycle([1.02, 1.02, 1.01], [1_000_000.0, 1_000_000.0, 5.0], 0);
        let result = optimizer().optimize(cycle, 100_000.0);
        assert_eq!(result.err(), Some(ArbError::UntradeableLeg { pool_id: PoolId::repeat_byte(3), depth: 5.0, min_depth: 10.0 }));
    }

    #[test]
    fn test_upper_bound() {
        let cycle = cycle([1.02, 1.02, 1.01], [1_000_000.0, 2_000_000.0, 3_000_000.0], 0);
        // capital binds
        assert_eq!(optimizer().upper_bound(&cycle, 100_000.0), 100_000.0);
        // liquidity binds
        assert_eq!(optimizer().upper_bound(&cycle, 500_000.0), 100_000.0);
        assert_eq!(optimizer().upper_bound(&cycle, 50.0), 50.0);
    }

    #[test]
    fn test_profitable_cycle_is_sized_inside_domain() -> eyre::Result<()> {
        let cycle = cycle([1.02, 1.02, 1.01], [1_000.0, 1_000.0, 1_000.0], 25);
        let optimizer = optimizer();
        let capital = 50.0;
        let plan = optimizer.optimize(cycle.clone(), capital)?;

        let upper = optimizer.upper_bound(&cycle, capital);
        assert!(plan.input_amount <= upper);
        assert!(plan.input_amount >= EngineConfig::default().min_amount_in);
        assert!(plan.expected_profit > 0.0);
        assert_eq!(plan.legs.len(), 3);

        let at_plan = optimizer.net_profit(&cycle, plan.input_amount);
        assert!(at_plan >= optimizer.net_profit(&cycle, EngineConfig::default().min_amount_in));
        assert!(at_plan >= optimizer.net_profit(&cycle, upper));
        assert!((at_plan - plan.expected_profit).abs() < 1e-9);

        // legs chain
        for pair in plan.legs.windows(2) {
            assert_eq!(pair[0].expected_amount_out, pair[1].amount_in);
        }
        Ok(())
    }

    #[test]
    fn test_slippage_pulls_optimum_inside_the_domain() -> eyre::Result<()> {
        // with a steep slippage curve the best size is well below the liquidity cap
        let cycle = cycle([1.02, 1.02, 1.01], [1_000.0, 1_000.0, 1_000.0], 0);
        let optimizer = optimizer().with_slippage(SlippageModel::new(0.0, 50_000.0));
        let plan = optimizer.optimize(cycle.clone(), 1_000.0)?;
        let upper = optimizer.upper_bound(&cycle, 1_000.0);
        assert!(plan.input_amount < upper);
        assert!(optimizer.net_profit(&cycle, plan.input_amount) > optimizer.net_profit(&cycle, upper));
        Ok(())
    }

    #[test]
    fn test_losing_cycle_has_no_profit() {
        let cycle = cycle([0.99, 1.0, 1.0], [1_000.0, 1_000.0, 1_000.0], 0);
        let result = optimizer().optimize(cycle, 10.0);
        assert!(matches!(result, Err(ArbError::OptimizationNoProfit { best_profit }) if best_profit <= 0.0));
    }

    #[test]
    fn test_capital_below_resolution() {
        let cycle = cycle([1.02, 1.02, 1.01], [1_000.0, 1_000.0, 1_000.0], 0);
        let result = optimizer().optimize(cycle, 0.0);
        assert!(matches!(result, Err(ArbError::OptimizationNoProfit { .. })));
    }

    #[test]
    fn test_optimize_all_keeps_order() {
        let cycles = vec![
            cycle([1.02, 1.02, 1.01], [1_000.0, 1_000.0, 1_000.0], 0),
            cycle([0.9, 1.0, 1.0], [1_000.0, 1_000.0, 1_000.0], 0),
            cycle([1.02, 1.02, 1.01], [1_000.0, 1_000.0, 5.0], 0),
        ];
        let ids: Vec<_> = cycles.iter().map(|c| c.correlation_id()).collect();

        let sequential = optimizer().optimize_all(cycles.clone(), 10.0, false);
        let parallel = optimizer().optimize_all(cycles, 10.0, true);

        assert_eq!(parallel.iter().map(|(c, _)| c.correlation_id()).collect::<Vec<_>>(), ids);
        assert!(parallel[0].1.is_ok());
        assert!(matches!(parallel[1].1, Err(ArbError::OptimizationNoProfit { .. })));
        assert!(matches!(parallel[2].1, Err(ArbError::UntradeableLeg { .. })));
        assert_eq!(sequential.iter().filter(|(_, r)| r.is_ok()).count(), 1);
    }
}
