use super::cycle::Cycle;
use crate::config::EngineConfig;
use crate::errors::ArbError;
use crate::pools::{DexKind, Direction, PoolId};
use crate::token::TokenMint;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

/// One sized swap of a trade plan. Self-contained so execution needs no graph lookups.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedLeg {
    pub pool_id: PoolId,
    pub direction: Direction,
    pub dex_kind: DexKind,
    pub token_in: TokenMint,
    pub token_out: TokenMint,
    pub amount_in: f64,
    /// After fee and slippage
    pub expected_amount_out: f64,
}

/// Execution costs of a plan, in start-token units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CostBudget {
    pub priority_fee: f64,
    pub tip: f64,
    pub safety_buffer: f64,
}

impl CostBudget {
    pub fn new(priority_fee: f64, tip: f64, safety_buffer: f64) -> Self {
        Self { priority_fee, tip, safety_buffer }
    }

    /// Priority fee scales with the number of legs; tip and buffer are per transaction.
    pub fn from_config(hops: usize, config: &EngineConfig) -> Self {
        Self::new(config.priority_fee_per_leg * hops as f64, config.tip_estimate, config.fixed_cost_buffer)
    }

    pub fn total(&self) -> f64 {
        self.priority_fee + self.tip + self.safety_buffer
    }
}

/// Lifecycle of a trade plan: `Optimized -> Simulating -> {Accepted, Rejected, Stale}`.
/// The three outcomes are terminal.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanState {
    Optimized,
    Simulating,
    Accepted,
    Rejected(ArbError),
    Stale(ArbError),
}

impl PlanState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PlanState::Accepted | PlanState::Rejected(_) | PlanState::Stale(_))
    }
}

impl Display for PlanState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlanState::Optimized => write!(f, "OPTIMIZED"),
            PlanState::Simulating => write!(f, "SIMULATING"),
            PlanState::Accepted => write!(f, "ACCEPTED"),
            PlanState::Rejected(reason) => write!(f, "REJECTED({reason})"),
            PlanState::Stale(reason) => write!(f, "STALE({reason})"),
        }
    }
}

/// A sized cycle. Created by the amount optimizer, consumed by the validation gate and, once
/// accepted, moved to the execution collaborator.
#[derive(Debug, Clone)]
pub struct TradePlan {
    pub cycle: Arc<Cycle>,
    pub input_amount: f64,
    pub legs: Vec<PlannedLeg>,
    pub expected_output: f64,
    /// Projected `output - input - costs` at `input_amount`
    pub expected_profit: f64,
    /// Costs the optimizer charged
    pub cost_budget: CostBudget,
    /// Costs the gate validated against, stamped on acceptance
    pub validated_costs: Option<CostBudget>,
    pub simulated_output: Option<f64>,
    /// Simulated `output - input`, before costs
    pub simulated_profit: Option<f64>,
    state: PlanState,
}

impl Display for TradePlan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "TradePlan({}, in={:.6}, out={:.6}, profit={:.6}, state={})",
            self.cycle.correlation_id(),
            self.input_amount,
            self.expected_output,
            self.expected_profit,
            self.state
        )
    }
}

impl TradePlan {
    pub fn new(cycle: Arc<Cycle>, input_amount: f64, legs: Vec<PlannedLeg>, cost_budget: CostBudget) -> Self {
        let expected_output = legs.last().map(|leg| leg.expected_amount_out).unwrap_or_default();
        Self {
            cycle,
            input_amount,
            legs,
            expected_output,
            expected_profit: expected_output - input_amount - cost_budget.total(),
            cost_budget,
            validated_costs: None,
            simulated_output: None,
            simulated_profit: None,
            state: PlanState::Optimized,
        }
    }

    pub fn state(&self) -> &PlanState {
        &self.state
    }

    pub fn is_accepted(&self) -> bool {
        self.state == PlanState::Accepted
    }

    pub fn start_token(&self) -> TokenMint {
        self.cycle.start_token()
    }

    /// Time since the cycle's graph snapshot was observed.
    pub fn latency(&self) -> Duration {
        self.cycle.elapsed()
    }

    pub(crate) fn start_simulation(&mut self) {
        debug_assert_eq!(self.state, PlanState::Optimized);
        self.state = PlanState::Simulating;
    }

    pub(crate) fn accept(&mut self, validated_costs: CostBudget, simulated_output: f64) {
        debug_assert_eq!(self.state, PlanState::Simulating);
        self.validated_costs = Some(validated_costs);
        self.simulated_output = Some(simulated_output);
        self.simulated_profit = Some(simulated_output - self.input_amount);
        self.state = PlanState::Accepted;
    }

    pub(crate) fn reject(&mut self, reason: ArbError) {
        debug_assert!(!self.state.is_terminal());
        self.state = PlanState::Rejected(reason);
    }

    pub(crate) fn mark_stale(&mut self, reason: ArbError) {
        debug_assert!(!self.state.is_terminal());
        self.state = PlanState::Stale(reason);
    }
}
