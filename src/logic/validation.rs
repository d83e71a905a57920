use super::cycle_hash::CycleHash;
use super::events::CorrelationId;
use super::types::{CostBudget, PlanState, PlannedLeg, TradePlan};
use crate::config::EngineConfig;
use crate::errors::ArbError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// What the oracle is asked to simulate: the plan's ordered legs and sizes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationRequest {
    pub correlation_id: CorrelationId,
    pub cycle_hash: CycleHash,
    pub input_amount: f64,
    pub legs: Vec<PlannedLeg>,
}

impl SimulationRequest {
    pub fn from_plan(plan: &TradePlan) -> Self {
        Self {
            correlation_id: plan.cycle.correlation_id(),
            cycle_hash: plan.cycle.cycle_hash(),
            input_amount: plan.input_amount,
            legs: plan.legs.clone(),
        }
    }
}

/// Simulated execution result reported by the oracle.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationOutcome {
    pub success: bool,
    pub error: Option<String>,
    /// Realized output of every leg, in leg order
    pub leg_outputs: Vec<f64>,
    /// Time the oracle spent simulating
    pub elapsed: Duration,
}

impl SimulationOutcome {
    pub fn success(leg_outputs: Vec<f64>, elapsed: Duration) -> Self {
        Self { success: true, error: None, leg_outputs, elapsed }
    }

    pub fn failure(error: impl Into<String>, elapsed: Duration) -> Self {
        Self { success: false, error: Some(error.into()), leg_outputs: Vec::new(), elapsed }
    }

    /// Output of the last leg, in start-token units.
    pub fn final_output(&self) -> f64 {
        self.leg_outputs.last().copied().unwrap_or_default()
    }
}

/// External simulator of a trade plan, e.g. a transaction simulation endpoint.
#[async_trait]
pub trait SimulationOracle: Send + Sync {
    async fn simulate(&self, request: SimulationRequest) -> eyre::Result<SimulationOutcome>;
}

#[derive(Debug, Clone)]
pub enum ValidationOutcome {
    Accepted(TradePlan),
    Rejected { plan: TradePlan, reason: ArbError },
    Stale { plan: TradePlan, reason: ArbError },
}

impl ValidationOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, ValidationOutcome::Accepted(_))
    }

    pub fn plan(&self) -> &TradePlan {
        match self {
            ValidationOutcome::Accepted(plan) | ValidationOutcome::Rejected { plan, .. } | ValidationOutcome::Stale { plan, .. } => plan,
        }
    }

    pub fn into_plan(self) -> TradePlan {
        match self {
            ValidationOutcome::Accepted(plan) | ValidationOutcome::Rejected { plan, .. } | ValidationOutcome::Stale { plan, .. } => plan,
        }
    }

    pub fn reason(&self) -> Option<&ArbError> {
        match self {
            ValidationOutcome::Accepted(_) => None,
            ValidationOutcome::Rejected { reason, .. } | ValidationOutcome::Stale { reason, .. } => Some(reason),
        }
    }
}

/// Last check before a plan leaves the engine. A plan is accepted only when the simulation
/// succeeded, its profit clears the execution costs by `simulation_profit_buffer`, and the time
/// since detection stayed within `hot_path_latency_budget_ms`. The gate never retries.
#[derive(Clone)]
pub struct ValidationGate {
    oracle: Arc<dyn SimulationOracle>,
}

impl ValidationGate {
    pub fn new(oracle: Arc<dyn SimulationOracle>) -> Self {
        Self { oracle }
    }

    pub async fn validate(&self, mut plan: TradePlan, config: &EngineConfig) -> ValidationOutcome {
        if plan.state() != &PlanState::Optimized {
            let reason = ArbError::SimulationFailed(format!("plan is already {}", plan.state()));
            return ValidationOutcome::Rejected { plan, reason };
        }

        let budget = config.hot_path_latency_budget();
        let elapsed_before = plan.latency();
        if elapsed_before > budget {
            return Self::stale(plan, elapsed_before, budget);
        }

        plan.start_simulation();
        let timeout = config.simulation_timeout().min(budget - elapsed_before);
        let request = SimulationRequest::from_plan(&plan);

        let outcome = match tokio::time::timeout(timeout, self.oracle.simulate(request)).await {
            Err(_) => {
                let reason = ArbError::SimulationTimeout { timeout_ms: saturating_millis(timeout) };
                plan.mark_stale(reason.clone());
                return ValidationOutcome::Stale { plan, reason };
            }
            Ok(Err(e)) => return Self::reject(plan, ArbError::SimulationFailed(format!("{e:#}"))),
            Ok(Ok(outcome)) => outcome,
        };

        if !outcome.success {
            let error = outcome.error.unwrap_or_else(|| "simulation reported failure".to_string());
            return Self::reject(plan, ArbError::SimulationFailed(error));
        }

        let costs = CostBudget::from_config(plan.legs.len(), config);
        let simulated_output = outcome.final_output();
        let net_profit = simulated_output - plan.input_amount;
        if !(net_profit - costs.total() >= config.simulation_profit_buffer) {
            let reason = ArbError::InsufficientProfit { net_profit, costs: costs.total(), buffer: config.simulation_profit_buffer };
            return Self::reject(plan, reason);
        }

        // The oracle may report more time than we could observe locally.
        let total = plan.latency().max(elapsed_before.saturating_add(outcome.elapsed));
        if total > budget {
            return Self::stale(plan, total, budget);
        }

        debug!(correlation_id = %plan.cycle.correlation_id(), net_profit, costs = costs.total(), latency_ms = saturating_millis(total), "Plan validated");
        plan.accept(costs, simulated_output);
        ValidationOutcome::Accepted(plan)
    }

    fn reject(mut plan: TradePlan, reason: ArbError) -> ValidationOutcome {
        plan.reject(reason.clone());
        ValidationOutcome::Rejected { plan, reason }
    }

    fn stale(mut plan: TradePlan, elapsed: Duration, budget: Duration) -> ValidationOutcome {
        let reason = ArbError::Stale { elapsed_ms: saturating_millis(elapsed), budget_ms: saturating_millis(budget) };
        plan.mark_stale(reason.clone());
        ValidationOutcome::Stale { plan, reason }
    }
}

fn saturating_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{EdgeUpdate, PoolEdge};
    use crate::logic::cycle::Cycle;
    use crate::pools::{DexKind, Direction, PoolId};
    use crate::token::TokenMint;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Instant;

    /// Returns `input + profit` after an optional (tokio) delay, reporting `reported` as elapsed.
    struct FixedOracle {
        profit: f64,
        delay: Duration,
        reported: Duration,
        calls: AtomicUsize,
    }

    impl FixedOracle {
        fn new(profit: f64) -> Self {
            Self { profit, delay: Duration::ZERO, reported: Duration::from_millis(5), calls: AtomicUsize::new(0) }
        }
    }

    #[async_trait]
    impl SimulationOracle for FixedOracle {
        async fn simulate(&self, request: SimulationRequest) -> eyre::Result<SimulationOutcome> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            let mut outputs: Vec<f64> = request.legs.iter().map(|leg| leg.expected_amount_out).collect();
            if let Some(last) = outputs.last_mut() {
                *last = request.input_amount + self.profit;
            }
            Ok(SimulationOutcome::success(outputs, self.reported))
        }
    }

    struct FailingOracle;

    #[async_trait]
    impl SimulationOracle for FailingOracle {
        async fn simulate(&self, _request: SimulationRequest) -> eyre::Result<SimulationOutcome> {
            Err(eyre::eyre!("rpc unavailable"))
        }
    }

    fn edge(pool: u8, from: u8, to: u8) -> Arc<PoolEdge> {
        let update = EdgeUpdate {
            pool_id: PoolId::repeat_byte(pool),
            direction: Direction::AToB,
            dex_kind: DexKind::Whirlpool,
            token_a: TokenMint::repeat_byte(from),
            token_b: TokenMint::repeat_byte(to),
            price: 1.02,
            depth: 1_000.0,
            fee_bps: 0,
            sequence: 1,
        };
        Arc::new(update.to_edge(0, true))
    }

    fn plan() -> TradePlan {
        let cycle = Cycle::new(vec![edge(1, 1, 2), edge(2, 2, 3), edge(3, 3, 1)], Instant::now()).expect("valid cycle");
        let legs = cycle
            .edges()
            .iter()
            .map(|edge| PlannedLeg {
                pool_id: edge.pool_id,
                direction: edge.direction,
                dex_kind: edge.dex_kind,
                token_in: edge.token_in,
                token_out: edge.token_out,
                amount_in: 1.0,
                expected_amount_out: 1.02,
            })
            .collect();
        TradePlan::new(Arc::new(cycle), 1.0, legs, CostBudget::default())
    }

    fn config() -> EngineConfig {
        EngineConfig {
            priority_fee_per_leg: 0.002,
            tip_estimate: 0.01,
            fixed_cost_buffer: 0.002,
            simulation_profit_buffer: 0.01,
            hot_path_latency_budget_ms: 400,
            simulation_timeout_ms: 250,
            ..EngineConfig::default()
        }
    }

    #[tokio::test]
    async fn test_accepts_and_stamps_costs() {
        let gate = ValidationGate::new(Arc::new(FixedOracle::new(0.05)));
        let outcome = gate.validate(plan(), &config()).await;
        assert!(outcome.is_accepted());

        let plan = outcome.into_plan();
        assert_eq!(plan.state(), &PlanState::Accepted);
        let costs = plan.validated_costs.map(|c| c.total()).unwrap_or_default();
        assert!((costs - 0.018).abs() < 1e-12);
        assert!((plan.simulated_profit.unwrap_or_default() - 0.05).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_rejects_profit_below_costs_plus_buffer() {
        let gate = ValidationGate::new(Arc::new(FixedOracle::new(0.02)));
        let outcome = gate.validate(plan(), &config()).await;
        assert!(matches!(outcome.reason(), Some(ArbError::InsufficientProfit { .. })));
        assert!(outcome.plan().validated_costs.is_none());
    }

    #[tokio::test]
    async fn test_oracle_error_is_simulation_failure() {
        let gate = ValidationGate::new(Arc::new(FailingOracle));
        let outcome = gate.validate(plan(), &config()).await;
        assert_eq!(outcome.reason(), Some(&ArbError::SimulationFailed("rpc unavailable".to_string())));
        assert!(matches!(outcome.plan().state(), PlanState::Rejected(_)));
    }

    #[tokio::test]
    async fn test_reported_latency_over_budget_is_stale() {
        let oracle = FixedOracle { reported: Duration::from_millis(450), ..FixedOracle::new(0.5) };
        let gate = ValidationGate::new(Arc::new(oracle));
        let outcome = gate.validate(plan(), &config()).await;
        assert!(matches!(outcome, ValidationOutcome::Stale { reason: ArbError::Stale { budget_ms: 400, .. }, .. }));
    }

    #[tokio::test]
    async fn test_unbounded_reported_latency_is_stale() {
        let oracle = FixedOracle { reported: Duration::MAX, ..FixedOracle::new(0.5) };
        let gate = ValidationGate::new(Arc::new(oracle));
        let outcome = gate.validate(plan(), &config()).await;
        assert!(matches!(outcome, ValidationOutcome::Stale { reason: ArbError::Stale { elapsed_ms: u64::MAX, budget_ms: 400 }, .. }));
        assert!(matches!(outcome.plan().state(), PlanState::Stale(_)));
    }

    #[test]
    fn test_saturating_millis() {
        assert_eq!(saturating_millis(Duration::from_millis(250)), 250);
        assert_eq!(saturating_millis(Duration::MAX), u64::MAX);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_oracle_times_out() {
        let oracle = FixedOracle { delay: Duration::from_secs(2), ..FixedOracle::new(0.5) };
        let gate = ValidationGate::new(Arc::new(oracle));
        let outcome = gate.validate(plan(), &config()).await;
        assert!(matches!(outcome, ValidationOutcome::Stale { reason: ArbError::SimulationTimeout { timeout_ms: 250 }, .. }));
        assert!(matches!(outcome.plan().state(), PlanState::Stale(_)));
    }

    #[tokio::test]
    async fn test_plan_past_budget_skips_oracle() {
        let oracle = Arc::new(FixedOracle::new(0.5));
        let gate = ValidationGate::new(oracle.clone());
        let mut config = config();
        config.hot_path_latency_budget_ms = 1;
        let plan = plan();
        std::thread::sleep(Duration::from_millis(5));

        let outcome = gate.validate(plan, &config).await;
        assert!(matches!(outcome, ValidationOutcome::Stale { .. }));
        assert_eq!(oracle.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_plan_is_validated_once() {
        let gate = ValidationGate::new(Arc::new(FixedOracle::new(0.5)));
        let accepted = gate.validate(plan(), &config()).await.into_plan();
        let outcome = gate.validate(accepted, &config()).await;
        assert!(matches!(outcome.reason(), Some(ArbError::SimulationFailed(_))));
    }
}
