/// One whole unit expressed in basis points.
pub const BASIS_POINTS: f64 = 10_000.0;

/// Upper clamp of the slippage model; a leg can lose at most its whole output.
pub const MAX_SLIPPAGE_BPS: f64 = BASIS_POINTS;

/// The optimizer never sizes a trade above this share of the shallowest leg's depth.
pub const LIQUIDITY_CAP_FRACTION: f64 = 0.1;

/// Share of a bin-based pool's active depth held by a single bin.
pub const BIN_WIDTH_FRACTION: f64 = 0.01;

/// 2^64, the fixed-point scale of concentrated-liquidity square-root prices.
pub const Q64: f64 = 18_446_744_073_709_551_616.0;

#[non_exhaustive]
pub struct EngineDefaults;

impl EngineDefaults {
    pub const MIN_HOPS: usize = 2;
    pub const MAX_HOPS: usize = 4;
    pub const MIN_PROFIT_BPS: u32 = 50;
    pub const TOTAL_CAPITAL: f64 = 10.0;
    pub const CAPITAL_PER_CYCLE_FRACTION: f64 = 0.2;
    pub const SLIPPAGE_BUFFER_BPS: u32 = 10;
    pub const SLIPPAGE_SCALE_BPS: f64 = 10_000.0;
    pub const MIN_TRADEABLE_DEPTH: f64 = 10.0;
    pub const MIN_AMOUNT_IN: f64 = 0.001;
    pub const MAX_SEARCH_ITERATIONS: usize = 64;
    pub const MAX_NODE_VISITS: usize = 200_000;
    pub const SIMULATION_PROFIT_BUFFER: f64 = 0.001;
    pub const HOT_PATH_LATENCY_BUDGET_MS: u64 = 400;
    pub const SIMULATION_TIMEOUT_MS: u64 = 250;
    pub const PRIORITY_FEE_PER_LEG: f64 = 0.000_05;
    pub const TIP_ESTIMATE: f64 = 0.001;
    pub const FIXED_COST_BUFFER: f64 = 0.000_5;
}
