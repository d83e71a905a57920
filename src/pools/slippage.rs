use crate::config::EngineConfig;
use crate::utils::constants::{BASIS_POINTS, MAX_SLIPPAGE_BPS};

/// Linear price-impact model: `slippage_bp(x, depth) = base_bp + (x / depth) * scale_bp`,
/// clamped to `MAX_SLIPPAGE_BPS` so a leg output never turns negative.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SlippageModel {
    pub base_bp: f64,
    pub scale_bp: f64,
}

impl SlippageModel {
    pub fn new(base_bp: f64, scale_bp: f64) -> Self {
        Self { base_bp, scale_bp }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.slippage_buffer_basis_points as f64, config.slippage_scale_basis_points)
    }

    pub fn slippage_bp(&self, amount_in: f64, depth: f64) -> f64 {
        self.slippage_bp_for_ratio(amount_in / depth)
    }

    pub fn slippage_bp_for_ratio(&self, ratio: f64) -> f64 {
        (self.base_bp + ratio * self.scale_bp).clamp(0.0, MAX_SLIPPAGE_BPS)
    }

    /// Reduce `amount_out` by the slippage computed for the given depth ratio.
    pub fn attenuate(&self, amount_out: f64, ratio: f64) -> f64 {
        amount_out * (1.0 - self.slippage_bp_for_ratio(ratio) / BASIS_POINTS)
    }
}

impl Default for SlippageModel {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}
