use crate::utils::config_loader::{LoadConfigError, load_from_file, load_from_file_sync, parse_toml};
use crate::utils::constants::EngineDefaults;
use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Parameters of the decision engine. All monetary amounts are in units of a cycle's start token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Shortest cycle the enumerator yields (>= 2)
    pub min_hops: usize,
    /// Longest cycle the enumerator yields (>= min_hops)
    pub max_hops: usize,
    /// 2-hop cycles are only yielded when set
    pub two_hop_enabled: bool,
    /// Pre-filter threshold on the raw price product
    pub min_profit_basis_points: u32,
    /// Capital the engine may deploy in total
    pub total_capital: f64,
    /// Share of `total_capital` a single cycle may use (0 < f <= 1)
    pub capital_per_cycle_fraction: f64,
    /// Base slippage charged on every leg
    pub slippage_buffer_basis_points: u32,
    /// Slippage added per unit of `amount / depth`
    pub slippage_scale_basis_points: f64,
    /// Legs shallower than this are untradeable
    pub min_tradeable_depth: f64,
    /// Smallest trade size and resolution of the amount search
    pub min_amount_in: f64,
    pub max_search_iterations: usize,
    /// Per-component DFS node-visit ceiling
    pub max_node_visits: usize,
    /// Required margin of simulated profit over execution costs
    pub simulation_profit_buffer: f64,
    pub hot_path_latency_budget_ms: u64,
    pub simulation_timeout_ms: u64,
    pub priority_fee_per_leg: f64,
    pub tip_estimate: f64,
    pub fixed_cost_buffer: f64,
    /// Run the amount optimizer on the rayon pool
    pub parallel_optimization: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_hops: EngineDefaults::MIN_HOPS,
            max_hops: EngineDefaults::MAX_HOPS,
            two_hop_enabled: false,
            min_profit_basis_points: EngineDefaults::MIN_PROFIT_BPS,
            total_capital: EngineDefaults::TOTAL_CAPITAL,
            capital_per_cycle_fraction: EngineDefaults::CAPITAL_PER_CYCLE_FRACTION,
            slippage_buffer_basis_points: EngineDefaults::SLIPPAGE_BUFFER_BPS,
            slippage_scale_basis_points: EngineDefaults::SLIPPAGE_SCALE_BPS,
            min_tradeable_depth: EngineDefaults::MIN_TRADEABLE_DEPTH,
            min_amount_in: EngineDefaults::MIN_AMOUNT_IN,
            max_search_iterations: EngineDefaults::MAX_SEARCH_ITERATIONS,
            max_node_visits: EngineDefaults::MAX_NODE_VISITS,
            simulation_profit_buffer: EngineDefaults::SIMULATION_PROFIT_BUFFER,
            hot_path_latency_budget_ms: EngineDefaults::HOT_PATH_LATENCY_BUDGET_MS,
            simulation_timeout_ms: EngineDefaults::SIMULATION_TIMEOUT_MS,
            priority_fee_per_leg: EngineDefaults::PRIORITY_FEE_PER_LEG,
            tip_estimate: EngineDefaults::TIP_ESTIMATE,
            fixed_cost_buffer: EngineDefaults::FIXED_COST_BUFFER,
            parallel_optimization: true,
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, LoadConfigError> {
        let config: EngineConfig = parse_toml(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_file_sync(path: impl AsRef<Path>) -> Result<Self, LoadConfigError> {
        let config: EngineConfig = load_from_file_sync(path)?;
        config.validate()?;
        Ok(config)
    }

    pub async fn load_from_file(path: impl AsRef<Path>) -> Result<Self, LoadConfigError> {
        let config: EngineConfig = load_from_file(path).await?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), LoadConfigError> {
        let invalid = |msg: String| Err(LoadConfigError::Invalid(msg));

        if self.min_hops < 2 {
            return invalid(format!("min_hops must be >= 2, got {}", self.min_hops));
        }
        if self.max_hops < self.min_hops {
            return invalid(format!("max_hops ({}) must be >= min_hops ({})", self.max_hops, self.min_hops));
        }
        if !(self.capital_per_cycle_fraction > 0.0 && self.capital_per_cycle_fraction <= 1.0) {
            return invalid(format!("capital_per_cycle_fraction must be in (0, 1], got {}", self.capital_per_cycle_fraction));
        }
        if self.hot_path_latency_budget_ms == 0 {
            return invalid("hot_path_latency_budget_ms must be > 0".to_string());
        }
        if self.simulation_timeout_ms == 0 {
            return invalid("simulation_timeout_ms must be > 0".to_string());
        }
        if self.max_search_iterations == 0 {
            return invalid("max_search_iterations must be > 0".to_string());
        }
        if self.max_node_visits == 0 {
            return invalid("max_node_visits must be > 0".to_string());
        }
        for (name, value) in [
            ("total_capital", self.total_capital),
            ("slippage_scale_basis_points", self.slippage_scale_basis_points),
            ("min_tradeable_depth", self.min_tradeable_depth),
            ("simulation_profit_buffer", self.simulation_profit_buffer),
            ("priority_fee_per_leg", self.priority_fee_per_leg),
            ("tip_estimate", self.tip_estimate),
            ("fixed_cost_buffer", self.fixed_cost_buffer),
        ] {
            if !value.is_finite() || value < 0.0 {
                return invalid(format!("{name} must be a finite amount >= 0, got {value}"));
            }
        }
        if !self.min_amount_in.is_finite() || self.min_amount_in <= 0.0 {
            return invalid(format!("min_amount_in must be > 0, got {}", self.min_amount_in));
        }
        Ok(())
    }

    /// Shortest hop count actually yielded once the 2-hop switch is applied.
    pub fn effective_min_hops(&self) -> usize {
        if self.two_hop_enabled { self.min_hops } else { self.min_hops.max(3) }
    }

    /// Capital available to a single cycle.
    pub fn capital_per_cycle(&self) -> f64 {
        self.total_capital * self.capital_per_cycle_fraction
    }

    pub fn hot_path_latency_budget(&self) -> Duration {
        Duration::from_millis(self.hot_path_latency_budget_ms)
    }

    pub fn simulation_timeout(&self) -> Duration {
        Duration::from_millis(self.simulation_timeout_ms)
    }
}

/// Active configuration together with the reload count that produced it.
#[derive(Debug)]
struct VersionedConfig {
    version: u64,
    config: Arc<EngineConfig>,
}

/// Atomically swappable holder of the active configuration. A pass calls `snapshot()` (or
/// `versioned_snapshot()`) once at its start and keeps that `Arc` for its whole duration.
#[derive(Debug)]
pub struct ConfigHandle {
    current: ArcSwap<VersionedConfig>,
}

impl ConfigHandle {
    pub fn new(config: EngineConfig) -> Result<Self, LoadConfigError> {
        config.validate()?;
        Ok(Self::from_valid(config))
    }

    fn from_valid(config: EngineConfig) -> Self {
        Self { current: ArcSwap::from_pointee(VersionedConfig { version: 0, config: Arc::new(config) }) }
    }

    pub fn snapshot(&self) -> Arc<EngineConfig> {
        self.current.load().config.clone()
    }

    /// The active snapshot and its version, read together.
    pub fn versioned_snapshot(&self) -> (u64, Arc<EngineConfig>) {
        let current = self.current.load();
        (current.version, current.config.clone())
    }

    /// Number of successful reloads so far.
    pub fn version(&self) -> u64 {
        self.current.load().version
    }

    /// Validate and publish a new configuration. On error the active snapshot is kept.
    pub fn reload(&self, config: EngineConfig) -> Result<(), LoadConfigError> {
        if let Err(e) = config.validate() {
            warn!(error = %e, "Rejected configuration reload");
            return Err(e);
        }
        let config = Arc::new(config);
        let previous = self.current.rcu(|current| VersionedConfig { version: current.version + 1, config: config.clone() });
        info!(version = previous.version + 1, "Configuration reloaded");
        Ok(())
    }

    pub async fn reload_from_file(&self, path: impl AsRef<Path>) -> Result<(), LoadConfigError> {
        let config: EngineConfig = load_from_file(path).await?;
        self.reload(config)
    }
}

impl Default for ConfigHandle {
    fn default() -> Self {
        Self::from_valid(EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = EngineConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.min_hops, 2);
        assert_eq!(config.max_hops, 4);
        assert!(!config.two_hop_enabled);
        assert_eq!(config.effective_min_hops(), 3);
    }

    #[test]
    fn test_from_toml_partial_document() -> eyre::Result<()> {
        let config = EngineConfig::from_toml_str(
            r#"
            min_hops = 2
            max_hops = 5
            two_hop_enabled = true
            min_profit_basis_points = 25
            hot_path_latency_budget_ms = 150
            "#,
        )?;
        assert_eq!(config.max_hops, 5);
        assert_eq!(config.effective_min_hops(), 2);
        assert_eq!(config.min_profit_basis_points, 25);
        assert_eq!(config.hot_path_latency_budget(), Duration::from_millis(150));
        // untouched keys keep their defaults
        assert_eq!(config.simulation_timeout_ms, EngineDefaults::SIMULATION_TIMEOUT_MS);
        Ok(())
    }

    #[test]
    fn test_invalid_ranges_are_rejected() {
        let config = EngineConfig { min_hops: 1, ..EngineConfig::default() };
        assert!(config.validate().is_err());

        let config = EngineConfig { min_hops: 4, max_hops: 3, ..EngineConfig::default() };
        assert!(config.validate().is_err());

        let config = EngineConfig { capital_per_cycle_fraction: 0.0, ..EngineConfig::default() };
        assert!(config.validate().is_err());

        let config = EngineConfig { capital_per_cycle_fraction: 1.5, ..EngineConfig::default() };
        assert!(config.validate().is_err());

        let config = EngineConfig { hot_path_latency_budget_ms: 0, ..EngineConfig::default() };
        assert!(config.validate().is_err());

        let config = EngineConfig { simulation_profit_buffer: -0.1, ..EngineConfig::default() };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_reload_swaps_snapshot_without_touching_held_one() -> eyre::Result<()> {
        let handle = ConfigHandle::new(EngineConfig::default())?;
        let held = handle.snapshot();

        handle.reload(EngineConfig { max_hops: 6, ..EngineConfig::default() })?;

        assert_eq!(held.max_hops, 4);
        assert_eq!(handle.snapshot().max_hops, 6);
        assert_eq!(handle.version(), 1);
        Ok(())
    }

    #[test]
    fn test_versioned_snapshot_pairs_version_with_config() -> eyre::Result<()> {
        let handle = ConfigHandle::new(EngineConfig::default())?;
        assert_eq!(handle.versioned_snapshot().0, 0);

        handle.reload(EngineConfig { max_hops: 5, ..EngineConfig::default() })?;
        handle.reload(EngineConfig { max_hops: 6, ..EngineConfig::default() })?;

        let (version, config) = handle.versioned_snapshot();
        assert_eq!(version, 2);
        assert_eq!(config.max_hops, 6);
        Ok(())
    }

    #[test]
    fn test_concurrent_reloads_each_bump_version_once() -> eyre::Result<()> {
        let handle = ConfigHandle::new(EngineConfig::default())?;
        std::thread::scope(|scope| {
            for max_hops in 3..11 {
                let handle = &handle;
                scope.spawn(move || handle.reload(EngineConfig { max_hops, ..EngineConfig::default() }));
            }
        });
        assert_eq!(handle.version(), 8);
        Ok(())
    }

    #[test]
    fn test_invalid_reload_keeps_active_snapshot() -> eyre::Result<()> {
        let handle = ConfigHandle::new(EngineConfig::default())?;
        let result = handle.reload(EngineConfig { min_hops: 0, ..EngineConfig::default() });
        assert!(result.is_err());
        assert_eq!(handle.snapshot().min_hops, 2);
        assert_eq!(handle.version(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_reload_from_file() -> eyre::Result<()> {
        let path = std::env::temp_dir().join(format!("swap-cycle-config-{}.toml", std::process::id()));
        tokio::fs::write(&path, "max_hops = 3\nmin_profit_basis_points = 75\n").await?;

        let handle = ConfigHandle::default();
        handle.reload_from_file(&path).await?;
        tokio::fs::remove_file(&path).await?;

        let snapshot = handle.snapshot();
        assert_eq!(snapshot.max_hops, 3);
        assert_eq!(snapshot.min_profit_basis_points, 75);
        Ok(())
    }
}
