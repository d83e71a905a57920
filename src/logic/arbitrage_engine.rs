use super::cycle::Cycle;
use super::enumerator::{CycleEnumerator, Shard};
use super::events::{EventSink, PipelineEvent, TracingEventSink};
use super::optimizer::AmountOptimizer;
use super::prefilter::ProfitPreFilter;
use super::types::TradePlan;
use super::validation::{SimulationOracle, ValidationGate, ValidationOutcome};
use crate::config::{ConfigHandle, EngineConfig};
use crate::errors::ArbError;
use crate::graph::{GraphSnapshot, PriceGraph};
use eyre::{Result, eyre};
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::runtime::{Handle, RuntimeFlavor};
use tokio::sync::mpsc;
use tokio::task::{JoinSet, block_in_place};
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

/// ArbitrageEngine drives detection passes over the shared price graph.
///
/// A pass captures the configuration and a graph snapshot once, then runs
/// enumerate -> pre-filter -> optimize -> validate against those two values only. Reloads and
/// graph writes that land mid-pass are picked up by the next pass.
pub struct ArbitrageEngine {
    graph: Arc<PriceGraph>,
    config: Arc<ConfigHandle>,
    gate: ValidationGate,
    events: Arc<dyn EventSink>,
    stats: EngineStats,
}

/// Synchronous part of a pass: everything up to the oracle call.
#[derive(Debug, Default)]
pub struct Detection {
    pub hop_bounds: (usize, usize),
    pub cycles_discovered: usize,
    pub prefilter_rejected: usize,
    pub optimization_failed: usize,
    pub budget_exceeded: Vec<ArbError>,
    pub plans: Vec<TradePlan>,
}

/// Outcome of one detection pass.
#[derive(Debug)]
pub struct PassReport {
    pub shard: Shard,
    pub config_version: u64,
    pub graph_version: u64,
    /// Effective (min, max) hop bounds the pass enumerated with
    pub hop_bounds: (usize, usize),
    pub cycles_discovered: usize,
    pub prefilter_rejected: usize,
    pub optimization_failed: usize,
    pub budget_exceeded: Vec<ArbError>,
    pub accepted: Vec<TradePlan>,
    pub rejected: usize,
    pub stale: usize,
    pub elapsed: Duration,
}

impl ArbitrageEngine {
    pub fn new(graph: Arc<PriceGraph>, config: Arc<ConfigHandle>, oracle: Arc<dyn SimulationOracle>, events: Arc<dyn EventSink>) -> Self {
        Self { graph, config, gate: ValidationGate::new(oracle), events, stats: EngineStats::default() }
    }

    pub fn graph(&self) -> &Arc<PriceGraph> {
        &self.graph
    }

    pub fn config_handle(&self) -> &Arc<ConfigHandle> {
        &self.config
    }

    /// Enumerate, pre-filter and size the cycles of one snapshot. Every produced plan is in
    /// the `Optimized` state and timed from `started`.
    pub fn detect(&self, config: &EngineConfig, snapshot: &GraphSnapshot, shard: Shard, started: Instant) -> Detection {
        let enumerator = CycleEnumerator::from_config(config);
        let enumeration = enumerator.enumerate_at(snapshot, shard, started);

        let mut detection = Detection {
            hop_bounds: enumerator.hop_bounds(),
            cycles_discovered: enumeration.cycles.len(),
            budget_exceeded: enumeration.budget_exceeded,
            ..Detection::default()
        };
        for cycle in &enumeration.cycles {
            self.events.emit(PipelineEvent::cycle_discovered(cycle));
        }

        let prefilter = ProfitPreFilter::from_config(config);
        let (survivors, rejected) = prefilter.filter(enumeration.cycles);
        for cycle in &rejected {
            self.events.emit(PipelineEvent::pre_filter_rejected(cycle, prefilter.threshold()));
        }
        detection.prefilter_rejected = rejected.len();

        let optimizer = AmountOptimizer::from_config(config);
        let survivors: Vec<Arc<Cycle>> = survivors.into_iter().map(Arc::new).collect();
        for (cycle, result) in optimizer.optimize_all(survivors, config.capital_per_cycle(), config.parallel_optimization) {
            self.events.emit(PipelineEvent::optimization_result(&cycle, &result));
            match result {
                Ok(plan) => detection.plans.push(plan),
                Err(_) => detection.optimization_failed += 1,
            }
        }

        self.stats.record_detection(&detection);
        detection
    }

    /// One full pass for a shard. Plans are validated concurrently; accepted plans are returned
    /// in completion order. On a multi-thread runtime the synchronous detection part runs under
    /// `block_in_place`.
    pub async fn run_pass(&self, shard: Shard) -> PassReport {
        let started = Instant::now();
        let (config_version, config) = self.config.versioned_snapshot();
        let snapshot = self.graph.snapshot();

        // Enumeration and sizing are cpu-bound; keep them off the worker thread so timers and
        // oracle calls of other passes keep running.
        let detection = match Handle::try_current().map(|handle| handle.runtime_flavor()) {
            Ok(RuntimeFlavor::MultiThread) => block_in_place(|| self.detect(&config, &snapshot, shard, started)),
            _ => self.detect(&config, &snapshot, shard, started),
        };
        let mut report = PassReport {
            shard,
            config_version,
            graph_version: snapshot.version(),
            hop_bounds: detection.hop_bounds,
            cycles_discovered: detection.cycles_discovered,
            prefilter_rejected: detection.prefilter_rejected,
            optimization_failed: detection.optimization_failed,
            budget_exceeded: detection.budget_exceeded,
            accepted: Vec::new(),
            rejected: 0,
            stale: 0,
            elapsed: Duration::ZERO,
        };

        let mut validations = JoinSet::new();
        for plan in detection.plans {
            let gate = self.gate.clone();
            let config = config.clone();
            validations.spawn(async move { gate.validate(plan, &config).await });
        }

        while let Some(joined) = validations.join_next().await {
            let outcome = match joined {
                Ok(outcome) => outcome,
                Err(e) => {
                    error!(error = %e, "Validation task failed");
                    continue;
                }
            };
            match outcome {
                ValidationOutcome::Accepted(plan) => {
                    self.events.emit(PipelineEvent::validation_accepted(&plan));
                    report.accepted.push(plan);
                }
                ValidationOutcome::Rejected { plan, reason } => {
                    self.events.emit(PipelineEvent::validation_rejected(&plan, &reason));
                    report.rejected += 1;
                }
                ValidationOutcome::Stale { plan, reason } => {
                    self.events.emit(PipelineEvent::validation_rejected(&plan, &reason));
                    report.stale += 1;
                }
            }
        }

        report.elapsed = started.elapsed();
        self.stats.record_validation(&report);
        if !report.budget_exceeded.is_empty() {
            warn!(shard = shard.index(), abandoned = report.budget_exceeded.len(), "Pass returned partial enumeration");
        }
        info!(
            shard = shard.index(),
            config_version,
            graph_version = report.graph_version,
            cycles = report.cycles_discovered,
            prefilter_rejected = report.prefilter_rejected,
            optimization_failed = report.optimization_failed,
            accepted = report.accepted.len(),
            rejected = report.rejected,
            stale = report.stale,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Detection pass finished"
        );
        report
    }

    /// Run passes for one shard every `period` and hand accepted plans to the execution
    /// collaborator. Returns once the receiving side is gone.
    pub async fn run_shard_worker(self: Arc<Self>, shard: Shard, period: Duration, plan_sender: mpsc::Sender<TradePlan>) -> Result<()> {
        if period.is_zero() {
            return Err(eyre!("Pass period must be > 0"));
        }
        info!(shard = shard.index(), shards = shard.count(), period_ms = period.as_millis() as u64, "Starting shard worker");

        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            interval.tick().await;
            let report = self.run_pass(shard).await;
            for plan in report.accepted {
                if let Err(e) = plan_sender.send(plan).await {
                    error!(shard = shard.index(), error = %e, "Failed to hand over trade plan, stopping worker");
                    return Ok(());
                }
            }
        }
    }

    /// Start one worker per shard of a `shard_count`-way split.
    pub fn spawn_workers(self: &Arc<Self>, shard_count: usize, period: Duration, plan_sender: mpsc::Sender<TradePlan>) -> JoinSet<Result<()>> {
        let mut workers = JoinSet::new();
        for shard in Shard::split(shard_count) {
            workers.spawn(self.clone().run_shard_worker(shard, period, plan_sender.clone()));
        }
        workers
    }

    pub fn statistics(&self) -> ArbitrageEngineStats {
        let snapshot = self.graph.snapshot();
        let (config_version, config) = self.config.versioned_snapshot();
        ArbitrageEngineStats {
            passes: self.stats.passes.load(Ordering::Relaxed),
            cycles_discovered: self.stats.cycles_discovered.load(Ordering::Relaxed),
            prefilter_rejected: self.stats.prefilter_rejected.load(Ordering::Relaxed),
            optimization_failed: self.stats.optimization_failed.load(Ordering::Relaxed),
            plans_accepted: self.stats.plans_accepted.load(Ordering::Relaxed),
            plans_rejected: self.stats.plans_rejected.load(Ordering::Relaxed),
            plans_stale: self.stats.plans_stale.load(Ordering::Relaxed),
            components_abandoned: self.stats.components_abandoned.load(Ordering::Relaxed),
            tokens: snapshot.token_count(),
            edges: snapshot.edge_count(),
            graph_version: snapshot.version(),
            config_version,
            max_hops: config.max_hops,
            min_profit_basis_points: config.min_profit_basis_points,
            parallel_optimization: config.parallel_optimization,
        }
    }
}

/// Cumulative pipeline counters.
#[derive(Debug, Default)]
struct EngineStats {
    passes: AtomicU64,
    cycles_discovered: AtomicU64,
    prefilter_rejected: AtomicU64,
    optimization_failed: AtomicU64,
    plans_accepted: AtomicU64,
    plans_rejected: AtomicU64,
    plans_stale: AtomicU64,
    components_abandoned: AtomicU64,
}

impl EngineStats {
    fn record_detection(&self, detection: &Detection) {
        self.cycles_discovered.fetch_add(detection.cycles_discovered as u64, Ordering::Relaxed);
        self.prefilter_rejected.fetch_add(detection.prefilter_rejected as u64, Ordering::Relaxed);
        self.optimization_failed.fetch_add(detection.optimization_failed as u64, Ordering::Relaxed);
        self.components_abandoned.fetch_add(detection.budget_exceeded.len() as u64, Ordering::Relaxed);
    }

    fn record_validation(&self, report: &PassReport) {
        self.passes.fetch_add(1, Ordering::Relaxed);
        self.plans_accepted.fetch_add(report.accepted.len() as u64, Ordering::Relaxed);
        self.plans_rejected.fetch_add(report.rejected as u64, Ordering::Relaxed);
        self.plans_stale.fetch_add(report.stale as u64, Ordering::Relaxed);
    }
}

/// Statistics about the ArbitrageEngine's current state
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArbitrageEngineStats {
    pub passes: u64,
    pub cycles_discovered: u64,
    pub prefilter_rejected: u64,
    pub optimization_failed: u64,
    pub plans_accepted: u64,
    pub plans_rejected: u64,
    pub plans_stale: u64,
    pub components_abandoned: u64,
    pub tokens: usize,
    pub edges: usize,
    pub graph_version: u64,
    pub config_version: u64,
    pub max_hops: usize,
    pub min_profit_basis_points: u32,
    pub parallel_optimization: bool,
}

/// Builder pattern for creating and configuring an ArbitrageEngine
#[derive(Default)]
pub struct ArbitrageEngineBuilder {
    graph: Option<Arc<PriceGraph>>,
    config_handle: Option<Arc<ConfigHandle>>,
    config: Option<EngineConfig>,
    oracle: Option<Arc<dyn SimulationOracle>>,
    events: Option<Arc<dyn EventSink>>,
}

impl ArbitrageEngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_graph(mut self, graph: Arc<PriceGraph>) -> Self {
        self.graph = Some(graph);
        self
    }

    /// Share an existing handle, e.g. one a file watcher reloads.
    pub fn with_config_handle(mut self, handle: Arc<ConfigHandle>) -> Self {
        self.config_handle = Some(handle);
        self
    }

    /// Ignored when a handle is set.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_oracle(mut self, oracle: Arc<dyn SimulationOracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn build(self) -> Result<ArbitrageEngine> {
        let oracle = self.oracle.ok_or_else(|| eyre!("A simulation oracle is required"))?;
        let config = match (self.config_handle, self.config) {
            (Some(handle), _) => handle,
            (None, Some(config)) => Arc::new(ConfigHandle::new(config)?),
            (None, None) => Arc::new(ConfigHandle::default()),
        };
        let graph = self.graph.unwrap_or_default();
        let events = self.events.unwrap_or_else(|| Arc::new(TracingEventSink) as Arc<dyn EventSink>);
        Ok(ArbitrageEngine::new(graph, config, oracle, events))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logic::validation::{SimulationOutcome, SimulationRequest};
    use async_trait::async_trait;

    struct EchoOracle;

    #[async_trait]
    impl SimulationOracle for EchoOracle {
        async fn simulate(&self, request: SimulationRequest) -> Result<SimulationOutcome> {
            let outputs = request.legs.iter().map(|leg| leg.expected_amount_out).collect();
            Ok(SimulationOutcome::success(outputs, Duration::from_millis(1)))
        }
    }

    #[test]
    fn test_arbitrage_engine_builder() -> Result<()> {
        let engine = ArbitrageEngineBuilder::new()
            .with_config(EngineConfig { max_hops: 3, min_profit_basis_points: 10, parallel_optimization: false, ..EngineConfig::default() })
            .with_oracle(Arc::new(EchoOracle))
            .build()?;

        let stats = engine.statistics();
        assert_eq!(stats.max_hops, 3);
        assert_eq!(stats.min_profit_basis_points, 10);
        assert!(!stats.parallel_optimization);
        assert_eq!(stats.passes, 0);
        assert_eq!(stats.edges, 0);
        Ok(())
    }

    #[test]
    fn test_builder_requires_oracle_and_valid_config() {
        assert!(ArbitrageEngineBuilder::new().build().is_err());
        let invalid = ArbitrageEngineBuilder::new().with_oracle(Arc::new(EchoOracle)).with_config(EngineConfig { min_hops: 0, ..EngineConfig::default() });
        assert!(invalid.build().is_err());
    }

    #[tokio::test]
    async fn test_pass_on_empty_graph() -> Result<()> {
        let engine = ArbitrageEngineBuilder::new().with_oracle(Arc::new(EchoOracle)).build()?;
        let report = engine.run_pass(Shard::all()).await;
        assert_eq!(report.cycles_discovered, 0);
        assert!(report.accepted.is_empty());
        assert_eq!(report.hop_bounds, (3, 4));
        assert_eq!(engine.statistics().passes, 1);
        Ok(())
    }
}
