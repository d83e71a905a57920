/// Logic Layer - Decision Engine
///
/// This layer is responsible for:
/// - Cycle enumeration over price graph snapshots
/// - Pre-filtering and trade-size optimization
/// - Simulation-based validation of trade plans
/// - Pipeline events for the monitoring collaborator
pub mod arbitrage_engine;
pub mod cycle;
pub mod cycle_hash;
pub mod enumerator;
pub mod events;
pub mod optimizer;
pub mod prefilter;
pub mod types;
pub mod validation;


// Re-export key components from the logic layer
pub use arbitrage_engine::{ArbitrageEngine, ArbitrageEngineBuilder, ArbitrageEngineStats, Detection, PassReport};
pub use cycle::Cycle;
pub use cycle_hash::{CycleHash, ParseCycleHashError};
pub use enumerator::{CycleEnumerator, EnumerationReport, Shard};
pub use events::{ChannelEventSink, CorrelationId, EventSink, PipelineEvent, TracingEventSink};
pub use optimizer::AmountOptimizer;
pub use prefilter::ProfitPreFilter;
pub use types::{CostBudget, PlanState, PlannedLeg, TradePlan};
pub use validation::{SimulationOracle, SimulationOutcome, SimulationRequest, ValidationGate, ValidationOutcome};
