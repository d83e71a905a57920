// Layered layout
pub mod graph; // Graph Layer: price graph, copy-on-write snapshots
pub mod logic; // Logic Layer: enumeration, pre-filter, optimizer, validation gate
pub mod pools; // Pool model: dex kinds, pool state, slippage

// Common utilities and types
pub mod config;
pub mod errors;
pub mod token;
pub mod utils;

// Re-export key components from each layer
pub use config::{ConfigHandle, EngineConfig};
pub use errors::ArbError;
pub use graph::{BatchReport, EdgeUpdate, GraphSnapshot, PoolEdge, PriceGraph, UpsertOutcome};
pub use logic::{
    AmountOptimizer, ArbitrageEngine, ArbitrageEngineBuilder, ArbitrageEngineStats, ChannelEventSink, CorrelationId, CostBudget, Cycle,
    CycleEnumerator, CycleHash, EnumerationReport, ParseCycleHashError, EventSink, PassReport, PipelineEvent, PlanState, PlannedLeg, ProfitPreFilter, Shard,
    SimulationOracle, SimulationOutcome, SimulationRequest, TracingEventSink, TradePlan, ValidationGate, ValidationOutcome,
};
pub use pools::{CurveClass, DexKind, Direction, PoolId, PoolState, SlippageModel};
pub use token::TokenMint;
pub use utils::LoadConfigError;
