use super::cycle::Cycle;
use super::cycle_hash::CycleHash;
use super::types::TradePlan;
use crate::errors::ArbError;
use crate::token::TokenMint;
use crate::utils::unix_millis;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use tracing::{debug, info};

static NEXT_CORRELATION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique id shared by every event of one opportunity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CorrelationId(pub u64);

impl CorrelationId {
    pub fn next() -> Self {
        Self(NEXT_CORRELATION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl Display for CorrelationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One pipeline stage outcome, shipped to the monitoring collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum PipelineEvent {
    CycleDiscovered {
        correlation_id: CorrelationId,
        timestamp_ms: u64,
        cycle_hash: CycleHash,
        start_token: TokenMint,
        hops: usize,
        price_product: f64,
    },
    PreFilterRejected {
        correlation_id: CorrelationId,
        timestamp_ms: u64,
        cycle_hash: CycleHash,
        price_product: f64,
        threshold: f64,
    },
    OptimizationResult {
        correlation_id: CorrelationId,
        timestamp_ms: u64,
        cycle_hash: CycleHash,
        input_amount: Option<f64>,
        expected_profit: Option<f64>,
        error: Option<String>,
    },
    ValidationAccepted {
        correlation_id: CorrelationId,
        timestamp_ms: u64,
        cycle_hash: CycleHash,
        input_amount: f64,
        simulated_profit: f64,
        costs: f64,
        latency_ms: u64,
    },
    ValidationRejected {
        correlation_id: CorrelationId,
        timestamp_ms: u64,
        cycle_hash: CycleHash,
        reason: String,
        stale: bool,
        latency_ms: u64,
    },
}

impl PipelineEvent {
    pub fn cycle_discovered(cycle: &Cycle) -> Self {
        PipelineEvent::CycleDiscovered {
            correlation_id: cycle.correlation_id(),
            timestamp_ms: unix_millis(),
            cycle_hash: cycle.cycle_hash(),
            start_token: cycle.start_token(),
            hops: cycle.hop_count(),
            price_product: cycle.price_product(),
        }
    }

    pub fn pre_filter_rejected(cycle: &Cycle, threshold: f64) -> Self {
        PipelineEvent::PreFilterRejected {
            correlation_id: cycle.correlation_id(),
            timestamp_ms: unix_millis(),
            cycle_hash: cycle.cycle_hash(),
            price_product: cycle.price_product(),
            threshold,
        }
    }

    pub fn optimization_result(cycle: &Cycle, result: &Result<TradePlan, ArbError>) -> Self {
        let (input_amount, expected_profit, error) = match result {
            Ok(plan) => (Some(plan.input_amount), Some(plan.expected_profit), None),
            Err(e) => (None, None, Some(e.to_string())),
        };
        PipelineEvent::OptimizationResult {
            correlation_id: cycle.correlation_id(),
            timestamp_ms: unix_millis(),
            cycle_hash: cycle.cycle_hash(),
            input_amount,
            expected_profit,
            error,
        }
    }

    pub fn validation_accepted(plan: &TradePlan) -> Self {
        PipelineEvent::ValidationAccepted {
            correlation_id: plan.cycle.correlation_id(),
            timestamp_ms: unix_millis(),
            cycle_hash: plan.cycle.cycle_hash(),
            input_amount: plan.input_amount,
            simulated_profit: plan.simulated_profit.unwrap_or_default(),
            costs: plan.validated_costs.map(|costs| costs.total()).unwrap_or_default(),
            latency_ms: plan.cycle.elapsed().as_millis() as u64,
        }
    }

    pub fn validation_rejected(plan: &TradePlan, reason: &ArbError) -> Self {
        PipelineEvent::ValidationRejected {
            correlation_id: plan.cycle.correlation_id(),
            timestamp_ms: unix_millis(),
            cycle_hash: plan.cycle.cycle_hash(),
            reason: reason.to_string(),
            stale: reason.is_stale(),
            latency_ms: plan.cycle.elapsed().as_millis() as u64,
        }
    }

    pub fn correlation_id(&self) -> CorrelationId {
        match self {
            PipelineEvent::CycleDiscovered { correlation_id, .. }
            | PipelineEvent::PreFilterRejected { correlation_id, .. }
            | PipelineEvent::OptimizationResult { correlation_id, .. }
            | PipelineEvent::ValidationAccepted { correlation_id, .. }
            | PipelineEvent::ValidationRejected { correlation_id, .. } => *correlation_id,
        }
    }

    pub fn timestamp_ms(&self) -> u64 {
        match self {
            PipelineEvent::CycleDiscovered { timestamp_ms, .. }
            | PipelineEvent::PreFilterRejected { timestamp_ms, .. }
            | PipelineEvent::OptimizationResult { timestamp_ms, .. }
            | PipelineEvent::ValidationAccepted { timestamp_ms, .. }
            | PipelineEvent::ValidationRejected { timestamp_ms, .. } => *timestamp_ms,
        }
    }

    pub fn stage(&self) -> &'static str {
        match self {
            PipelineEvent::CycleDiscovered { .. } => "cycle_discovered",
            PipelineEvent::PreFilterRejected { .. } => "pre_filter_rejected",
            PipelineEvent::OptimizationResult { .. } => "optimization_result",
            PipelineEvent::ValidationAccepted { .. } => "validation_accepted",
            PipelineEvent::ValidationRejected { .. } => "validation_rejected",
        }
    }
}

/// Receiver of pipeline events. Called on the hot path, so implementations must not block.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: PipelineEvent);
}

/// Writes every event as a structured `tracing` record.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: PipelineEvent) {
        match &event {
            PipelineEvent::CycleDiscovered { correlation_id, cycle_hash, hops, price_product, .. } => {
                debug!(%correlation_id, %cycle_hash, hops, price_product, "Cycle discovered");
            }
            PipelineEvent::PreFilterRejected { correlation_id, cycle_hash, price_product, threshold, .. } => {
                debug!(%correlation_id, %cycle_hash, price_product, threshold, "Pre-filter rejected cycle");
            }
            PipelineEvent::OptimizationResult { correlation_id, cycle_hash, input_amount, expected_profit, error, .. } => {
                debug!(%correlation_id, %cycle_hash, ?input_amount, ?expected_profit, ?error, "Optimization finished");
            }
            PipelineEvent::ValidationAccepted { correlation_id, cycle_hash, input_amount, simulated_profit, costs, latency_ms, .. } => {
                info!(%correlation_id, %cycle_hash, input_amount, simulated_profit, costs, latency_ms, "Trade plan accepted");
            }
            PipelineEvent::ValidationRejected { correlation_id, cycle_hash, reason, stale, latency_ms, .. } => {
                info!(%correlation_id, %cycle_hash, %reason, stale, latency_ms, "Trade plan rejected");
            }
        }
    }
}

/// Forwards events to a monitoring task over an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelEventSink {
    sender: mpsc::UnboundedSender<PipelineEvent>,
}

impl ChannelEventSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PipelineEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

impl EventSink for ChannelEventSink {
    fn emit(&self, event: PipelineEvent) {
        if self.sender.send(event).is_err() {
            debug!("Event receiver dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correlation_ids_are_unique() {
        let first = CorrelationId::next();
        let second = CorrelationId::next();
        assert!(second > first);
    }

    #[test]
    fn test_event_serializes_with_stage_tag() -> eyre::Result<()> {
        let event = PipelineEvent::PreFilterRejected {
            correlation_id: CorrelationId(7),
            timestamp_ms: 1_700_000_000_000,
            cycle_hash: CycleHash([2; 32]),
            price_product: 1.001,
            threshold: 1.005,
        };
        let value = serde_json::to_value(&event)?;
        assert_eq!(value["stage"], "pre_filter_rejected");
        assert_eq!(value["correlation_id"], 7);
        assert_eq!(event.stage(), "pre_filter_rejected");
        assert_eq!(event.timestamp_ms(), 1_700_000_000_000);

        let decoded: PipelineEvent = serde_json::from_value(value)?;
        assert_eq!(decoded, event);
        Ok(())
    }

    #[tokio::test]
    async fn test_channel_sink_forwards_events() {
        let (sink, mut receiver) = ChannelEventSink::new();
        sink.emit(PipelineEvent::ValidationRejected {
            correlation_id: CorrelationId(3),
            timestamp_ms: 0,
            cycle_hash: CycleHash::default(),
            reason: "stale".to_string(),
            stale: true,
            latency_ms: 500,
        });
        let event = receiver.recv().await;
        assert_eq!(event.map(|e| e.correlation_id()), Some(CorrelationId(3)));

        drop(receiver);
        // emitting into a closed channel is silently ignored
        sink.emit(PipelineEvent::ValidationRejected {
            correlation_id: CorrelationId(4),
            timestamp_ms: 0,
            cycle_hash: CycleHash::default(),
            reason: "stale".to_string(),
            stale: true,
            latency_ms: 500,
        });
    }
}
