use super::pool_edge::EdgeUpdate;
use super::snapshot::{GraphSnapshot, UpsertOutcome};
use crate::errors::ArbError;
use crate::pools::PoolId;
use crate::utils::unix_millis;
use arc_swap::ArcSwap;
use parking_lot::Mutex;
use std::sync::Arc;
use tracing::{debug, warn};

/// Counters of one `apply_batch` call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub inserted: usize,
    pub updated: usize,
    pub stale: usize,
    pub malformed: Vec<ArbError>,
}

impl BatchReport {
    pub fn applied(&self) -> usize {
        self.inserted + self.updated
    }
}

/// Shared directed multigraph of tokens and pool edges.
///
/// Readers take an `Arc<GraphSnapshot>` and keep it for as long as they need a consistent view.
/// Writers are serialized by a mutex, build the next snapshot off to the side and publish it
/// with a single atomic swap, so a reader never observes a partially applied update.
#[derive(Debug, Default)]
pub struct PriceGraph {
    current: ArcSwap<GraphSnapshot>,
    writer: Mutex<()>,
}

impl PriceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current point-in-time view. Later writes are never visible through it.
    pub fn snapshot(&self) -> Arc<GraphSnapshot> {
        self.current.load_full()
    }

    /// Insert an edge or replace its price, depth and sequence in place.
    /// An update older than the stored sequence is logged and dropped.
    pub fn upsert_edge(&self, update: EdgeUpdate) -> Result<UpsertOutcome, ArbError> {
        let _guard = self.writer.lock();
        let mut next = GraphSnapshot::clone(&self.current.load());
        let outcome = next.apply(&update, unix_millis())?;

        match outcome {
            UpsertOutcome::StaleSequence { current_sequence } => {
                warn!(pool_id = %update.pool_id, direction = %update.direction, sequence = update.sequence, current_sequence, "Dropped stale edge update");
            }
            UpsertOutcome::Inserted | UpsertOutcome::Updated => {
                self.current.store(Arc::new(next));
            }
        }
        Ok(outcome)
    }

    /// Apply a refresher batch and publish it as one snapshot. Malformed updates are skipped
    /// individually and reported; the rest of the batch still lands.
    pub fn apply_batch(&self, updates: impl IntoIterator<Item = EdgeUpdate>) -> BatchReport {
        let _guard = self.writer.lock();
        let mut next = GraphSnapshot::clone(&self.current.load());
        let now_ms = unix_millis();
        let mut report = BatchReport::default();

        for update in updates {
            match next.apply(&update, now_ms) {
                Ok(UpsertOutcome::Inserted) => report.inserted += 1,
                Ok(UpsertOutcome::Updated) => report.updated += 1,
                Ok(UpsertOutcome::StaleSequence { .. }) => report.stale += 1,
                Err(e) => {
                    warn!(error = %e, "Rejected edge update");
                    report.malformed.push(e);
                }
            }
        }

        if report.applied() > 0 {
            self.current.store(Arc::new(next));
        }
        debug!(inserted = report.inserted, updated = report.updated, stale = report.stale, malformed = report.malformed.len(), "Applied edge batch");
        report
    }

    /// Take both directions of a pool in or out of traversal without dropping their state.
    pub fn set_pool_active(&self, pool_id: PoolId, is_active: bool) -> Result<(), ArbError> {
        let _guard = self.writer.lock();
        let mut next = GraphSnapshot::clone(&self.current.load());
        next.set_pool_active(&pool_id, is_active)?;
        self.current.store(Arc::new(next));
        debug!(%pool_id, is_active, "Pool activity changed");
        Ok(())
    }
}
