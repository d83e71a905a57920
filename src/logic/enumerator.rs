use super::cycle::Cycle;
use crate::config::EngineConfig;
use crate::errors::ArbError;
use crate::graph::{GraphSnapshot, PoolEdge, TokenIdx};
use crate::token::TokenMint;
use eyre::{Result, eyre};
use petgraph::algo::tarjan_scc;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

const NOT_IN_COMPONENT: usize = usize::MAX;

/// Deterministic partition of start tokens by the leading byte of their mint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Shard {
    index: usize,
    count: usize,
}

impl Shard {
    pub fn new(index: usize, count: usize) -> Result<Self> {
        if count == 0 || index >= count {
            return Err(eyre!("Invalid shard {}/{}", index, count));
        }
        Ok(Self { index, count })
    }

    /// The single shard owning every token.
    pub fn all() -> Self {
        Self { index: 0, count: 1 }
    }

    /// Every shard of a `count`-way split.
    pub fn split(count: usize) -> Vec<Shard> {
        (0..count.max(1)).map(|index| Shard { index, count: count.max(1) }).collect()
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn owns(&self, mint: &TokenMint) -> bool {
        mint.shard_key() as usize % self.count == self.index
    }
}

impl Default for Shard {
    fn default() -> Self {
        Self::all()
    }
}

/// Output of one enumeration pass.
#[derive(Debug, Default)]
pub struct EnumerationReport {
    /// In discovery order.
    pub cycles: Vec<Cycle>,
    pub components_searched: usize,
    pub trivial_components_pruned: usize,
    pub node_visits: usize,
    /// One entry per component abandoned at the node-visit ceiling.
    pub budget_exceeded: Vec<ArbError>,
}

/// Finds elementary cycles with a hop count inside the configured bounds.
///
/// Tarjan's algorithm splits the snapshot into strongly-connected components first; a token
/// alone in its component can not sit on any cycle and is never searched. Inside a component the
/// tokens are ranked and every cycle is reported once, rooted at its lowest-ranked token: the
/// search from a root only walks to tokens ranked above it. A route never revisits a token or
/// reuses a pool.
#[derive(Debug, Clone)]
pub struct CycleEnumerator {
    min_hops: usize,
    max_hops: usize,
    max_node_visits: usize,
}

impl CycleEnumerator {
    pub fn new(min_hops: usize, max_hops: usize, max_node_visits: usize) -> Self {
        Self { min_hops: min_hops.max(2), max_hops, max_node_visits }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.effective_min_hops(), config.max_hops, config.max_node_visits)
    }

    pub fn hop_bounds(&self) -> (usize, usize) {
        (self.min_hops, self.max_hops)
    }

    pub fn enumerate(&self, snapshot: &GraphSnapshot, shard: Shard) -> EnumerationReport {
        self.enumerate_at(snapshot, shard, Instant::now())
    }

    /// Enumerate with every cycle stamped as discovered at `discovered_at`.
    pub fn enumerate_at(&self, snapshot: &GraphSnapshot, shard: Shard, discovered_at: Instant) -> EnumerationReport {
        let mut report = EnumerationReport::default();
        if self.max_hops < self.min_hops || snapshot.edge_count() == 0 {
            return report;
        }

        let graph = snapshot.traversal_graph();
        let mut rank = vec![NOT_IN_COMPONENT; snapshot.token_count()];

        for component in tarjan_scc(&graph) {
            // Tokens of a pool are always distinct, so a lone token has no self-loop to offer.
            if component.len() < 2 {
                report.trivial_components_pruned += 1;
                continue;
            }

            let mut tokens: Vec<TokenIdx> = component.iter().map(|node| node.index()).collect();
            tokens.sort_unstable();
            if !tokens.iter().any(|idx| snapshot.token(*idx).is_some_and(|mint| shard.owns(mint))) {
                continue;
            }
            for (r, idx) in tokens.iter().enumerate() {
                rank[*idx] = r;
            }

            report.components_searched += 1;
            let mut search = ComponentSearch {
                snapshot,
                rank: &rank,
                min_hops: self.min_hops,
                max_hops: self.max_hops,
                ceiling: self.max_node_visits,
                discovered_at,
                root: 0,
                root_rank: 0,
                on_path: Vec::with_capacity(self.max_hops),
                path: Vec::with_capacity(self.max_hops),
                visits: 0,
                cycles: &mut report.cycles,
            };

            let mut exhausted = false;
            for (r, &root) in tokens.iter().enumerate() {
                if !snapshot.token(root).is_some_and(|mint| shard.owns(mint)) {
                    continue;
                }
                search.root = root;
                search.root_rank = r;
                if search.dfs(root).is_err() {
                    exhausted = true;
                    break;
                }
            }
            let visits = search.visits;
            report.node_visits += visits;

            if exhausted {
                let err = ArbError::EnumerationBudgetExceeded { component_size: tokens.len(), visited: visits };
                warn!(error = %err, "Abandoned component search, returning partial results");
                report.budget_exceeded.push(err);
            }

            for idx in &tokens {
                rank[*idx] = NOT_IN_COMPONENT;
            }
        }

        debug!(
            cycles = report.cycles.len(),
            components = report.components_searched,
            pruned = report.trivial_components_pruned,
            visits = report.node_visits,
            "Enumeration finished"
        );
        report
    }
}

struct VisitCeilingReached;

struct ComponentSearch<'a, 'r> {
    snapshot: &'a GraphSnapshot,
    rank: &'r [usize],
    min_hops: usize,
    max_hops: usize,
    ceiling: usize,
    discovered_at: Instant,
    root: TokenIdx,
    root_rank: usize,
    on_path: Vec<TokenIdx>,
    path: Vec<&'a Arc<PoolEdge>>,
    visits: usize,
    cycles: &'r mut Vec<Cycle>,
}

impl<'a> ComponentSearch<'a, '_> {
    fn dfs(&mut self, node: TokenIdx) -> Result<(), VisitCeilingReached> {
        let snapshot = self.snapshot;

        for (edge_idx, edge) in snapshot.neighbors_by_idx(node) {
            self.visits += 1;
            if self.visits > self.ceiling {
                return Err(VisitCeilingReached);
            }
            if self.path.iter().any(|used| used.pool_id == edge.pool_id) {
                continue;
            }
            let Some((_, next)) = snapshot.endpoints(edge_idx) else {
                continue;
            };

            let hops = self.path.len() + 1;
            if next == self.root {
                if hops >= self.min_hops {
                    self.close_cycle(edge);
                }
                continue;
            }

            let next_rank = self.rank[next];
            if next_rank == NOT_IN_COMPONENT || next_rank <= self.root_rank || self.on_path.contains(&next) {
                continue;
            }
            // Going through `next` needs at least one more edge to get back to the root.
            if hops + 1 > self.max_hops {
                continue;
            }

            self.path.push(edge);
            self.on_path.push(next);
            let result = self.dfs(next);
            self.on_path.pop();
            self.path.pop();
            result?;
        }
        Ok(())
    }

    fn close_cycle(&mut self, closing: &'a Arc<PoolEdge>) {
        let edges: Vec<Arc<PoolEdge>> = self.path.iter().map(|edge| Arc::clone(*edge)).chain(std::iter::once(Arc::clone(closing))).collect();
        match Cycle::new(edges, self.discovered_at) {
            Ok(cycle) => self.cycles.push(cycle),
            Err(e) => debug!(error = %e, "Skipped inconsistent route"),
        }
    }
}
