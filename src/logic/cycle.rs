use super::cycle_hash::CycleHash;
use super::events::CorrelationId;
use crate::graph::PoolEdge;
use crate::pools::PoolId;
use crate::token::TokenMint;
use eyre::{Result, eyre};
use std::fmt::Display;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// A closed route through the price graph: every edge's output token feeds the next edge and
/// the last edge returns to the first edge's input token.
///
/// Cycles are built once by the enumerator and never mutated. Edges are the snapshot's own
/// `Arc`s, so a cycle keeps the prices it was discovered with even after the graph moves on.
#[derive(Debug, Clone)]
pub struct Cycle {
    correlation_id: CorrelationId,
    cycle_hash: CycleHash,
    edges: Vec<Arc<PoolEdge>>,
    price_product: f64,
    discovered_at: Instant,
}

impl Display for Cycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Cycle({}, hops={}, product={:.6}, tokens={:?})",
            self.correlation_id,
            self.hop_count(),
            self.price_product,
            self.tokens().iter().map(|t| t.to_string()).collect::<Vec<String>>()
        )
    }
}

impl Cycle {
    pub fn new(edges: Vec<Arc<PoolEdge>>, discovered_at: Instant) -> Result<Self> {
        if edges.len() < 2 {
            return Err(eyre!("A cycle needs at least 2 edges, got {}", edges.len()));
        }
        for (i, pair) in edges.windows(2).enumerate() {
            if pair[0].token_out != pair[1].token_in {
                return Err(eyre!("Edge {} does not chain into edge {}", i, i + 1));
            }
        }
        let (first, last) = (&edges[0], &edges[edges.len() - 1]);
        if last.token_out != first.token_in {
            return Err(eyre!("Cycle does not return to its start token {}", first.token_in));
        }
        for (i, edge) in edges.iter().enumerate() {
            if edges[..i].iter().any(|other| other.pool_id == edge.pool_id) {
                return Err(eyre!("Pool {} is used twice", edge.pool_id));
            }
        }

        let price_product = edges.iter().map(|edge| edge.price).product();
        let cycle_hash = CycleHash::from_edges(&edges);

        Ok(Self { correlation_id: CorrelationId::next(), cycle_hash, edges, price_product, discovered_at })
    }

    pub fn correlation_id(&self) -> CorrelationId {
        self.correlation_id
    }

    pub fn cycle_hash(&self) -> CycleHash {
        self.cycle_hash
    }

    pub fn edges(&self) -> &[Arc<PoolEdge>] {
        &self.edges
    }

    pub fn hop_count(&self) -> usize {
        self.edges.len()
    }

    /// Raw product of the edge prices, fees and slippage ignored.
    pub fn price_product(&self) -> f64 {
        self.price_product
    }

    pub fn start_token(&self) -> TokenMint {
        self.edges[0].token_in
    }

    /// Visited tokens, starting and ending with the start token.
    pub fn tokens(&self) -> Vec<TokenMint> {
        std::iter::once(self.start_token()).chain(self.edges.iter().map(|edge| edge.token_out)).collect()
    }

    pub fn contains_pool(&self, pool_id: &PoolId) -> bool {
        self.edges.iter().any(|edge| edge.pool_id == *pool_id)
    }

    /// Shallowest input-side depth over all legs.
    pub fn min_depth(&self) -> f64 {
        self.edges.iter().map(|edge| edge.depth).fold(f64::INFINITY, f64::min)
    }

    /// Instant the detection pass observed the graph snapshot this cycle came from.
    pub fn discovered_at(&self) -> Instant {
        self.discovered_at
    }

    pub fn elapsed(&self) -> Duration {
        self.discovered_at.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::EdgeUpdate;
    use crate::pools::{DexKind, Direction};

    fn edge(pool: u8, from: u8, to: u8, price: f64) -> Arc<PoolEdge> {
        let update = EdgeUpdate {
            pool_id: PoolId::repeat_byte(pool),
            direction: Direction::AToB,
            dex_kind: DexKind::RaydiumAmm,
            token_a: TokenMint::repeat_byte(from),
            token_b: TokenMint::repeat_byte(to),
            price,
            depth: 1_000.0,
            fee_bps: 0,
            sequence: 1,
        };
        Arc::new(update.to_edge(0, true))
    }

    #[test]
    fn test_new_cycle() -> eyre::Result<()> {
        let cycle = Cycle::new(vec![edge(1, 1, 2, 1.02), edge(2, 2, 3, 1.02), edge(3, 3, 1, 1.01)], Instant::now())?;
        assert_eq!(cycle.hop_count(), 3);
        assert_eq!(cycle.start_token(), TokenMint::repeat_byte(1));
        assert_eq!(cycle.tokens().len(), 4);
        assert!((cycle.price_product() - 1.02 * 1.02 * 1.01).abs() < 1e-12);
        assert!(cycle.contains_pool(&PoolId::repeat_byte(2)));
        assert!(!cycle.contains_pool(&PoolId::repeat_byte(4)));
        Ok(())
    }

    #[test]
    fn test_invalid_cycles_are_rejected() {
        let now = Instant::now();
        assert!(Cycle::new(vec![edge(1, 1, 2, 1.0)], now).is_err());
        assert!(Cycle::new(vec![edge(1, 1, 2, 1.0), edge(2, 3, 1, 1.0)], now).is_err());
        assert!(Cycle::new(vec![edge(1, 1, 2, 1.0), edge(2, 2, 3, 1.0)], now).is_err());
        assert!(Cycle::new(vec![edge(1, 1, 2, 1.0), edge(1, 2, 1, 1.0)], now).is_err());
    }

    #[test]
    fn test_hash_ignores_prices_but_not_route() -> eyre::Result<()> {
        let now = Instant::now();
        let a = Cycle::new(vec![edge(1, 1, 2, 1.0), edge(2, 2, 1, 1.0)], now)?;
        let b = Cycle::new(vec![edge(1, 1, 2, 1.5), edge(2, 2, 1, 0.9)], now)?;
        let c = Cycle::new(vec![edge(2, 2, 1, 1.0), edge(1, 1, 2, 1.0)], now)?;
        assert_eq!(a.cycle_hash(), b.cycle_hash());
        assert_ne!(a.cycle_hash(), c.cycle_hash());
        assert_ne!(a.correlation_id(), b.correlation_id());
        Ok(())
    }
}
