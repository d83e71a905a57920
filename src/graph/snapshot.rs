use super::FastHashMap;
use super::pool_edge::{EdgeUpdate, PoolEdge};
use crate::errors::ArbError;
use crate::pools::{Direction, PoolId};
use crate::token::TokenMint;
use petgraph::graph::{DiGraph, NodeIndex};
use std::sync::Arc;

pub type TokenIdx = usize;
pub type EdgeIdx = usize;

/// Result of applying one update to the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    /// The update carried an older sequence than the stored edge and was dropped.
    StaleSequence { current_sequence: u64 },
}

/// Edges per chunk of the edge arena.
const EDGE_CHUNK: usize = 256;

/// Edge arena split into fixed-size shared chunks. Writing one slot copies its chunk and the
/// outer chunk list, never the other chunks.
#[derive(Debug, Clone, Default)]
struct EdgeTable {
    chunks: Vec<Arc<Vec<Arc<PoolEdge>>>>,
    len: usize,
}

impl EdgeTable {
    fn len(&self) -> usize {
        self.len
    }

    fn get(&self, idx: EdgeIdx) -> Option<&Arc<PoolEdge>> {
        self.chunks.get(idx / EDGE_CHUNK)?.get(idx % EDGE_CHUNK)
    }

    fn set(&mut self, idx: EdgeIdx, edge: Arc<PoolEdge>) {
        Arc::make_mut(&mut self.chunks[idx / EDGE_CHUNK])[idx % EDGE_CHUNK] = edge;
    }

    fn push(&mut self, edge: Arc<PoolEdge>) -> EdgeIdx {
        let idx = self.len;
        match self.chunks.last_mut() {
            Some(chunk) if chunk.len() < EDGE_CHUNK => Arc::make_mut(chunk).push(edge),
            _ => {
                let mut chunk = Vec::with_capacity(EDGE_CHUNK);
                chunk.push(edge);
                self.chunks.push(Arc::new(chunk));
            }
        }
        self.len += 1;
        idx
    }

    fn iter(&self) -> impl Iterator<Item = &Arc<PoolEdge>> + '_ {
        self.chunks.iter().flat_map(|chunk| chunk.iter())
    }
}

impl std::ops::Index<EdgeIdx> for EdgeTable {
    type Output = Arc<PoolEdge>;

    fn index(&self, idx: EdgeIdx) -> &Self::Output {
        &self.chunks[idx / EDGE_CHUNK][idx % EDGE_CHUNK]
    }
}

/// Immutable, point-in-time view of the price graph.
///
/// Tokens and edges live in flat arenas addressed by integer index. Index tables sit behind
/// their own `Arc` and the edge arena is chunked, so cloning a snapshot copies pointers only.
/// A price update copies one edge chunk; a new pool or token also copies the index tables it
/// extends.
#[derive(Debug, Clone, Default)]
pub struct GraphSnapshot {
    tokens: Arc<Vec<TokenMint>>,
    token_index: Arc<FastHashMap<TokenMint, TokenIdx>>,
    edges: EdgeTable,
    endpoints: Arc<Vec<(TokenIdx, TokenIdx)>>,
    outgoing: Arc<Vec<Vec<EdgeIdx>>>,
    pool_index: Arc<FastHashMap<(PoolId, Direction), EdgeIdx>>,
    version: u64,
}

impl GraphSnapshot {
    /// Monotonic counter of applied mutations.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn token_count(&self) -> usize {
        self.tokens.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn tokens(&self) -> &[TokenMint] {
        &self.tokens
    }

    pub fn token(&self, idx: TokenIdx) -> Option<&TokenMint> {
        self.tokens.get(idx)
    }

    pub fn token_idx(&self, mint: &TokenMint) -> Option<TokenIdx> {
        self.token_index.get(mint).copied()
    }

    pub fn edge(&self, idx: EdgeIdx) -> Option<&Arc<PoolEdge>> {
        self.edges.get(idx)
    }

    /// (source, destination) token indices of an edge.
    pub fn endpoints(&self, idx: EdgeIdx) -> Option<(TokenIdx, TokenIdx)> {
        self.endpoints.get(idx).copied()
    }

    pub fn edge_by_pool(&self, pool_id: &PoolId, direction: Direction) -> Option<&Arc<PoolEdge>> {
        self.pool_index.get(&(*pool_id, direction)).and_then(|idx| self.edges.get(*idx))
    }

    /// Every outgoing edge index of a token, traversable or not.
    pub fn outgoing(&self, token: TokenIdx) -> &[EdgeIdx] {
        self.outgoing.get(token).map(Vec::as_slice).unwrap_or_default()
    }

    /// Lazily yields the traversable outgoing edges of a token, in insertion order.
    pub fn neighbors_by_idx(&self, token: TokenIdx) -> impl Iterator<Item = (EdgeIdx, &Arc<PoolEdge>)> + '_ {
        self.outgoing(token)
            .iter()
            .filter_map(move |&idx| self.edges.get(idx).map(|edge| (idx, edge)))
            .filter(|(_, edge)| edge.is_traversable())
    }

    /// Lazily yields the traversable outgoing edges of a token. Unknown tokens yield nothing.
    pub fn neighbors(&self, mint: &TokenMint) -> impl Iterator<Item = &Arc<PoolEdge>> + '_ {
        let idx = self.token_idx(mint).unwrap_or(usize::MAX);
        self.neighbors_by_idx(idx).map(|(_, edge)| edge)
    }

    /// Directed view of the traversable edges for petgraph algorithms. Node `i` is token `i`,
    /// edge weights are edge indices.
    pub fn traversal_graph(&self) -> DiGraph<TokenIdx, EdgeIdx, usize> {
        let mut graph = DiGraph::with_capacity(self.tokens.len(), self.edges.len());
        for idx in 0..self.tokens.len() {
            graph.add_node(idx);
        }
        for (idx, edge) in self.edges.iter().enumerate() {
            if !edge.is_traversable() {
                continue;
            }
            let (from, to) = self.endpoints[idx];
            graph.add_edge(NodeIndex::new(from), NodeIndex::new(to), idx);
        }
        graph
    }

    pub(crate) fn apply(&mut self, update: &EdgeUpdate, now_ms: u64) -> Result<UpsertOutcome, ArbError> {
        update.validate()?;

        let key = (update.pool_id, update.direction);
        if let Some(&idx) = self.pool_index.get(&key) {
            let current = &self.edges[idx];
            if update.sequence < current.sequence {
                return Ok(UpsertOutcome::StaleSequence { current_sequence: current.sequence });
            }
            if current.token_in != update.token_in() || current.token_out != update.token_out() {
                return Err(ArbError::malformed(update.pool_id, "token pair does not match the registered pool"));
            }
            if current.dex_kind != update.dex_kind {
                return Err(ArbError::malformed(update.pool_id, format!("dex kind changed from {} to {}", current.dex_kind, update.dex_kind)));
            }
            let edge = update.to_edge(now_ms, current.is_active);
            self.edges.set(idx, Arc::new(edge));
            self.version += 1;
            return Ok(UpsertOutcome::Updated);
        }

        // The opposite direction may already be registered and pins the pool's identity.
        let mut is_active = true;
        if let Some(reverse) = self.edge_by_pool(&update.pool_id, update.direction.reverse()) {
            if reverse.token_in != update.token_out() || reverse.token_out != update.token_in() {
                return Err(ArbError::malformed(update.pool_id, "token pair does not match the registered pool"));
            }
            if reverse.dex_kind != update.dex_kind {
                return Err(ArbError::malformed(update.pool_id, format!("dex kind changed from {} to {}", reverse.dex_kind, update.dex_kind)));
            }
            is_active = reverse.is_active;
        }

        let from = self.intern_token(update.token_in());
        let to = self.intern_token(update.token_out());
        let idx = self.edges.push(Arc::new(update.to_edge(now_ms, is_active)));
        Arc::make_mut(&mut self.endpoints).push((from, to));
        Arc::make_mut(&mut self.outgoing)[from].push(idx);
        Arc::make_mut(&mut self.pool_index).insert(key, idx);
        self.version += 1;

        Ok(UpsertOutcome::Inserted)
    }

    /// Toggle both directions of a pool. Returns the number of edges touched.
    pub(crate) fn set_pool_active(&mut self, pool_id: &PoolId, is_active: bool) -> Result<usize, ArbError> {
        let mut touched = 0;
        for direction in [Direction::AToB, Direction::BToA] {
            let Some(&idx) = self.pool_index.get(&(*pool_id, direction)) else {
                continue;
            };
            let mut edge = PoolEdge::clone(&self.edges[idx]);
            edge.is_active = is_active;
            self.edges.set(idx, Arc::new(edge));
            touched += 1;
        }
        if touched == 0 {
            return Err(ArbError::UnknownPool(*pool_id));
        }
        self.version += 1;
        Ok(touched)
    }

    fn intern_token(&mut self, mint: TokenMint) -> TokenIdx {
        if let Some(&idx) = self.token_index.get(&mint) {
            return idx;
        }
        let idx = self.tokens.len();
        Arc::make_mut(&mut self.tokens).push(mint);
        Arc::make_mut(&mut self.token_index).insert(mint, idx);
        Arc::make_mut(&mut self.outgoing).push(Vec::new());
        idx
    }
}
