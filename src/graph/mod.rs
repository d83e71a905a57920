mod pool_edge;
mod price_graph;
mod snapshot;

use ahash::RandomState;
use std::collections::HashMap;

pub use pool_edge::{EdgeUpdate, PoolEdge};
pub use price_graph::{BatchReport, PriceGraph};
pub use snapshot::{EdgeIdx, GraphSnapshot, TokenIdx, UpsertOutcome};

pub type FastHasher = RandomState;
/// FastHashMap using ahash
pub type FastHashMap<K, V> = HashMap<K, V, FastHasher>;
