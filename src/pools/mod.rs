pub mod dex_kind;
pub mod pool_id;
pub mod pool_state;
pub mod slippage;

pub use dex_kind::{CurveClass, DexKind};
pub use pool_id::{Direction, PoolId};
pub use pool_state::PoolState;
pub use slippage::SlippageModel;
