pub mod clock;
pub mod config_loader;
pub mod constants;

pub use clock::unix_millis;
pub use config_loader::*;
pub use constants::*;
