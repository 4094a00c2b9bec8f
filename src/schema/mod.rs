//! Schema module - Map encoding, configuration and result types.

mod config;
mod evolution;
mod map_set;
mod presets;

pub use config::*;
pub use evolution::*;
pub use map_set::*;
pub use presets::Preset;
