//! Live trading module
//!
//! Concurrent strategy instances polling a candle source and trading
//! through the position manager.

pub mod engine;
pub mod instance;
pub mod settings;
pub mod stop;

pub use engine::*;
pub use instance::*;
pub use settings::*;
pub use stop::*;
