//! Data management module
//!
//! Candle model, candle sources and interval arithmetic.

pub mod candle;
pub mod hyperliquid;
pub mod interval;
pub mod source;

pub use candle::*;
pub use hyperliquid::*;
pub use interval::*;
pub use source::*;
