//! Strategy implementations

pub mod max_trend;

pub use max_trend::*;
