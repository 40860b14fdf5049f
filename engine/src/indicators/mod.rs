//! Technical indicators module
//!
//! Moving averages used by the built-in strategies.

pub mod hma;
pub mod wma;

pub use hma::*;
pub use wma::*;

/// Indicator trait for all indicators
pub trait Indicator {
    /// Get the name of the indicator
    fn name(&self) -> &str;

    /// Update indicator with new value
    fn update(&mut self, value: f64);

    /// Get current indicator value
    fn value(&self) -> Option<f64>;

    /// Check if indicator is ready (has enough data)
    fn is_ready(&self) -> bool;
}
