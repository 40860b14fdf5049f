//! Exchange integration module
//!
//! Venue contract used by the position manager, plus an in-memory paper venue.

pub mod adapter;
pub mod order;
pub mod paper;

pub use adapter::*;
pub use order::*;
pub use paper::*;
