//! Strategy engine module
//!
//! Strategy contract, parameter definitions, signals, chart overlays and the
//! registry of available strategies.

pub mod base;
pub mod implementations;
pub mod params;
pub mod registry;
pub mod signal;
pub mod visualization;

pub use base::*;
pub use implementations::*;
pub use params::*;
pub use registry::*;
pub use signal::*;
pub use visualization::*;
