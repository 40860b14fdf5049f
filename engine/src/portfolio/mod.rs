//! Portfolio management module

pub mod execution;
pub mod manager;
pub mod position;

pub use execution::*;
pub use manager::*;
pub use position::*;
