//! Base strategy trait

use serde::{Deserialize, Serialize};

use crate::data::Candle;
use crate::strategy::{validate_params, ParameterDef, Params, Signal, Visualization};
use crate::Result;

/// Catalogue entry describing a strategy and its tunable parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyMetadata {
    pub id: String,
    pub name: String,
    pub version: String,
    pub description: String,
    pub parameters: Vec<ParameterDef>,
}

/// Signals and overlay computed from one candle sequence
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Analysis {
    pub signals: Vec<Signal>,
    pub visualization: Option<Visualization>,
}

/// Base trait for all trading strategies.
///
/// A strategy is configured once through [`initialize`](Strategy::initialize)
/// and is then a pure function of the candles it is given: the same candles
/// always produce the same signals. Sequences shorter than
/// [`warmup_candles`](Strategy::warmup_candles) yield no signals.
pub trait Strategy: Send + Sync {
    fn metadata(&self) -> StrategyMetadata;

    /// Check a parameter set without applying it.
    fn validate_params(&self, params: &Params) -> Result<()> {
        validate_params(&self.metadata().parameters, params)
    }

    /// Apply parameters; absent values fall back to their defaults.
    fn initialize(&mut self, params: &Params) -> Result<()>;

    /// Minimum candles needed before any signal can be produced
    fn warmup_candles(&self) -> usize;

    fn generate_signals(&self, candles: &[Candle]) -> Vec<Signal>;

    fn visualization(&self, candles: &[Candle]) -> Option<Visualization>;

    /// Signals and overlay together. Implementations that share work between
    /// the two should override this.
    fn analyze(&self, candles: &[Candle]) -> Analysis {
        Analysis {
            signals: self.generate_signals(candles),
            visualization: self.visualization(candles),
        }
    }
}
