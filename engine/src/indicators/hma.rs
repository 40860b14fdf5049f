//! HMA (Hull Moving Average) indicator

use crate::indicators::{Indicator, WMA};

/// Hull moving average: `WMA(2 * WMA(x, n/2) - WMA(x, n), floor(sqrt(n)))`.
///
/// Until the full-period WMA is ready the inner difference is fed as 0, so the
/// early output is damped rather than missing.
#[derive(Debug, Clone)]
pub struct HMA {
    period: usize,
    half: WMA,
    full: WMA,
    smooth: WMA,
}

impl HMA {
    /// Create new HMA indicator
    pub fn new(period: usize) -> Self {
        let period = period.max(1);
        let smooth_period = ((period as f64).sqrt() as usize).max(1);
        Self {
            period,
            half: WMA::new(period / 2),
            full: WMA::new(period),
            smooth: WMA::new(smooth_period),
        }
    }

    /// Get HMA period
    pub fn period(&self) -> usize {
        self.period
    }
}

impl Indicator for HMA {
    fn name(&self) -> &str {
        "HMA"
    }

    fn update(&mut self, value: f64) {
        self.half.update(value);
        self.full.update(value);

        let diff = match (self.half.value(), self.full.value()) {
            (Some(half), Some(full)) => 2.0 * half - full,
            _ => 0.0,
        };
        self.smooth.update(diff);
    }

    fn value(&self) -> Option<f64> {
        self.smooth.value()
    }

    fn is_ready(&self) -> bool {
        self.full.is_ready() && self.smooth.is_ready()
    }
}

/// Calculate HMA from a series of values; unavailable positions are 0.
pub fn calculate_hma(values: &[f64], period: usize) -> Vec<f64> {
    let mut hma = HMA::new(period);
    values
        .iter()
        .map(|&value| {
            hma.update(value);
            hma.value().unwrap_or(0.0)
        })
        .collect()
}
