//! WMA (Weighted Moving Average) indicator

use std::collections::VecDeque;

use crate::indicators::Indicator;

/// Linearly weighted moving average: the newest value has weight `period`,
/// the oldest in the window has weight 1.
#[derive(Debug, Clone)]
pub struct WMA {
    period: usize,
    window: VecDeque<f64>,
    last_value: Option<f64>,
}

impl WMA {
    /// Create new WMA indicator. A zero period is treated as 1.
    pub fn new(period: usize) -> Self {
        let period = period.max(1);
        Self {
            period,
            window: VecDeque::with_capacity(period),
            last_value: None,
        }
    }

    /// Get WMA period
    pub fn period(&self) -> usize {
        self.period
    }

    fn weight_sum(&self) -> f64 {
        (self.period * (self.period + 1)) as f64 / 2.0
    }
}

impl Indicator for WMA {
    fn name(&self) -> &str {
        "WMA"
    }

    fn update(&mut self, value: f64) {
        if self.window.len() == self.period {
            self.window.pop_front();
        }
        self.window.push_back(value);

        if self.window.len() == self.period {
            let weighted: f64 = self
                .window
                .iter()
                .enumerate()
                .map(|(i, v)| v * (i + 1) as f64)
                .sum();
            self.last_value = Some(weighted / self.weight_sum());
        }
    }

    fn value(&self) -> Option<f64> {
        self.last_value
    }

    fn is_ready(&self) -> bool {
        self.last_value.is_some()
    }
}

/// Calculate WMA from a series of values. Positions before the first full
/// window are 0.
pub fn calculate_wma(values: &[f64], period: usize) -> Vec<f64> {
    let mut wma = WMA::new(period);
    values
        .iter()
        .map(|&value| {
            wma.update(value);
            wma.value().unwrap_or(0.0)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn newest_value_weighs_most() {
        let result = calculate_wma(&[1.0, 2.0, 3.0, 4.0], 3);
        assert_eq!(result[0], 0.0);
        assert_eq!(result[1], 0.0);
        // (1*1 + 2*2 + 3*3) / 6
        assert!((result[2] - 14.0 / 6.0).abs() < 1e-12);
        // (2*1 + 3*2 + 4*3) / 6
        assert!((result[3] - 20.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn constant_series_is_fixed_point() {
        let result = calculate_wma(&[5.0; 20], 7);
        assert!(result[6..].iter().all(|v| (v - 5.0).abs() < 1e-12));
    }
}
