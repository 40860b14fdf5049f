//! Chart overlays produced alongside signals

use serde::{Deserialize, Serialize};

use crate::portfolio::Side;

/// Per-candle trend direction: up (long bias)
pub const DIRECTION_UP: i8 = -1;
/// Per-candle trend direction: down (short bias)
pub const DIRECTION_DOWN: i8 = 1;

/// Text annotation pinned to a candle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Label {
    pub index: usize,
    pub price: f64,
    pub text: String,
    pub direction: i8,
    pub percentage: f64,
}

/// Straight segment between two candles
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Line {
    pub start_index: usize,
    pub start_price: f64,
    pub end_index: usize,
    pub end_price: f64,
    pub direction: i8,
}

/// Overlay data; every per-candle vector has one entry per analysed candle
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Visualization {
    pub trend_lines: Vec<f64>,
    pub trend_colors: Vec<String>,
    pub directions: Vec<i8>,
    pub labels: Vec<Label>,
    pub lines: Vec<Line>,
}

impl Visualization {
    /// Trend side at a candle index
    pub fn side_at(&self, index: usize) -> Option<Side> {
        match self.directions.get(index).copied() {
            Some(DIRECTION_UP) => Some(Side::Long),
            Some(DIRECTION_DOWN) => Some(Side::Short),
            _ => None,
        }
    }

    /// Side of the most recent candle
    pub fn current_side(&self) -> Option<Side> {
        self.directions
            .len()
            .checked_sub(1)
            .and_then(|last| self.side_at(last))
    }
}

/// Percentage text such as "+3.25%" or "-1.10%"; only positive values get a sign
pub fn format_percent(value: f64) -> String {
    if value > 0.0 {
        format!("+{value:.2}%")
    } else {
        format!("{value:.2}%")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_text_is_signed() {
        assert_eq!(format_percent(3.254), "+3.25%");
        assert_eq!(format_percent(-1.1), "-1.10%");
        assert_eq!(format_percent(0.0), "0.00%");
    }

    #[test]
    fn directions_map_to_sides() {
        let viz = Visualization {
            directions: vec![DIRECTION_DOWN, DIRECTION_UP],
            ..Default::default()
        };
        assert_eq!(viz.side_at(0), Some(Side::Short));
        assert_eq!(viz.current_side(), Some(Side::Long));
        assert_eq!(Visualization::default().current_side(), None);
    }
}
