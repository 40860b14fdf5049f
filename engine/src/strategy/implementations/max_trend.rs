//! Max Trend Points strategy implementation
//!
//! Band-following trend detector: the band distance is the Hull moving
//! average of each candle's high-low range, the bands sit at
//! `hl2 ± factor * distance` and ratchet toward price while the previous close
//! stays inside them. A close through the active band flips the trend, and
//! every flip is a signal.

use tracing::debug;

use crate::data::Candle;
use crate::error::EngineError;
use crate::indicators::calculate_hma;
use crate::strategy::{
    format_percent, number_param, Analysis, Label, Line, ParameterDef, Params, Signal, SignalType,
    Strategy, StrategyMetadata, Visualization, DIRECTION_DOWN, DIRECTION_UP,
};
use crate::Result;

const COLOR_LONG: &str = "#1cc2d8";
const COLOR_SHORT: &str = "#e49013";

/// Max Trend Points strategy
///
/// Its single parameter, `factor`, is optional: when the key is absent the
/// strategy runs with [`MaxTrendStrategy::DEFAULT_FACTOR`]. A present value
/// must be a number in `[0.1, 10.0]`.
#[derive(Debug, Clone)]
pub struct MaxTrendStrategy {
    factor: f64,
}

impl MaxTrendStrategy {
    pub const ID: &'static str = "max-trend";
    pub const DEFAULT_FACTOR: f64 = 2.5;
    /// HMA period of the band distance, and therefore the warm-up window
    pub const PERIOD: usize = 200;

    /// Create a strategy with the default factor
    pub fn new() -> Self {
        Self {
            factor: Self::DEFAULT_FACTOR,
        }
    }

    pub fn with_factor(factor: f64) -> Self {
        Self { factor }
    }

    pub fn factor(&self) -> f64 {
        self.factor
    }

    /// Full trend computation shared by signals and visualization
    fn compute(&self, candles: &[Candle]) -> Result<Visualization> {
        let n = candles.len();
        if n < Self::PERIOD {
            return Err(EngineError::InsufficientData {
                required: Self::PERIOD,
                actual: n,
            });
        }

        let closes: Vec<f64> = candles.iter().map(Candle::close_price).collect();
        let hl2: Vec<f64> = candles.iter().map(Candle::median_price).collect();
        let ranges: Vec<f64> = candles.iter().map(Candle::range).collect();
        let dist = calculate_hma(&ranges, Self::PERIOD);

        let mut upper: Vec<f64> = hl2.iter().zip(&dist).map(|(m, d)| m + self.factor * d).collect();
        let mut lower: Vec<f64> = hl2.iter().zip(&dist).map(|(m, d)| m - self.factor * d).collect();

        let mut directions = vec![DIRECTION_DOWN; n];
        let mut trend_lines = vec![0.0; n];
        trend_lines[0] = upper[0];

        for i in 1..n {
            let prev_close = closes[i - 1];
            if lower[i] <= lower[i - 1] && prev_close >= lower[i - 1] {
                lower[i] = lower[i - 1];
            }
            if upper[i] >= upper[i - 1] && prev_close <= upper[i - 1] {
                upper[i] = upper[i - 1];
            }

            directions[i] = if dist[i - 1] == 0.0 {
                DIRECTION_DOWN
            } else if directions[i - 1] == DIRECTION_DOWN {
                // riding the upper band
                if closes[i] > upper[i] {
                    DIRECTION_UP
                } else {
                    DIRECTION_DOWN
                }
            } else if closes[i] < lower[i] {
                DIRECTION_DOWN
            } else {
                DIRECTION_UP
            };

            trend_lines[i] = if directions[i] == DIRECTION_UP {
                lower[i]
            } else {
                upper[i]
            };
        }

        let trend_colors = directions
            .iter()
            .map(|d| {
                if *d == DIRECTION_UP {
                    COLOR_LONG.to_string()
                } else {
                    COLOR_SHORT.to_string()
                }
            })
            .collect();

        let lines = trend_legs(candles, &directions);
        let labels = leg_labels(&lines);

        Ok(Visualization {
            trend_lines,
            trend_colors,
            directions,
            labels,
            lines,
        })
    }

    fn signals_from(candles: &[Candle], directions: &[i8]) -> Vec<Signal> {
        directions
            .windows(2)
            .enumerate()
            .filter_map(|(i, pair)| {
                let signal_type = match (pair[0], pair[1]) {
                    (DIRECTION_DOWN, DIRECTION_UP) => SignalType::Long,
                    (DIRECTION_UP, DIRECTION_DOWN) => SignalType::Short,
                    _ => return None,
                };
                let candle = &candles[i + 1];
                Some(Signal::new(
                    i + 1,
                    signal_type,
                    candle.close_price(),
                    candle.open_time,
                    "Trend Reversal",
                ))
            })
            .collect()
    }
}

impl Default for MaxTrendStrategy {
    fn default() -> Self {
        Self::new()
    }
}

/// One segment per trend leg: from the flip candle's close to the most
/// extreme high (up legs) or low (down legs) reached before the next flip.
fn trend_legs(candles: &[Candle], directions: &[i8]) -> Vec<Line> {
    let mut lines = Vec::new();
    let mut current_up: Option<Line> = None;
    let mut current_dn: Option<Line> = None;
    let mut extreme: Option<(usize, f64)> = None;

    for i in 1..candles.len() {
        let direction = directions[i];
        if direction != directions[i - 1] {
            extreme = None;
            let close = candles[i].close_price();
            let line = Line {
                start_index: i,
                start_price: close,
                end_index: i,
                end_price: close,
                direction,
            };
            if direction == DIRECTION_DOWN {
                current_dn = Some(line);
                lines.extend(current_up.take());
            } else {
                current_up = Some(line);
                lines.extend(current_dn.take());
            }
            continue;
        }

        // strict comparison keeps the earliest candle on ties
        let (current, price, improves) = if direction == DIRECTION_UP {
            let high = candles[i].high_price();
            (&mut current_up, high, extreme.map_or(true, |(_, best)| high > best))
        } else {
            let low = candles[i].low_price();
            (&mut current_dn, low, extreme.map_or(true, |(_, best)| low < best))
        };

        if improves {
            extreme = Some((i, price));
        }
        if let (Some(line), Some((index, value))) = (current.as_mut(), extreme) {
            line.end_index = index;
            line.end_price = value;
        }
    }

    lines.extend(current_up);
    lines.extend(current_dn);
    lines
}

/// Percentage label at the end of every leg that moved in its own direction
fn leg_labels(lines: &[Line]) -> Vec<Label> {
    lines
        .iter()
        .filter(|line| {
            (line.direction == DIRECTION_UP && line.end_price > line.start_price)
                || (line.direction == DIRECTION_DOWN && line.end_price < line.start_price)
        })
        .map(|line| {
            let percentage = (line.end_price - line.start_price) / line.start_price * 100.0;
            Label {
                index: line.end_index,
                price: line.end_price,
                text: format_percent(percentage),
                direction: line.direction,
                percentage,
            }
        })
        .collect()
}

impl Strategy for MaxTrendStrategy {
    fn metadata(&self) -> StrategyMetadata {
        StrategyMetadata {
            id: Self::ID.to_string(),
            name: "Max Trend Points".to_string(),
            version: "1.0".to_string(),
            description:
                "Trend-following strategy using Hull Moving Average to identify trend reversals"
                    .to_string(),
            parameters: vec![ParameterDef::number("factor", "Factor", Self::DEFAULT_FACTOR)
                .with_range(0.1, 10.0)
                .with_step(0.1)],
        }
    }

    fn initialize(&mut self, params: &Params) -> Result<()> {
        self.validate_params(params)?;
        self.factor = number_param(params, "factor").unwrap_or(Self::DEFAULT_FACTOR);
        debug!(factor = self.factor, "max-trend initialized");
        Ok(())
    }

    fn warmup_candles(&self) -> usize {
        Self::PERIOD
    }

    fn generate_signals(&self, candles: &[Candle]) -> Vec<Signal> {
        self.analyze(candles).signals
    }

    fn visualization(&self, candles: &[Candle]) -> Option<Visualization> {
        self.compute(candles).ok()
    }

    fn analyze(&self, candles: &[Candle]) -> Analysis {
        match self.compute(candles) {
            Ok(visualization) => Analysis {
                signals: Self::signals_from(candles, &visualization.directions),
                visualization: Some(visualization),
            },
            Err(e) => {
                debug!(error = %e, "max-trend has no output yet");
                Analysis::default()
            }
        }
    }
}
