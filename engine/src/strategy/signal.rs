//! Trading signals emitted by strategies

use serde::{Deserialize, Serialize};

use crate::portfolio::Side;

/// Signal type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalType {
    /// Go long
    Long,
    /// Go short
    Short,
    /// Any other value: carried through but never acted on
    #[serde(other)]
    Hold,
}

impl SignalType {
    /// The position side this signal asks for, if it is actionable
    pub fn side(self) -> Option<Side> {
        match self {
            SignalType::Long => Some(Side::Long),
            SignalType::Short => Some(Side::Short),
            SignalType::Hold => None,
        }
    }

    pub fn is_actionable(self) -> bool {
        self.side().is_some()
    }
}

impl From<Side> for SignalType {
    fn from(side: Side) -> Self {
        match side {
            Side::Long => SignalType::Long,
            Side::Short => SignalType::Short,
        }
    }
}

/// Trading signal anchored to a candle of the analysed sequence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signal {
    /// Index of the candle that produced the signal
    pub index: usize,
    #[serde(rename = "type")]
    pub signal_type: SignalType,
    /// Reference price, normally the candle close
    pub price: f64,
    /// Candle open time in ms
    pub time: i64,
    /// Reason for signal
    pub reason: String,
}

impl Signal {
    pub fn new(
        index: usize,
        signal_type: SignalType,
        price: f64,
        time: i64,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            index,
            signal_type,
            price,
            time,
            reason: reason.into(),
        }
    }

    /// Create long signal
    pub fn long(index: usize, price: f64, time: i64, reason: impl Into<String>) -> Self {
        Self::new(index, SignalType::Long, price, time, reason)
    }

    /// Create short signal
    pub fn short(index: usize, price: f64, time: i64, reason: impl Into<String>) -> Self {
        Self::new(index, SignalType::Short, price, time, reason)
    }

    pub fn side(&self) -> Option<Side> {
        self.signal_type.side()
    }
}
