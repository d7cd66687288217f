use crate::types::IndicatorSnapshot;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Signal direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SignalKind {
    Buy,
    Sell,
}

impl fmt::Display for SignalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SignalKind::Buy => write!(f, "BUY"),
            SignalKind::Sell => write!(f, "SELL"),
        }
    }
}

/// A detected buy/sell condition at one candle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalEvent {
    /// Position of the triggering candle in the frame.
    pub index: usize,
    /// Open time of the triggering candle (epoch ms).
    pub time: i64,
    pub kind: SignalKind,
    /// Close of the triggering candle.
    pub trigger_price: f64,
    pub indicators: IndicatorSnapshot,
}
