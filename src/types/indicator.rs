use crate::types::{Candle, SourceId, Timeframe};
use serde::{Deserialize, Serialize};

/// Indicator values at one index.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub rsi: Option<f64>,
    pub macd: Option<f64>,
    pub macd_signal: Option<f64>,
    pub macd_hist: Option<f64>,
    pub willr: Option<f64>,
}

/// Candles annotated with parallel indicator series.
///
/// Every series has the same length as `candles`. Warm-up entries are
/// `None`. Entry `i` only depends on candles `0..=i`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorFrame {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub source: SourceId,
    pub candles: Vec<Candle>,
    pub rsi: Vec<Option<f64>>,
    pub macd: Vec<Option<f64>>,
    pub macd_signal: Vec<Option<f64>>,
    pub macd_hist: Vec<Option<f64>>,
    pub willr: Vec<Option<f64>>,
}

impl IndicatorFrame {
    /// Frame with no rows.
    pub fn empty(symbol: &str, timeframe: Timeframe, source: &str) -> Self {
        Self {
            symbol: symbol.to_string(),
            timeframe,
            source: source.to_string(),
            candles: Vec::new(),
            rsi: Vec::new(),
            macd: Vec::new(),
            macd_signal: Vec::new(),
            macd_hist: Vec::new(),
            willr: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn snapshot(&self, index: usize) -> IndicatorSnapshot {
        let at = |series: &[Option<f64>]| series.get(index).copied().flatten();
        IndicatorSnapshot {
            rsi: at(&self.rsi),
            macd: at(&self.macd),
            macd_signal: at(&self.macd_signal),
            macd_hist: at(&self.macd_hist),
            willr: at(&self.willr),
        }
    }

    /// Most recent defined RSI value.
    pub fn latest_rsi(&self) -> Option<f64> {
        self.rsi.last().copied().flatten()
    }
}
