//! Technical indicator implementations.

pub mod ema;
pub mod macd;
pub mod rsi;
pub mod williams_r;

pub use ema::Ema;
pub use macd::{compute_macd, Macd, MacdSeries};
pub use rsi::{compute_rsi, Rsi};
pub use williams_r::{compute_williams_r, WilliamsR};

use crate::types::{CandleSequence, IndicatorFrame};
use tracing::debug;

/// Indicator periods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndicatorConfig {
    pub rsi_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub willr_period: usize,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            willr_period: 14,
        }
    }
}

/// Annotate a sequence with the default indicator set.
pub fn compute_indicators(sequence: &CandleSequence) -> IndicatorFrame {
    compute_indicators_with(sequence, &IndicatorConfig::default())
}

/// Annotate a sequence with RSI, MACD and Williams %R.
///
/// Sequences shorter than `rsi_period + 1` yield an empty frame.
pub fn compute_indicators_with(sequence: &CandleSequence, config: &IndicatorConfig) -> IndicatorFrame {
    let rsi = Rsi::new(config.rsi_period);
    if sequence.len() < rsi.min_periods() {
        debug!(
            "{} has {} candles, need {} for indicators",
            sequence.symbol,
            sequence.len(),
            rsi.min_periods()
        );
        return IndicatorFrame::empty(&sequence.symbol, sequence.timeframe, &sequence.source);
    }

    let closes = sequence.closes();
    let macd = Macd::new(config.macd_fast, config.macd_slow, config.macd_signal).series(&closes);
    let willr = WilliamsR::new(config.willr_period).series(&sequence.highs(), &sequence.lows(), &closes);

    IndicatorFrame {
        symbol: sequence.symbol.clone(),
        timeframe: sequence.timeframe,
        source: sequence.source.clone(),
        candles: sequence.candles.clone(),
        rsi: rsi.series(&closes),
        macd: macd.macd,
        macd_signal: macd.signal,
        macd_hist: macd.hist,
        willr,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Candle, Timeframe};

    fn sequence(count: usize) -> CandleSequence {
        let candles = (0..count)
            .map(|i| {
                let base = 100.0 + (i as f64 * 0.5).sin() * 3.0;
                Candle::new(i as i64 * 3_600_000, base, base + 1.0, base - 1.0, base + 0.2, Some(10.0))
            })
            .collect();
        CandleSequence {
            symbol: "BTCUSDT".to_string(),
            timeframe: Timeframe::OneHour,
            limit: count,
            source: "binance-public".to_string(),
            candles,
        }
    }

    #[test]
    fn test_too_short_gives_empty_frame() {
        let frame = compute_indicators(&sequence(14));
        assert!(frame.is_empty());
        assert!(frame.rsi.is_empty());
        assert_eq!(frame.source, "binance-public");
    }

    #[test]
    fn test_series_aligned_with_candles() {
        let frame = compute_indicators(&sequence(15));
        assert_eq!(frame.len(), 15);
        assert_eq!(frame.rsi.len(), 15);
        assert_eq!(frame.macd_hist.len(), 15);
        assert_eq!(frame.willr.len(), 15);
        assert!(frame.rsi[14].is_some());
        assert!(frame.macd.iter().all(Option::is_none));
    }

    #[test]
    fn test_custom_periods() {
        let config = IndicatorConfig {
            rsi_period: 5,
            willr_period: 5,
            ..IndicatorConfig::default()
        };
        let frame = compute_indicators_with(&sequence(6), &config);
        assert_eq!(frame.len(), 6);
        assert!(frame.rsi[5].is_some());
        assert!(frame.willr[4].is_some());
    }
}
