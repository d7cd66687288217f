//! Crossover signal detection.
//!
//! Detection is a pure recompute over an [`IndicatorFrame`]: the same frame
//! always yields the same events. Any undefined indicator value makes the
//! sub-condition that reads it false.

pub mod indicators;

pub use indicators::{compute_indicators, compute_indicators_with, IndicatorConfig};

use crate::types::{IndicatorFrame, SignalEvent, SignalKind};

/// Thresholds and look-back windows for signal detection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SignalRules {
    pub rsi_overbought: f64,
    pub rsi_oversold: f64,
    /// Williams %R level a SELL crosses down through.
    pub willr_overbought: f64,
    /// Williams %R level a BUY crosses up through.
    pub willr_oversold: f64,
    /// Deeper %R level that arms a BUY on a later recovery.
    pub willr_deep_oversold: f64,
    /// SELL accepts an overbought RSI this many candles back, nearest end.
    pub sell_lookback_near: usize,
    /// SELL accepts an overbought RSI this many candles back, farthest end.
    pub sell_lookback_far: usize,
    /// BUY accepts an oversold RSI within this many prior candles.
    pub buy_rsi_lookback: usize,
    /// BUY accepts a deep %R within this many prior candles.
    pub buy_willr_lookback: usize,
    /// Candles that must pass before the same kind fires again (0 = off).
    pub cooldown: usize,
}

impl Default for SignalRules {
    fn default() -> Self {
        Self {
            rsi_overbought: 70.0,
            rsi_oversold: 30.0,
            willr_overbought: -20.0,
            willr_oversold: -80.0,
            willr_deep_oversold: -85.0,
            sell_lookback_near: 4,
            sell_lookback_far: 10,
            buy_rsi_lookback: 11,
            buy_willr_lookback: 3,
            cooldown: 0,
        }
    }
}

/// Detect signals with the default rules.
pub fn detect_signals(frame: &IndicatorFrame) -> Vec<SignalEvent> {
    detect_signals_with(frame, &SignalRules::default())
}

/// Scan every index of the frame for SELL and BUY conditions.
///
/// Events are ordered by index, SELL before BUY at the same index.
pub fn detect_signals_with(frame: &IndicatorFrame, rules: &SignalRules) -> Vec<SignalEvent> {
    let mut events = Vec::new();
    let mut last_sell: Option<usize> = None;
    let mut last_buy: Option<usize> = None;

    for i in 1..frame.len() {
        if is_sell(frame, rules, i) && cooled_down(last_sell, i, rules.cooldown) {
            events.push(event(frame, i, SignalKind::Sell));
            last_sell = Some(i);
        }
        if is_buy(frame, rules, i) && cooled_down(last_buy, i, rules.cooldown) {
            events.push(event(frame, i, SignalKind::Buy));
            last_buy = Some(i);
        }
    }

    events
}

fn cooled_down(last: Option<usize>, i: usize, cooldown: usize) -> bool {
    last.map_or(true, |last| i - last > cooldown)
}

fn event(frame: &IndicatorFrame, i: usize, kind: SignalKind) -> SignalEvent {
    let candle = &frame.candles[i];
    SignalEvent {
        index: i,
        time: candle.open_time,
        kind,
        trigger_price: candle.close,
        indicators: frame.snapshot(i),
    }
}

fn at(series: &[Option<f64>], i: usize) -> Option<f64> {
    series.get(i).copied().flatten()
}

/// Whether `pred` holds for a defined value at any index in `from..=to`.
fn any_in(series: &[Option<f64>], from: usize, to: usize, pred: impl Fn(f64) -> bool) -> bool {
    (from..=to).any(|j| at(series, j).map_or(false, &pred))
}

fn is_sell(frame: &IndicatorFrame, rules: &SignalRules, i: usize) -> bool {
    let rsi_hot = at(&frame.rsi, i).map_or(false, |r| r > rules.rsi_overbought)
        || (i >= rules.sell_lookback_near
            && any_in(
                &frame.rsi,
                i.saturating_sub(rules.sell_lookback_far),
                i - rules.sell_lookback_near,
                |r| r > rules.rsi_overbought,
            ));

    let falling = frame.candles[i].close < frame.candles[i - 1].close;

    let willr_cross_down = match (at(&frame.willr, i - 1), at(&frame.willr, i)) {
        (Some(prev), Some(now)) => prev >= rules.willr_overbought && now < rules.willr_overbought,
        _ => false,
    };

    rsi_hot && falling && willr_cross_down
}

fn is_buy(frame: &IndicatorFrame, rules: &SignalRules, i: usize) -> bool {
    let rsi_now = at(&frame.rsi, i);
    let rsi_cold = rsi_now.map_or(false, |r| r < rules.rsi_oversold)
        || matches!(
            (at(&frame.rsi, i - 1), rsi_now),
            (Some(prev), Some(now)) if prev <= rules.rsi_oversold && now > rules.rsi_oversold
        )
        || any_in(&frame.rsi, i.saturating_sub(rules.buy_rsi_lookback), i, |r| {
            r <= rules.rsi_oversold
        });

    let candle = &frame.candles[i];
    let holding = candle.close > candle.open || candle.close >= frame.candles[i - 1].close;

    let willr_now = at(&frame.willr, i);
    let crossed_up = matches!(
        (at(&frame.willr, i - 1), willr_now),
        (Some(prev), Some(now)) if prev <= rules.willr_oversold && now > rules.willr_oversold
    );
    let recovered = willr_now.map_or(false, |now| now >= rules.willr_oversold)
        && any_in(&frame.willr, i.saturating_sub(rules.buy_willr_lookback), i - 1, |w| {
            w <= rules.willr_deep_oversold
        });

    rsi_cold && holding && (crossed_up || recovered)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Candle, Timeframe};

    /// Flat frame of `n` candles with neutral indicator readings.
    fn neutral_frame(n: usize) -> IndicatorFrame {
        let candles = (0..n)
            .map(|i| Candle::new(i as i64 * 60_000, 100.0, 101.0, 99.0, 100.0, None))
            .collect();
        IndicatorFrame {
            symbol: "BTCUSDT".to_string(),
            timeframe: Timeframe::OneMinute,
            source: "test".to_string(),
            candles,
            rsi: vec![Some(50.0); n],
            macd: vec![None; n],
            macd_signal: vec![None; n],
            macd_hist: vec![None; n],
            willr: vec![Some(-50.0); n],
        }
    }

    #[test]
    fn test_neutral_frame_has_no_signals() {
        assert!(detect_signals(&neutral_frame(40)).is_empty());
    }

    #[test]
    fn test_sell_on_willr_cross_down() {
        let mut frame = neutral_frame(20);
        frame.rsi[14] = Some(75.0);
        frame.candles[14].close = 99.0;
        frame.willr[13] = Some(-15.0);
        frame.willr[14] = Some(-22.0);

        let events = detect_signals(&frame);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, SignalKind::Sell);
        assert_eq!(events[0].index, 14);
        assert_eq!(events[0].trigger_price, 99.0);
        assert_eq!(events[0].indicators.rsi, Some(75.0));
    }

    #[test]
    fn test_sell_uses_rsi_lookback_window() {
        let mut frame = neutral_frame(20);
        frame.rsi[6] = Some(72.0); // i - 8
        frame.candles[14].close = 99.0;
        frame.willr[13] = Some(-10.0);
        frame.willr[14] = Some(-30.0);
        assert_eq!(detect_signals(&frame).len(), 1);

        // Too recent to count (i - 3)
        let mut frame = neutral_frame(20);
        frame.rsi[11] = Some(72.0);
        frame.candles[14].close = 99.0;
        frame.willr[13] = Some(-10.0);
        frame.willr[14] = Some(-30.0);
        assert!(detect_signals(&frame).is_empty());
    }

    #[test]
    fn test_sell_requires_falling_close() {
        let mut frame = neutral_frame(20);
        frame.rsi[14] = Some(75.0);
        frame.willr[13] = Some(-15.0);
        frame.willr[14] = Some(-22.0);
        assert!(detect_signals(&frame).is_empty());
    }

    #[test]
    fn test_buy_on_willr_cross_up() {
        let mut frame = neutral_frame(20);
        frame.rsi[10] = Some(28.0);
        frame.willr[9] = Some(-82.0);
        frame.willr[10] = Some(-70.0);

        let events = detect_signals(&frame);
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, SignalKind::Buy);
        assert_eq!(events[0].index, 10);
    }

    #[test]
    fn test_buy_on_recovery_from_deep_oversold() {
        let mut frame = neutral_frame(20);
        frame.rsi[5] = Some(25.0);
        frame.willr[7] = Some(-95.0);
        frame.willr[8] = Some(-70.0);
        frame.willr[9] = Some(-60.0);

        let events = detect_signals(&frame);
        let buys: Vec<usize> = events
            .iter()
            .filter(|e| e.kind == SignalKind::Buy)
            .map(|e| e.index)
            .collect();
        // 8 crosses up; 9 and 10 still see the -95 within three candles
        assert_eq!(buys, vec![8, 9, 10]);
    }

    #[test]
    fn test_buy_requires_holding_close() {
        let mut frame = neutral_frame(20);
        frame.rsi[10] = Some(28.0);
        frame.willr[9] = Some(-82.0);
        frame.willr[10] = Some(-70.0);
        frame.candles[10].close = 98.0;
        assert!(detect_signals(&frame).is_empty());
    }

    #[test]
    fn test_missing_values_never_fire() {
        let mut frame = neutral_frame(20);
        frame.rsi = vec![None; 20];
        frame.candles[14].close = 99.0;
        frame.willr[13] = Some(-15.0);
        frame.willr[14] = Some(-22.0);
        assert!(detect_signals(&frame).is_empty());
    }

    #[test]
    fn test_sell_before_buy_at_same_index() {
        let mut frame = neutral_frame(20);
        // Both an overbought and an oversold RSI in range, close equal to open
        frame.rsi[14] = Some(75.0);
        frame.rsi[13] = Some(20.0);
        frame.candles[14].open = 98.0;
        frame.candles[14].close = 99.0;
        frame.willr[11] = Some(-90.0);
        frame.willr[13] = Some(-15.0);
        frame.willr[14] = Some(-22.0);

        let events = detect_signals(&frame);
        let at_14: Vec<SignalKind> = events.iter().filter(|e| e.index == 14).map(|e| e.kind).collect();
        assert_eq!(at_14, vec![SignalKind::Sell, SignalKind::Buy]);
    }

    #[test]
    fn test_cooldown_suppresses_repeats() {
        let mut frame = neutral_frame(30);
        for i in [10, 12] {
            frame.rsi[i] = Some(28.0);
            frame.willr[i - 1] = Some(-90.0);
            frame.willr[i] = Some(-70.0);
        }

        let all = detect_signals(&frame);
        assert!(all.len() >= 2);

        let rules = SignalRules {
            cooldown: 5,
            ..SignalRules::default()
        };
        let debounced = detect_signals_with(&frame, &rules);
        assert_eq!(debounced.len(), 1);
        assert_eq!(debounced[0].index, 10);
    }

    #[test]
    fn test_detection_is_pure() {
        let mut frame = neutral_frame(20);
        frame.rsi[14] = Some(75.0);
        frame.candles[14].close = 99.0;
        frame.willr[13] = Some(-15.0);
        frame.willr[14] = Some(-22.0);
        assert_eq!(detect_signals(&frame), detect_signals(&frame));
    }
}
