//! MACD (Moving Average Convergence Divergence) indicator.

use super::ema::Ema;

/// MACD line, signal line and histogram, aligned with the input closes.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MacdSeries {
    pub macd: Vec<Option<f64>>,
    pub signal: Vec<Option<f64>>,
    pub hist: Vec<Option<f64>>,
}

/// MACD indicator.
///
/// - MACD Line = EMA(fast) - EMA(slow)
/// - Signal Line = EMA(signal) of MACD Line
/// - Histogram = MACD Line - Signal Line
///
/// All EMAs are seeded with their first input. The MACD line is reported
/// from index `slow - 1`, signal and histogram from `slow + signal - 2`.
pub struct Macd {
    fast_period: usize,
    slow_period: usize,
    signal_period: usize,
}

impl Default for Macd {
    fn default() -> Self {
        Self {
            fast_period: 12,
            slow_period: 26,
            signal_period: 9,
        }
    }
}

impl Macd {
    pub fn new(fast_period: usize, slow_period: usize, signal_period: usize) -> Self {
        Self {
            fast_period: fast_period.max(1),
            slow_period: slow_period.max(1),
            signal_period: signal_period.max(1),
        }
    }

    pub fn series(&self, closes: &[f64]) -> MacdSeries {
        let n = closes.len();
        let fast = Ema::new(self.fast_period).series(closes);
        let slow = Ema::new(self.slow_period).series(closes);
        let line: Vec<f64> = fast.iter().zip(&slow).map(|(f, s)| f - s).collect();
        let signal = Ema::new(self.signal_period).series(&line);

        let macd_from = self.slow_period - 1;
        let signal_from = self.slow_period + self.signal_period - 2;

        let mut out = MacdSeries {
            macd: vec![None; n],
            signal: vec![None; n],
            hist: vec![None; n],
        };
        for i in macd_from..n {
            out.macd[i] = Some(line[i]);
        }
        for i in signal_from..n {
            out.signal[i] = Some(signal[i]);
            out.hist[i] = Some(line[i] - signal[i]);
        }
        out
    }
}

/// MACD series for `closes` with the given periods.
pub fn compute_macd(closes: &[f64], fast: usize, slow: usize, signal: usize) -> MacdSeries {
    Macd::new(fast, slow, signal).series(closes)
}
