//! Relative Strength Index (RSI) indicator.

use super::ema::ewm;

/// RSI (Relative Strength Index).
///
/// Gains and losses between consecutive closes are smoothed with
/// `alpha = 1 / period` (seeded with the first change). Values range 0-100:
/// - Below 30: oversold
/// - Above 70: overbought
///
/// A window without losses reads 100.
pub struct Rsi {
    period: usize,
}

impl Default for Rsi {
    fn default() -> Self {
        Self { period: 14 }
    }
}

impl Rsi {
    pub fn new(period: usize) -> Self {
        Self { period: period.max(1) }
    }

    pub fn period(&self) -> usize {
        self.period
    }

    /// Candles needed for the first value.
    pub fn min_periods(&self) -> usize {
        self.period + 1
    }

    /// RSI at every index, `None` for indices below `period`.
    pub fn series(&self, closes: &[f64]) -> Vec<Option<f64>> {
        let mut out = vec![None; closes.len()];
        if closes.len() < self.min_periods() {
            return out;
        }

        let mut gains = Vec::with_capacity(closes.len() - 1);
        let mut losses = Vec::with_capacity(closes.len() - 1);
        for pair in closes.windows(2) {
            let change = pair[1] - pair[0];
            gains.push(change.max(0.0));
            losses.push((-change).max(0.0));
        }

        let alpha = 1.0 / self.period as f64;
        let avg_gain = ewm(&gains, alpha);
        let avg_loss = ewm(&losses, alpha);

        // Change k sits between closes k and k+1
        for i in self.period..closes.len() {
            let (up, down) = (avg_gain[i - 1], avg_loss[i - 1]);
            let rsi = if down == 0.0 {
                100.0
            } else {
                100.0 - 100.0 / (1.0 + up / down)
            };
            out[i] = Some(rsi.clamp(0.0, 100.0));
        }

        out
    }
}

/// RSI series for `closes` with the given period.
pub fn compute_rsi(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    Rsi::new(period).series(closes)
}
