//! Williams %R oscillator.

/// Williams %R.
///
/// Position of the close within the trailing high/low range:
/// %R = (Highest High - Close) / (Highest High - Lowest Low) * -100
///
/// Reads between -100 and 0:
/// - Above -20: overbought
/// - Below -80: oversold
///
/// A flat window reads -50.
pub struct WilliamsR {
    period: usize,
}

impl Default for WilliamsR {
    fn default() -> Self {
        Self { period: 14 }
    }
}

impl WilliamsR {
    pub fn new(period: usize) -> Self {
        Self { period: period.max(1) }
    }

    /// %R at every index, `None` below `period - 1`.
    pub fn series(&self, highs: &[f64], lows: &[f64], closes: &[f64]) -> Vec<Option<f64>> {
        let n = closes.len().min(highs.len()).min(lows.len());
        let mut out = vec![None; closes.len()];
        if n < self.period {
            return out;
        }

        for i in (self.period - 1)..n {
            let start = i + 1 - self.period;
            let highest_high = highs[start..=i].iter().copied().fold(f64::NEG_INFINITY, f64::max);
            let lowest_low = lows[start..=i].iter().copied().fold(f64::INFINITY, f64::min);

            let value = if highest_high != lowest_low {
                (highest_high - closes[i]) / (highest_high - lowest_low) * -100.0
            } else {
                -50.0
            };
            out[i] = Some(value.clamp(-100.0, 0.0));
        }

        out
    }
}

/// Williams %R series with the given period.
pub fn compute_williams_r(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> Vec<Option<f64>> {
    WilliamsR::new(period).series(highs, lows, closes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_warm_up() {
        let highs = vec![2.0; 20];
        let lows = vec![1.0; 20];
        let closes = vec![1.5; 20];
        let out = compute_williams_r(&highs, &lows, &closes, 14);
        assert!(out[12].is_none());
        assert_eq!(out[13], Some(-50.0));
    }

    #[test]
    fn test_close_at_extremes() {
        let highs = vec![10.0, 12.0, 11.0];
        let lows = vec![8.0, 9.0, 9.5];
        assert_eq!(compute_williams_r(&highs, &lows, &[9.0, 10.0, 12.0], 3)[2], Some(0.0));
        assert_eq!(compute_williams_r(&highs, &lows, &[9.0, 10.0, 8.0], 3)[2], Some(-100.0));
    }

    #[test]
    fn test_flat_window() {
        let flat = vec![5.0; 14];
        let out = compute_williams_r(&flat, &flat, &flat, 14);
        assert_eq!(out[13], Some(-50.0));
    }

    #[test]
    fn test_range_bounds_with_inconsistent_rows() {
        // Close above the reported high still reads within range
        let highs = vec![10.0, 10.0];
        let lows = vec![9.0, 9.0];
        let out = compute_williams_r(&highs, &lows, &[9.5, 10.5], 2);
        assert_eq!(out[1], Some(0.0));
    }
}
