//! Exponential Moving Average (EMA).

/// Exponentially weighted mean with smoothing factor `alpha`, seeded with
/// the first value and not bias-adjusted.
pub fn ewm(values: &[f64], alpha: f64) -> Vec<f64> {
    let mut out = Vec::with_capacity(values.len());
    let mut prev: Option<f64> = None;
    for &value in values {
        let next = match prev {
            Some(p) => alpha * value + (1.0 - alpha) * p,
            None => value,
        };
        out.push(next);
        prev = Some(next);
    }
    out
}

/// EMA with span `period`, i.e. `alpha = 2 / (period + 1)`.
pub struct Ema {
    period: usize,
}

impl Ema {
    pub fn new(period: usize) -> Self {
        Self { period }
    }

    pub fn alpha(&self) -> f64 {
        2.0 / (self.period as f64 + 1.0)
    }

    /// EMA at every index of `values`.
    pub fn series(&self, values: &[f64]) -> Vec<f64> {
        ewm(values, self.alpha())
    }
}
