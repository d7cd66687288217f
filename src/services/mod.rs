pub mod cache;
pub mod fallback;
pub mod normalizer;
pub mod scanner;
pub mod signals;

pub use cache::{CacheKey, CandleCache, TtlCache};
pub use fallback::FallbackFetcher;
pub use normalizer::{normalize, resample};
pub use scanner::{RsiZone, ScanConfig, ScanReport, Scanner, SymbolScan};
pub use signals::indicators::{compute_macd, compute_rsi, compute_williams_r, MacdSeries};
pub use signals::{
    compute_indicators, compute_indicators_with, detect_signals, detect_signals_with,
    IndicatorConfig, SignalRules,
};
