//! Banshee - resilient multi-source OHLCV candles with RSI, MACD and
//! Williams %R signal detection.

pub mod config;
pub mod error;
pub mod services;
pub mod sources;
pub mod types;

pub use config::Config;
pub use error::{FailureKind, FetchError, Result, SourceFailure};
pub use services::{
    compute_indicators, detect_signals, FallbackFetcher, ScanConfig, ScanReport, Scanner,
};
pub use sources::CandleProvider;
