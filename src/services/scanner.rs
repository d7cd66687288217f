//! Watchlist scanner.
//!
//! Fetches each symbol through the fallback chain with bounded concurrency,
//! computes indicators and shortlists symbols whose latest RSI is
//! overbought or oversold. A symbol that cannot be served is recorded as
//! unavailable and the scan carries on.

use crate::config::Config;
use crate::services::fallback::FallbackFetcher;
use crate::services::signals::{compute_indicators_with, detect_signals_with, IndicatorConfig, SignalRules};
use crate::types::{Credentials, SignalEvent, SourceId, Timeframe};
use futures_util::stream::{self, StreamExt};
use serde::Serialize;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Scan parameters.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub timeframe: Timeframe,
    pub limit: usize,
    pub max_coins: usize,
    pub concurrency: usize,
    /// Wall-clock budget for the whole scan.
    pub deadline: Duration,
    pub rsi_overbought: f64,
    pub rsi_oversold: f64,
    pub indicators: IndicatorConfig,
    pub rules: SignalRules,
}

impl Default for ScanConfig {
    fn default() -> Self {
        Self {
            timeframe: Timeframe::OneHour,
            limit: 200,
            max_coins: 50,
            concurrency: 4,
            deadline: Duration::from_secs(120),
            rsi_overbought: 70.0,
            rsi_oversold: 30.0,
            indicators: IndicatorConfig::default(),
            rules: SignalRules::default(),
        }
    }
}

impl From<&Config> for ScanConfig {
    fn from(config: &Config) -> Self {
        Self {
            timeframe: config.scan_timeframe,
            limit: config.scan_limit,
            max_coins: config.max_coins,
            concurrency: config.scan_concurrency,
            deadline: Duration::from_secs(config.scan_deadline_secs),
            rsi_overbought: config.rsi_overbought,
            rsi_oversold: config.rsi_oversold,
            indicators: IndicatorConfig::default(),
            rules: SignalRules {
                rsi_overbought: config.rsi_overbought,
                rsi_oversold: config.rsi_oversold,
                ..SignalRules::default()
            },
        }
    }
}

/// Where the latest RSI sits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RsiZone {
    Overbought,
    Oversold,
    Neutral,
    Unavailable,
}

impl RsiZone {
    pub fn classify(rsi: Option<f64>, overbought: f64, oversold: f64) -> Self {
        match rsi {
            Some(r) if r > overbought => RsiZone::Overbought,
            Some(r) if r < oversold => RsiZone::Oversold,
            Some(_) => RsiZone::Neutral,
            None => RsiZone::Unavailable,
        }
    }
}

impl fmt::Display for RsiZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RsiZone::Overbought => write!(f, "overbought"),
            RsiZone::Oversold => write!(f, "oversold"),
            RsiZone::Neutral => write!(f, "neutral"),
            RsiZone::Unavailable => write!(f, "unavailable"),
        }
    }
}

/// Result for one scanned symbol.
#[derive(Debug, Clone, Serialize)]
pub struct SymbolScan {
    pub symbol: String,
    pub source: Option<SourceId>,
    pub latest_close: Option<f64>,
    pub rsi: Option<f64>,
    pub zone: RsiZone,
    /// Most recent signal in the fetched window.
    pub last_signal: Option<SignalEvent>,
    /// Why the symbol is unavailable.
    pub error: Option<String>,
}

impl SymbolScan {
    pub fn unavailable(symbol: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            source: None,
            latest_close: None,
            rsi: None,
            zone: RsiZone::Unavailable,
            last_signal: None,
            error: Some(reason.into()),
        }
    }
}

/// Scan results in input order plus the RSI shortlists.
#[derive(Debug, Clone, Serialize)]
pub struct ScanReport {
    pub results: Vec<SymbolScan>,
    /// Overbought symbols, highest RSI first.
    pub overbought: Vec<SymbolScan>,
    /// Oversold symbols, lowest RSI first.
    pub oversold: Vec<SymbolScan>,
}

impl ScanReport {
    pub fn new(results: Vec<SymbolScan>) -> Self {
        let rsi_of = |s: &SymbolScan| s.rsi.unwrap_or(f64::NAN);

        let mut overbought: Vec<SymbolScan> = results
            .iter()
            .filter(|s| s.zone == RsiZone::Overbought)
            .cloned()
            .collect();
        overbought.sort_by(|a, b| rsi_of(b).total_cmp(&rsi_of(a)));

        let mut oversold: Vec<SymbolScan> = results
            .iter()
            .filter(|s| s.zone == RsiZone::Oversold)
            .cloned()
            .collect();
        oversold.sort_by(|a, b| rsi_of(a).total_cmp(&rsi_of(b)));

        Self {
            results,
            overbought,
            oversold,
        }
    }

    pub fn unavailable(&self) -> impl Iterator<Item = &SymbolScan> {
        self.results.iter().filter(|s| s.zone == RsiZone::Unavailable)
    }
}

/// Concurrent RSI scanner over a fallback fetcher.
pub struct Scanner {
    fetcher: Arc<FallbackFetcher>,
    config: ScanConfig,
    credentials: Option<Credentials>,
}

impl Scanner {
    pub fn new(fetcher: Arc<FallbackFetcher>, config: ScanConfig) -> Self {
        Self {
            fetcher,
            config,
            credentials: None,
        }
    }

    /// Forward credentials to providers that need them.
    pub fn with_credentials(mut self, credentials: Option<Credentials>) -> Self {
        self.credentials = credentials;
        self
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Scan up to `max_coins` symbols.
    pub async fn scan(&self, symbols: &[String]) -> ScanReport {
        let symbols: Vec<&String> = symbols.iter().take(self.config.max_coins).collect();
        let deadline = tokio::time::Instant::now() + self.config.deadline;
        info!(
            "Scanning {} symbols on {} (concurrency {})",
            symbols.len(),
            self.config.timeframe,
            self.config.concurrency
        );

        let mut slots: Vec<Option<SymbolScan>> = vec![None; symbols.len()];
        {
            let this = self;
            let mut pending = stream::iter(symbols.iter().enumerate().map(|(index, symbol)| async move {
                (index, this.scan_symbol(symbol).await)
            }))
            .buffer_unordered(self.config.concurrency.max(1));

            loop {
                match tokio::time::timeout_at(deadline, pending.next()).await {
                    Ok(Some((index, scan))) => slots[index] = Some(scan),
                    Ok(None) => break,
                    Err(_) => {
                        warn!("Scan deadline reached, abandoning unfinished symbols");
                        break;
                    }
                }
            }
        }

        let results: Vec<SymbolScan> = slots
            .into_iter()
            .zip(symbols)
            .map(|(slot, symbol)| {
                slot.unwrap_or_else(|| SymbolScan::unavailable(symbol.as_str(), "scan deadline exceeded"))
            })
            .collect();

        let report = ScanReport::new(results);
        info!(
            "Scan done: {} overbought, {} oversold, {} unavailable",
            report.overbought.len(),
            report.oversold.len(),
            report.unavailable().count()
        );
        report
    }

    async fn scan_symbol(&self, symbol: &str) -> SymbolScan {
        let fetched = self
            .fetcher
            .fetch_candles(symbol, self.config.timeframe, self.config.limit, self.credentials.clone())
            .await;

        let (sequence, source) = match fetched {
            Ok(found) => found,
            Err(e) => {
                warn!("{} unavailable: {}", symbol, e);
                return SymbolScan::unavailable(symbol, e.to_string());
            }
        };

        let frame = compute_indicators_with(&sequence, &self.config.indicators);
        let rsi = frame.latest_rsi();
        let zone = RsiZone::classify(rsi, self.config.rsi_overbought, self.config.rsi_oversold);
        let last_signal = detect_signals_with(&frame, &self.config.rules).pop();

        debug!("{} rsi={:?} zone={} via {}", symbol, rsi, zone, source);

        SymbolScan {
            symbol: sequence.symbol.clone(),
            source: Some(source),
            latest_close: sequence.last().map(|c| c.close),
            rsi,
            zone,
            last_signal,
            error: rsi.is_none().then(|| "not enough candles for RSI".to_string()),
        }
    }
}
