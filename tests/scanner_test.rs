//! Scanner tests over stub providers

use async_trait::async_trait;
use banshee::error::FetchError;
use banshee::services::{FallbackFetcher, RsiZone, ScanConfig, Scanner};
use banshee::sources::{CandleProvider, PayloadSchema, RawPayload};
use banshee::types::{CandleRequest, Timeframe};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

/// Serves a fixed shape per symbol, NotFound for anything else.
struct MarketStub {
    id: &'static str,
    delay: Option<Duration>,
}

fn closes_for(symbol: &str) -> Option<Vec<f64>> {
    match symbol {
        "UPUSDT" => Some((0..100).map(|i| 100.0 + i as f64).collect()),
        "DOWNUSDT" => Some((0..100).map(|i| 300.0 - i as f64).collect()),
        "ZIGUSDT" => Some((0..100).map(|i| if i % 2 == 0 { 100.0 } else { 101.0 }).collect()),
        _ => None,
    }
}

fn rows(closes: &[f64]) -> Value {
    let rows: Vec<Value> = closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            json!([
                i as i64 * 3_600_000,
                open,
                open.max(close) + 0.5,
                open.min(close) - 0.5,
                close,
                1.0
            ])
        })
        .collect();
    Value::Array(rows)
}

#[async_trait]
impl CandleProvider for MarketStub {
    fn id(&self) -> &str {
        self.id
    }

    async fn fetch(&self, request: &CandleRequest) -> banshee::Result<RawPayload> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match closes_for(&request.symbol) {
            Some(closes) => Ok(RawPayload::new(
                self.id,
                PayloadSchema::OhlcvRows { has_volume: true },
                rows(&closes),
            )),
            None => Err(FetchError::not_found(self.id, &request.symbol)),
        }
    }
}

fn scanner(delay: Option<Duration>, config: ScanConfig) -> Scanner {
    let provider: Arc<dyn CandleProvider> = Arc::new(MarketStub { id: "kucoin", delay });
    Scanner::new(Arc::new(FallbackFetcher::new(vec![provider])), config)
}

fn base_config() -> ScanConfig {
    ScanConfig {
        timeframe: Timeframe::OneHour,
        limit: 100,
        concurrency: 2,
        ..ScanConfig::default()
    }
}

fn watchlist(symbols: &[&str]) -> Vec<String> {
    symbols.iter().map(|s| s.to_string()).collect()
}

// =============================================================================
// Classification Tests
// =============================================================================

#[tokio::test]
async fn test_scan_classifies_symbols() {
    let scanner = scanner(None, base_config());
    let report = scanner
        .scan(&watchlist(&["ZIGUSDT", "UPUSDT", "NOPEUSDT", "DOWNUSDT"]))
        .await;

    let zones: Vec<(&str, RsiZone)> = report
        .results
        .iter()
        .map(|s| (s.symbol.as_str(), s.zone))
        .collect();
    assert_eq!(
        zones,
        vec![
            ("ZIGUSDT", RsiZone::Neutral),
            ("UPUSDT", RsiZone::Overbought),
            ("NOPEUSDT", RsiZone::Unavailable),
            ("DOWNUSDT", RsiZone::Oversold),
        ]
    );

    assert_eq!(report.overbought.len(), 1);
    assert_eq!(report.overbought[0].symbol, "UPUSDT");
    assert_eq!(report.overbought[0].source.as_deref(), Some("kucoin"));
    assert_eq!(report.overbought[0].latest_close, Some(199.0));

    assert_eq!(report.oversold.len(), 1);
    assert_eq!(report.oversold[0].symbol, "DOWNUSDT");

    let missing: Vec<_> = report.unavailable().collect();
    assert_eq!(missing.len(), 1);
    assert!(missing[0].error.as_deref().unwrap_or_default().contains("kucoin"));
}

#[tokio::test]
async fn test_scan_respects_max_coins() {
    let config = ScanConfig {
        max_coins: 2,
        ..base_config()
    };
    let report = scanner(None, config)
        .scan(&watchlist(&["UPUSDT", "DOWNUSDT", "ZIGUSDT"]))
        .await;

    let symbols: Vec<&str> = report.results.iter().map(|s| s.symbol.as_str()).collect();
    assert_eq!(symbols, vec!["UPUSDT", "DOWNUSDT"]);
}

#[tokio::test]
async fn test_empty_watchlist() {
    let report = scanner(None, base_config()).scan(&[]).await;
    assert!(report.results.is_empty());
    assert!(report.overbought.is_empty());
    assert!(report.oversold.is_empty());
}

// =============================================================================
// Deadline Tests
// =============================================================================

#[tokio::test]
async fn test_deadline_marks_unfinished_symbols() {
    let config = ScanConfig {
        deadline: Duration::from_millis(100),
        ..base_config()
    };
    let report = scanner(Some(Duration::from_secs(30)), config)
        .scan(&watchlist(&["UPUSDT", "DOWNUSDT"]))
        .await;

    assert_eq!(report.results.len(), 2);
    for scan in &report.results {
        assert_eq!(scan.zone, RsiZone::Unavailable);
        assert_eq!(scan.error.as_deref(), Some("scan deadline exceeded"));
    }
}
