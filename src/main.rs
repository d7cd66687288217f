use banshee::services::{ScanConfig, Scanner, SymbolScan};
use banshee::sources::ProviderSlot;
use banshee::{Config, FallbackFetcher};
use chrono::{TimeZone, Utc};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "banshee=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env();
    info!(
        "Starting Banshee scan of {} symbols (max {})",
        config.watchlist.len(),
        config.max_coins
    );

    if config.provider_order.contains(&ProviderSlot::BinanceAuth) && config.binance_credentials.is_none() {
        info!("No Binance API credentials configured, authenticated client will be skipped");
    }

    let fetcher = Arc::new(FallbackFetcher::from_config(&config));
    let scanner = Scanner::new(fetcher, ScanConfig::from(&config))
        .with_credentials(config.binance_credentials.clone());

    let report = scanner.scan(&config.watchlist).await;

    for scan in &report.overbought {
        log_shortlisted("OVERBOUGHT", scan);
    }
    for scan in &report.oversold {
        log_shortlisted("OVERSOLD", scan);
    }
    for scan in report.unavailable() {
        warn!(
            "{} unavailable: {}",
            scan.symbol,
            scan.error.as_deref().unwrap_or("unknown error")
        );
    }

    if !report.results.is_empty() && report.unavailable().count() == report.results.len() {
        anyhow::bail!("no symbol could be fetched from any source");
    }

    Ok(())
}

fn log_shortlisted(label: &str, scan: &SymbolScan) {
    info!(
        "{} {} rsi={:.2} close={} via {}",
        label,
        scan.symbol,
        scan.rsi.unwrap_or_default(),
        scan.latest_close.map(|c| c.to_string()).unwrap_or_default(),
        scan.source.as_deref().unwrap_or("-")
    );

    if let Some(signal) = &scan.last_signal {
        let when = Utc
            .timestamp_millis_opt(signal.time)
            .single()
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| signal.time.to_string());
        info!(
            "  latest {} at {} price={} rsi={:?} willr={:?}",
            signal.kind, when, signal.trigger_price, signal.indicators.rsi, signal.indicators.willr
        );
    }
}
