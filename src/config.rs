use crate::sources::{ProviderSlot, Venue};
use crate::types::{Credentials, Timeframe, MAX_LIMIT};
use std::env;
use tracing::warn;

/// Symbols scanned when `WATCHLIST` is unset.
pub const DEFAULT_WATCHLIST: &[&str] = &[
    "BTCUSDT", "ETHUSDT", "BNBUSDT", "SOLUSDT", "XRPUSDT", "DOGEUSDT", "ADAUSDT", "AVAXUSDT",
    "DOTUSDT", "LINKUSDT", "LTCUSDT", "TRXUSDT", "ATOMUSDT", "UNIUSDT", "XLMUSDT", "BCHUSDT",
    "NEARUSDT", "APTUSDT", "SHIBUSDT", "TONUSDT",
];

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Symbols to scan, in order.
    pub watchlist: Vec<String>,
    /// Binance API credentials (enables the authenticated provider).
    pub binance_credentials: Option<Credentials>,
    /// Provider priority order.
    pub provider_order: Vec<ProviderSlot>,
    /// Alternate venues tried in the exchanges slot, in order.
    pub exchanges: Vec<Venue>,
    /// Cap on symbols per scan.
    pub max_coins: usize,
    /// Scan candle timeframe.
    pub scan_timeframe: Timeframe,
    /// Candles fetched per symbol.
    pub scan_limit: usize,
    /// Symbols fetched concurrently.
    pub scan_concurrency: usize,
    /// Whole-scan deadline (seconds).
    pub scan_deadline_secs: u64,
    /// Per HTTP call timeout (seconds).
    pub request_timeout_secs: u64,
    /// Candle cache TTL (seconds, 0 disables the cache).
    pub cache_ttl_secs: u64,
    pub rsi_overbought: f64,
    pub rsi_oversold: f64,
    /// CoinGecko demo API key (optional).
    pub coingecko_api_key: Option<String>,
    /// CryptoCompare API key (optional).
    pub cryptocompare_api_key: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            watchlist: DEFAULT_WATCHLIST.iter().map(|s| s.to_string()).collect(),
            binance_credentials: None,
            provider_order: ProviderSlot::DEFAULT_ORDER.to_vec(),
            exchanges: Venue::DEFAULT.to_vec(),
            max_coins: 50,
            scan_timeframe: Timeframe::OneHour,
            scan_limit: 200,
            scan_concurrency: 4,
            scan_deadline_secs: 120,
            request_timeout_secs: 10,
            cache_ttl_secs: 60,
            rsi_overbought: 70.0,
            rsi_oversold: 30.0,
            coingecko_api_key: None,
            cryptocompare_api_key: None,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        // Format: "BTCUSDT,ETHUSDT,..."
        let watchlist = env::var("WATCHLIST")
            .ok()
            .map(|s| {
                s.split(',')
                    .map(|sym| sym.trim().to_uppercase())
                    .filter(|sym| !sym.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|list| !list.is_empty())
            .unwrap_or(defaults.watchlist);

        let binance_credentials = match (env::var("BINANCE_API_KEY"), env::var("BINANCE_API_SECRET")) {
            (Ok(key), Ok(secret)) if !key.is_empty() && !secret.is_empty() => {
                Some(Credentials::new(key, secret))
            }
            _ => None,
        };

        let provider_order = env::var("PROVIDER_ORDER")
            .ok()
            .map(|s| parse_list::<ProviderSlot>("PROVIDER_ORDER", &s))
            .filter(|list| !list.is_empty())
            .unwrap_or(defaults.provider_order);

        let exchanges = env::var("EXCHANGES")
            .ok()
            .map(|s| parse_list::<Venue>("EXCHANGES", &s))
            .unwrap_or(defaults.exchanges);

        Self {
            watchlist,
            binance_credentials,
            provider_order,
            exchanges,
            max_coins: env::var("MAX_COINS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_coins),
            scan_timeframe: env::var("SCAN_TIMEFRAME")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.scan_timeframe),
            scan_limit: parse_scan_limit(env::var("SCAN_LIMIT").ok().as_deref(), defaults.scan_limit),
            scan_concurrency: env::var("SCAN_CONCURRENCY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.scan_concurrency),
            scan_deadline_secs: env::var("SCAN_DEADLINE_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.scan_deadline_secs),
            request_timeout_secs: env::var("REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.request_timeout_secs),
            cache_ttl_secs: env::var("CACHE_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.cache_ttl_secs),
            rsi_overbought: env::var("RSI_OVERBOUGHT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.rsi_overbought),
            rsi_oversold: env::var("RSI_OVERSOLD")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.rsi_oversold),
            coingecko_api_key: env::var("COINGECKO_API_KEY").ok().filter(|k| !k.is_empty()),
            cryptocompare_api_key: env::var("CRYPTOCOMPARE_API_KEY").ok().filter(|k| !k.is_empty()),
        }
    }
}

/// Parse `SCAN_LIMIT`, clamped to what a candle request accepts.
fn parse_scan_limit(value: Option<&str>, default: usize) -> usize {
    let Some(raw) = value else {
        return default;
    };
    match raw.trim().parse::<usize>() {
        Ok(limit) if (1..=MAX_LIMIT).contains(&limit) => limit,
        Ok(limit) => {
            let clamped = limit.clamp(1, MAX_LIMIT);
            warn!("SCAN_LIMIT {} out of range, using {}", limit, clamped);
            clamped
        }
        Err(_) => {
            warn!("Ignoring SCAN_LIMIT {:?}, using {}", raw, default);
            default
        }
    }
}

/// Parse a comma-separated list, skipping and logging unknown entries.
fn parse_list<T: std::str::FromStr<Err = String>>(var: &str, value: &str) -> Vec<T> {
    value
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .filter_map(|item| match item.parse::<T>() {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                warn!("Ignoring {} entry: {}", var, e);
                None
            }
        })
        .collect()
}
