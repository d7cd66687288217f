//! Upstream candle providers.
//!
//! Every provider implements [`CandleProvider`] and returns a [`RawPayload`]
//! tagged with the schema the normalizer needs to read it. Providers are
//! assembled into a priority chain by [`build_chain`].

pub mod binance;
pub mod coingecko;
pub mod cryptocompare;
pub mod exchanges;
pub mod http;

pub use binance::BinanceClient;
pub use coingecko::CoinGeckoClient;
pub use cryptocompare::CryptoCompareClient;
pub use exchanges::{ExchangeClient, MultiExchangeClient, Venue};

use crate::config::Config;
use crate::error::Result;
use crate::types::{CandleRequest, SourceId, Timeframe};
use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Layout of a provider payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadSchema {
    /// `[[open_ms, "o", "h", "l", "c", "v", close_ms, ...], ...]`
    BinanceKlines,
    /// `[[ts_ms, o, h, l, c, v?], ...]`
    OhlcvRows { has_volume: bool },
    /// `{"Data": {"Data": [{"time", "open", "high", "low", "close", "volumeto"}]}}`
    CryptoCompareHisto,
    /// `{"prices": [[ts_ms, price], ...]}` grouped into `window` points per
    /// candle, high/low taken over `lookback` windows. With `align` set the
    /// candles are then resampled onto that timeframe's boundaries.
    PriceSeries {
        window: usize,
        lookback: usize,
        align: Option<Timeframe>,
    },
}

/// Unparsed provider response.
#[derive(Debug, Clone)]
pub struct RawPayload {
    pub source: SourceId,
    pub schema: PayloadSchema,
    pub body: Value,
}

impl RawPayload {
    pub fn new(source: impl Into<SourceId>, schema: PayloadSchema, body: Value) -> Self {
        Self {
            source: source.into(),
            schema,
            body,
        }
    }
}

/// A source of OHLCV candles.
#[async_trait]
pub trait CandleProvider: Send + Sync {
    /// Identifier recorded as the source of the candles.
    fn id(&self) -> &str;

    /// Providers that only work with caller credentials are skipped otherwise.
    fn requires_credentials(&self) -> bool {
        false
    }

    /// Fetch the raw payload for a request.
    async fn fetch(&self, request: &CandleRequest) -> Result<RawPayload>;
}

/// Entry of the configured provider priority order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderSlot {
    BinanceAuth,
    BinancePublic,
    Exchanges,
    CoinGecko,
    CryptoCompare,
}

impl ProviderSlot {
    pub const DEFAULT_ORDER: [ProviderSlot; 5] = [
        ProviderSlot::BinanceAuth,
        ProviderSlot::BinancePublic,
        ProviderSlot::Exchanges,
        ProviderSlot::CoinGecko,
        ProviderSlot::CryptoCompare,
    ];
}

impl fmt::Display for ProviderSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderSlot::BinanceAuth => write!(f, "binance-auth"),
            ProviderSlot::BinancePublic => write!(f, "binance-public"),
            ProviderSlot::Exchanges => write!(f, "exchanges"),
            ProviderSlot::CoinGecko => write!(f, "coingecko"),
            ProviderSlot::CryptoCompare => write!(f, "cryptocompare"),
        }
    }
}

impl FromStr for ProviderSlot {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "binance-auth" => Ok(ProviderSlot::BinanceAuth),
            "binance-public" | "binance" => Ok(ProviderSlot::BinancePublic),
            "exchanges" | "multi-exchange" => Ok(ProviderSlot::Exchanges),
            "coingecko" => Ok(ProviderSlot::CoinGecko),
            "cryptocompare" => Ok(ProviderSlot::CryptoCompare),
            other => Err(format!("unknown provider: {}", other)),
        }
    }
}

/// Build the provider chain in configured priority order.
pub fn build_chain(config: &Config) -> Vec<Arc<dyn CandleProvider>> {
    let client = http::build_client(Duration::from_secs(config.request_timeout_secs));
    let mut chain: Vec<Arc<dyn CandleProvider>> = Vec::new();

    for slot in &config.provider_order {
        match slot {
            ProviderSlot::BinanceAuth => {
                chain.push(Arc::new(BinanceClient::authenticated(client.clone())));
            }
            ProviderSlot::BinancePublic => {
                chain.push(Arc::new(BinanceClient::public(client.clone())));
            }
            ProviderSlot::Exchanges => {
                if config.exchanges.is_empty() {
                    warn!("Provider order includes exchanges but no venues are configured");
                }
                let multi = MultiExchangeClient::new(client.clone(), config.exchanges.clone());
                chain.extend(multi.providers());
            }
            ProviderSlot::CoinGecko => {
                chain.push(Arc::new(CoinGeckoClient::new(
                    client.clone(),
                    config.coingecko_api_key.clone(),
                )));
            }
            ProviderSlot::CryptoCompare => {
                chain.push(Arc::new(CryptoCompareClient::new(
                    client.clone(),
                    config.cryptocompare_api_key.clone(),
                )));
            }
        }
    }

    info!(
        "Provider chain: {}",
        chain.iter().map(|p| p.id()).collect::<Vec<_>>().join(" -> ")
    );

    chain
}
