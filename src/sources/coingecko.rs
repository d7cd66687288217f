use crate::error::{FetchError, Result};
use crate::sources::{http, CandleProvider, PayloadSchema, RawPayload};
use crate::types::{CandleRequest, SymbolPair, Timeframe};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

const COINGECKO_API_URL: &str = "https://api.coingecko.com/api/v3";

/// Prior windows folded into a synthesised candle's high and low.
const PRICE_SERIES_LOOKBACK: usize = 3;

/// Base asset to CoinGecko coin ids, tried in order.
pub const SYMBOL_TO_IDS: &[(&str, &[&str])] = &[
    ("BTC", &["bitcoin"]),
    ("ETH", &["ethereum"]),
    ("BNB", &["binancecoin"]),
    ("SOL", &["solana"]),
    ("XRP", &["ripple"]),
    ("DOGE", &["dogecoin"]),
    ("ADA", &["cardano"]),
    ("AVAX", &["avalanche-2"]),
    ("DOT", &["polkadot"]),
    ("LINK", &["chainlink"]),
    ("MATIC", &["matic-network", "polygon-ecosystem-token"]),
    ("POL", &["polygon-ecosystem-token", "matic-network"]),
    ("SHIB", &["shiba-inu"]),
    ("LTC", &["litecoin"]),
    ("TRX", &["tron"]),
    ("ATOM", &["cosmos"]),
    ("UNI", &["uniswap"]),
    ("XLM", &["stellar"]),
    ("BCH", &["bitcoin-cash"]),
    ("NEAR", &["near"]),
    ("APT", &["aptos"]),
    ("TON", &["the-open-network", "toncoin"]),
];

const DOLLAR_QUOTES: &[&str] = &["USD", "USDT", "USDC", "BUSD", "FDUSD", "TUSD"];

/// `/ohlc` rows, `[ts_ms, open, high, low, close]`.
type CoinGeckoOhlc = Vec<Vec<Value>>;

/// `/market_chart` body. Only the price series is used.
#[derive(Debug, Deserialize)]
struct CoinGeckoMarketChart {
    prices: Vec<Vec<Value>>,
}

/// Endpoint and grouping used to serve a timeframe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Plan {
    /// Native `/ohlc` candles, no volume.
    Ohlc { days: u32 },
    /// `/market_chart` price points grouped `window` at a time, then
    /// resampled onto `align` boundaries when set.
    MarketChart {
        days: u32,
        window: usize,
        align: Option<Timeframe>,
    },
}

impl Plan {
    /// Pick an endpoint for `limit` candles of `timeframe`.
    ///
    /// `market_chart` returns 5-minute points for one day, hourly points up
    /// to 90 days and daily points beyond that.
    pub fn for_request(timeframe: Timeframe, limit: usize) -> Option<Plan> {
        let span_days = |minutes: i64| -> u32 {
            let total = minutes * limit as i64;
            ((total + 1439) / 1440).max(1) as u32
        };

        match timeframe {
            Timeframe::OneMinute => None,
            Timeframe::FiveMinutes | Timeframe::FifteenMinutes | Timeframe::ThirtyMinutes => {
                // 5-minute points only exist for the last day
                Some(Plan::MarketChart {
                    days: 1,
                    window: (timeframe.minutes() / 5) as usize,
                    align: None,
                })
            }
            Timeframe::OneHour => Some(Plan::MarketChart {
                days: span_days(60).clamp(2, 90),
                window: 1,
                align: None,
            }),
            Timeframe::FourHours => {
                let days = span_days(240);
                if days <= 30 {
                    let days = [7, 14, 30].into_iter().find(|d| *d >= days).unwrap_or(30);
                    Some(Plan::Ohlc { days })
                } else {
                    // Hourly points bucketed on 4h boundaries
                    Some(Plan::MarketChart {
                        days: days.min(90),
                        window: 1,
                        align: Some(Timeframe::FourHours),
                    })
                }
            }
            Timeframe::OneDay => Some(Plan::MarketChart {
                days: span_days(1440).max(91),
                window: 1,
                align: None,
            }),
        }
    }
}

/// CoinGecko aggregator client.
///
/// Serves majors only and approximates OHLC from the price series where
/// no native candles exist at the requested resolution.
#[derive(Clone)]
pub struct CoinGeckoClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl CoinGeckoClient {
    pub fn new(client: Client, api_key: Option<String>) -> Self {
        Self {
            client,
            api_key,
            base_url: COINGECKO_API_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Coin ids for a pair, empty when the asset is not covered.
    pub fn coin_ids(pair: &SymbolPair) -> Vec<&'static str> {
        SYMBOL_TO_IDS
            .iter()
            .find(|(symbol, _)| *symbol == pair.base)
            .map(|(_, ids)| ids.to_vec())
            .unwrap_or_default()
    }

    async fn fetch_plan(&self, coin_id: &str, plan: Plan) -> Result<RawPayload> {
        let (path, schema, mut query) = match plan {
            Plan::Ohlc { days } => (
                format!("{}/coins/{}/ohlc", self.base_url, coin_id),
                PayloadSchema::OhlcvRows { has_volume: false },
                vec![("days", days.to_string())],
            ),
            Plan::MarketChart { days, window, align } => (
                format!("{}/coins/{}/market_chart", self.base_url, coin_id),
                PayloadSchema::PriceSeries {
                    window,
                    lookback: PRICE_SERIES_LOOKBACK,
                    align,
                },
                vec![("days", days.to_string())],
            ),
        };
        query.push(("vs_currency", "usd".to_string()));

        debug!("coingecko {} {:?}", coin_id, plan);

        let mut request = self.client.get(path).query(&query);
        if let Some(key) = &self.api_key {
            request = request.header("x-cg-demo-api-key", key);
        }
        let body = http::get_json(self.id(), request).await?;

        let empty = match plan {
            Plan::Ohlc { .. } => http::decode::<CoinGeckoOhlc>(self.id(), &body)?.is_empty(),
            Plan::MarketChart { .. } => http::decode::<CoinGeckoMarketChart>(self.id(), &body)?
                .prices
                .is_empty(),
        };
        if empty {
            return Err(FetchError::not_found(self.id(), coin_id));
        }
        Ok(RawPayload::new(self.id(), schema, body))
    }
}

#[async_trait]
impl CandleProvider for CoinGeckoClient {
    fn id(&self) -> &str {
        "coingecko"
    }

    async fn fetch(&self, request: &CandleRequest) -> Result<RawPayload> {
        let plan = Plan::for_request(request.timeframe, request.limit)
            .ok_or_else(|| FetchError::unsupported_timeframe(self.id(), request.timeframe.as_str()))?;

        if !DOLLAR_QUOTES.contains(&request.pair.quote.as_str()) {
            return Err(FetchError::not_found(
                self.id(),
                format!("{} is not priced in dollars", request.symbol),
            ));
        }

        for coin_id in Self::coin_ids(&request.pair) {
            match self.fetch_plan(coin_id, plan).await {
                Ok(payload) => {
                    info!("coingecko served {} as {}", request.symbol, coin_id);
                    return Ok(payload);
                }
                Err(FetchError::NotFound { .. }) => {
                    debug!("coingecko has no data for {}", coin_id);
                }
                Err(e) => return Err(e),
            }
        }

        Err(FetchError::not_found(self.id(), request.symbol.clone()))
    }
}
