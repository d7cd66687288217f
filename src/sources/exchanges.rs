//! Alternate exchanges behind one unified kline interface.
//!
//! Each [`Venue`] knows its endpoint, interval codes, pair spelling and
//! response envelope, and reshapes its klines into unified rows
//! `[ts_ms, open, high, low, close, volume]`. [`ExchangeClient`] runs the
//! shared fetch logic for one venue; [`MultiExchangeClient`] expands a
//! configured venue list into one provider per venue.

use crate::error::{FetchError, Result};
use crate::sources::{http, CandleProvider, PayloadSchema, RawPayload};
use crate::types::{CandleRequest, SymbolPair, Timeframe};
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

/// Exchange reachable through the unified kline interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Venue {
    KuCoin,
    Okx,
    Kraken,
    Htx,
}

impl Venue {
    pub const DEFAULT: [Venue; 4] = [Venue::KuCoin, Venue::Okx, Venue::Kraken, Venue::Htx];

    pub fn id(&self) -> &'static str {
        match self {
            Venue::KuCoin => "kucoin",
            Venue::Okx => "okx",
            Venue::Kraken => "kraken",
            Venue::Htx => "htx",
        }
    }

    pub fn base_url(&self) -> &'static str {
        match self {
            Venue::KuCoin => "https://api.kucoin.com",
            Venue::Okx => "https://www.okx.com",
            Venue::Kraken => "https://api.kraken.com",
            Venue::Htx => "https://api.huobi.pro",
        }
    }

    /// Most rows the venue returns for one call.
    pub fn max_limit(&self) -> usize {
        match self {
            Venue::KuCoin => 1500,
            Venue::Okx => 300,
            Venue::Kraken => 720,
            Venue::Htx => 2000,
        }
    }

    /// Venue interval code for a timeframe.
    pub fn interval(&self, timeframe: Timeframe) -> &'static str {
        match (self, timeframe) {
            (Venue::KuCoin, Timeframe::OneMinute) => "1min",
            (Venue::KuCoin, Timeframe::FiveMinutes) => "5min",
            (Venue::KuCoin, Timeframe::FifteenMinutes) => "15min",
            (Venue::KuCoin, Timeframe::ThirtyMinutes) => "30min",
            (Venue::KuCoin, Timeframe::OneHour) => "1hour",
            (Venue::KuCoin, Timeframe::FourHours) => "4hour",
            (Venue::KuCoin, Timeframe::OneDay) => "1day",
            (Venue::Okx, Timeframe::OneMinute) => "1m",
            (Venue::Okx, Timeframe::FiveMinutes) => "5m",
            (Venue::Okx, Timeframe::FifteenMinutes) => "15m",
            (Venue::Okx, Timeframe::ThirtyMinutes) => "30m",
            (Venue::Okx, Timeframe::OneHour) => "1H",
            (Venue::Okx, Timeframe::FourHours) => "4H",
            (Venue::Okx, Timeframe::OneDay) => "1Dutc",
            (Venue::Kraken, Timeframe::OneMinute) => "1",
            (Venue::Kraken, Timeframe::FiveMinutes) => "5",
            (Venue::Kraken, Timeframe::FifteenMinutes) => "15",
            (Venue::Kraken, Timeframe::ThirtyMinutes) => "30",
            (Venue::Kraken, Timeframe::OneHour) => "60",
            (Venue::Kraken, Timeframe::FourHours) => "240",
            (Venue::Kraken, Timeframe::OneDay) => "1440",
            (Venue::Htx, Timeframe::OneMinute) => "1min",
            (Venue::Htx, Timeframe::FiveMinutes) => "5min",
            (Venue::Htx, Timeframe::FifteenMinutes) => "15min",
            (Venue::Htx, Timeframe::ThirtyMinutes) => "30min",
            (Venue::Htx, Timeframe::OneHour) => "60min",
            (Venue::Htx, Timeframe::FourHours) => "4hour",
            (Venue::Htx, Timeframe::OneDay) => "1day",
        }
    }

    /// Pair spellings to try on this venue, in order.
    pub fn aliases(&self, pair: &SymbolPair) -> Vec<String> {
        let quotes = pair.quote_candidates();
        match self {
            Venue::KuCoin | Venue::Okx => quotes
                .iter()
                .map(|q| format!("{}-{}", pair.base, q))
                .collect(),
            Venue::Kraken => {
                let base = match pair.base.as_str() {
                    "BTC" => "XBT",
                    "DOGE" => "XDG",
                    other => other,
                };
                quotes.iter().map(|q| format!("{}{}", base, q)).collect()
            }
            Venue::Htx => quotes
                .iter()
                .map(|q| format!("{}{}", pair.base, q).to_lowercase())
                .collect(),
        }
    }

    fn build_request(
        &self,
        client: &Client,
        base_url: &str,
        alias: &str,
        interval: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> RequestBuilder {
        let limit = limit.min(self.max_limit());
        match self {
            Venue::KuCoin => {
                let end = chrono::Utc::now().timestamp();
                let start = end - timeframe.seconds() * limit as i64;
                client
                    .get(format!("{}/api/v1/market/candles", base_url))
                    .query(&[
                        ("symbol", alias.to_string()),
                        ("type", interval.to_string()),
                        ("startAt", start.to_string()),
                        ("endAt", end.to_string()),
                    ])
            }
            Venue::Okx => client
                .get(format!("{}/api/v5/market/candles", base_url))
                .query(&[
                    ("instId", alias.to_string()),
                    ("bar", interval.to_string()),
                    ("limit", limit.to_string()),
                ]),
            Venue::Kraken => client
                .get(format!("{}/0/public/OHLC", base_url))
                .query(&[("pair", alias), ("interval", interval)]),
            Venue::Htx => client
                .get(format!("{}/market/history/kline", base_url))
                .query(&[
                    ("symbol", alias.to_string()),
                    ("period", interval.to_string()),
                    ("size", limit.to_string()),
                ]),
        }
    }

    /// Check the venue envelope and reshape klines into unified rows,
    /// oldest first.
    pub fn extract_rows(&self, body: &Value) -> Result<Vec<Value>> {
        let provider = self.id();
        let mut rows = match self {
            Venue::KuCoin => {
                let response: KuCoinResponse = http::decode(provider, body)?;
                if response.code != "200000" {
                    return Err(envelope_error(provider, &response.code, response.msg.as_deref()));
                }
                // [start_s, open, close, high, low, volume, turnover]
                kline_rows(provider, response.data)?
                    .iter()
                    .map(|row| {
                        json!([
                            seconds_to_millis(row.get(0)),
                            row.get(1),
                            row.get(3),
                            row.get(4),
                            row.get(2),
                            row.get(5)
                        ])
                    })
                    .collect::<Vec<_>>()
            }
            Venue::Okx => {
                let response: OkxResponse = http::decode(provider, body)?;
                if response.code == "51001" {
                    return Err(FetchError::not_found(provider, "instrument does not exist"));
                }
                if response.code != "0" {
                    return Err(envelope_error(provider, &response.code, response.msg.as_deref()));
                }
                // [ts_ms, open, high, low, close, vol, ...]
                kline_rows(provider, response.data)?
                    .iter()
                    .map(|row| json!([row.get(0), row.get(1), row.get(2), row.get(3), row.get(4), row.get(5)]))
                    .collect::<Vec<_>>()
            }
            Venue::Kraken => {
                let response: KrakenResponse = http::decode(provider, body)?;
                if let Some(first) = response.error.first() {
                    return Err(http::classify_message(provider, first)
                        .unwrap_or_else(|| FetchError::unreachable(provider, first.clone())));
                }
                let result = response
                    .result
                    .ok_or_else(|| FetchError::malformed(provider, "missing result"))?;
                let series = result.into_values().find_map(|entry| match entry {
                    KrakenSeries::Rows(rows) => Some(rows),
                    KrakenSeries::Last(_) => None,
                });
                // [time_s, open, high, low, close, vwap, volume, count]
                kline_rows(provider, series)?
                    .iter()
                    .map(|row| {
                        json!([
                            seconds_to_millis(row.get(0)),
                            row.get(1),
                            row.get(2),
                            row.get(3),
                            row.get(4),
                            row.get(6)
                        ])
                    })
                    .collect::<Vec<_>>()
            }
            Venue::Htx => {
                let response: HtxResponse = http::decode(provider, body)?;
                if response.status != "ok" {
                    return Err(envelope_error(provider, &response.status, response.err_msg.as_deref()));
                }
                kline_rows(provider, response.data)?
                    .iter()
                    .map(|k| json!([k.id * 1000, k.open, k.high, k.low, k.close, k.amount]))
                    .collect::<Vec<_>>()
            }
        };

        // KuCoin, OKX and HTX list newest first
        if matches!(self, Venue::KuCoin | Venue::Okx | Venue::Htx) {
            rows.reverse();
        }
        Ok(rows)
    }
}

/// KuCoin candles response.
#[derive(Debug, Deserialize)]
struct KuCoinResponse {
    code: String,
    msg: Option<String>,
    data: Option<Vec<Vec<Value>>>,
}

/// OKX candles response.
#[derive(Debug, Deserialize)]
struct OkxResponse {
    code: String,
    msg: Option<String>,
    data: Option<Vec<Vec<Value>>>,
}

/// Kraken OHLC response. `result` holds the pair's rows plus a `last` cursor.
#[derive(Debug, Deserialize)]
struct KrakenResponse {
    #[serde(default)]
    error: Vec<String>,
    result: Option<HashMap<String, KrakenSeries>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum KrakenSeries {
    Rows(Vec<Vec<Value>>),
    Last(i64),
}

/// HTX kline response.
#[derive(Debug, Deserialize)]
struct HtxResponse {
    status: String,
    #[serde(rename = "err-msg")]
    err_msg: Option<String>,
    data: Option<Vec<HtxKline>>,
}

#[derive(Debug, Deserialize)]
struct HtxKline {
    /// Bucket start, seconds.
    id: i64,
    open: f64,
    close: f64,
    low: f64,
    high: f64,
    amount: Option<f64>,
}

impl fmt::Display for Venue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

impl FromStr for Venue {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "kucoin" => Ok(Venue::KuCoin),
            "okx" => Ok(Venue::Okx),
            "kraken" => Ok(Venue::Kraken),
            "htx" | "huobi" => Ok(Venue::Htx),
            other => Err(format!("unknown exchange: {}", other)),
        }
    }
}

fn kline_rows<T>(provider: &str, data: Option<Vec<T>>) -> Result<Vec<T>> {
    data.ok_or_else(|| FetchError::malformed(provider, "missing kline array"))
}

fn envelope_error(provider: &str, code: &str, message: Option<&str>) -> FetchError {
    let message = message.unwrap_or(code);
    http::classify_message(provider, message)
        .unwrap_or_else(|| FetchError::unreachable(provider, format!("{}: {}", code, message)))
}

/// Convert a seconds timestamp (number or numeric string) to milliseconds.
fn seconds_to_millis(value: Option<&Value>) -> Value {
    let seconds = match value {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.parse::<i64>().ok(),
        _ => None,
    };
    seconds.map(|s| json!(s * 1000)).unwrap_or(Value::Null)
}

/// Kline client for a single venue.
#[derive(Clone)]
pub struct ExchangeClient {
    client: Client,
    venue: Venue,
    base_url: String,
}

impl ExchangeClient {
    pub fn new(client: Client, venue: Venue) -> Self {
        Self {
            client,
            venue,
            base_url: venue.base_url().to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn venue(&self) -> Venue {
        self.venue
    }
}

#[async_trait]
impl CandleProvider for ExchangeClient {
    fn id(&self) -> &str {
        self.venue.id()
    }

    async fn fetch(&self, request: &CandleRequest) -> Result<RawPayload> {
        let interval = self.venue.interval(request.timeframe);

        for alias in self.venue.aliases(&request.pair) {
            debug!("{} klines {} {}", self.id(), alias, interval);
            let http_request = self.venue.build_request(
                &self.client,
                &self.base_url,
                &alias,
                interval,
                request.timeframe,
                request.limit,
            );

            let rows = match http::get_json(self.id(), http_request).await {
                Ok(body) => self.venue.extract_rows(&body),
                Err(e) => Err(e),
            };

            match rows {
                Ok(rows) if rows.is_empty() => {
                    debug!("{} returned no klines for {}", self.id(), alias);
                }
                Ok(rows) => {
                    info!("{} served {} klines for {}", self.id(), rows.len(), alias);
                    return Ok(RawPayload::new(
                        self.id(),
                        PayloadSchema::OhlcvRows { has_volume: true },
                        Value::Array(rows),
                    ));
                }
                Err(FetchError::NotFound { .. }) => {
                    debug!("{} has no pair {}", self.id(), alias);
                }
                Err(e) => return Err(e),
            }
        }

        Err(FetchError::not_found(self.id(), request.symbol.clone()))
    }
}

/// Configured list of alternate venues, tried in order.
#[derive(Clone)]
pub struct MultiExchangeClient {
    client: Client,
    venues: Vec<Venue>,
}

impl MultiExchangeClient {
    pub fn new(client: Client, venues: Vec<Venue>) -> Self {
        Self { client, venues }
    }

    pub fn venues(&self) -> &[Venue] {
        &self.venues
    }

    /// One provider per venue, in configured order.
    pub fn providers(&self) -> Vec<Arc<dyn CandleProvider>> {
        self.venues
            .iter()
            .map(|venue| Arc::new(ExchangeClient::new(self.client.clone(), *venue)) as Arc<dyn CandleProvider>)
            .collect()
    }
}
