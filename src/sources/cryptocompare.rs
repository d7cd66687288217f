use crate::error::{FetchError, Result};
use crate::sources::{http, CandleProvider, PayloadSchema, RawPayload};
use crate::types::{CandleRequest, Timeframe};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

const CRYPTOCOMPARE_API_URL: &str = "https://min-api.cryptocompare.com/data/v2";

/// Most points returned by a single histo call.
const MAX_POINTS: usize = 2000;

/// Histo endpoint and aggregation factor for a timeframe.
pub fn endpoint(timeframe: Timeframe) -> (&'static str, u32) {
    match timeframe {
        Timeframe::OneMinute => ("histominute", 1),
        Timeframe::FiveMinutes => ("histominute", 5),
        Timeframe::FifteenMinutes => ("histominute", 15),
        Timeframe::ThirtyMinutes => ("histominute", 30),
        Timeframe::OneHour => ("histohour", 1),
        Timeframe::FourHours => ("histohour", 4),
        Timeframe::OneDay => ("histoday", 1),
    }
}

/// Status fields of a histo response.
#[derive(Debug, Deserialize)]
struct HistoStatus {
    #[serde(rename = "Response")]
    response: String,
    #[serde(rename = "Message")]
    message: Option<String>,
}

/// Histo response body. Points stay raw for the normalizer.
#[derive(Debug, Deserialize)]
struct HistoResponse {
    #[serde(rename = "Data")]
    data: HistoData,
}

#[derive(Debug, Deserialize)]
struct HistoData {
    #[serde(rename = "Data")]
    data: Vec<Value>,
}

/// CryptoCompare aggregate OHLCV client.
#[derive(Clone)]
pub struct CryptoCompareClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
}

impl CryptoCompareClient {
    pub fn new(client: Client, api_key: Option<String>) -> Self {
        Self {
            client,
            api_key,
            base_url: CRYPTOCOMPARE_API_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    async fn fetch_histo(&self, fsym: &str, tsym: &str, request: &CandleRequest) -> Result<RawPayload> {
        let (path, aggregate) = endpoint(request.timeframe);
        let limit = request.limit.min(MAX_POINTS);

        debug!("cryptocompare {} {}/{} aggregate={} limit={}", path, fsym, tsym, aggregate, limit);

        let mut http_request = self
            .client
            .get(format!("{}/{}", self.base_url, path))
            .query(&[
                ("fsym", fsym.to_string()),
                ("tsym", tsym.to_string()),
                ("limit", limit.to_string()),
                ("aggregate", aggregate.to_string()),
            ]);
        if let Some(key) = &self.api_key {
            http_request = http_request.header("authorization", format!("Apikey {}", key));
        }

        let body = http::get_json(self.id(), http_request).await?;

        let status: HistoStatus = http::decode(self.id(), &body)?;
        if status.response == "Error" {
            let message = status.message.as_deref().unwrap_or("unknown error");
            return Err(http::classify_message(self.id(), message)
                .unwrap_or_else(|| FetchError::unreachable(self.id(), message.to_string())));
        }

        let histo: HistoResponse = http::decode(self.id(), &body)?;

        // Unknown pairs come back as a run of all-zero points
        let has_prices = histo
            .data
            .data
            .iter()
            .any(|p| p.get("close").and_then(Value::as_f64).map_or(false, |c| c != 0.0));
        if !has_prices {
            return Err(FetchError::not_found(self.id(), format!("{}/{}", fsym, tsym)));
        }

        Ok(RawPayload::new(self.id(), PayloadSchema::CryptoCompareHisto, body))
    }
}

#[async_trait]
impl CandleProvider for CryptoCompareClient {
    fn id(&self) -> &str {
        "cryptocompare"
    }

    async fn fetch(&self, request: &CandleRequest) -> Result<RawPayload> {
        let fsym = request.pair.base.as_str();

        for tsym in request.pair.quote_candidates() {
            match self.fetch_histo(fsym, &tsym, request).await {
                Ok(payload) => {
                    info!("cryptocompare served {}/{}", fsym, tsym);
                    return Ok(payload);
                }
                Err(FetchError::NotFound { .. }) => {
                    debug!("cryptocompare has no market {}/{}", fsym, tsym);
                }
                Err(e) => return Err(e),
            }
        }

        Err(FetchError::not_found(self.id(), request.symbol.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_aggregates() {
        assert_eq!(endpoint(Timeframe::FifteenMinutes), ("histominute", 15));
        assert_eq!(endpoint(Timeframe::FourHours), ("histohour", 4));
        assert_eq!(endpoint(Timeframe::OneDay), ("histoday", 1));
    }

    #[test]
    fn test_aggregate_spans_timeframe() {
        for tf in Timeframe::ALL {
            let (path, aggregate) = endpoint(tf);
            let unit = match path {
                "histominute" => 1,
                "histohour" => 60,
                _ => 1440,
            };
            assert_eq!(unit * aggregate as i64, tf.minutes());
        }
    }
}
