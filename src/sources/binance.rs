use crate::error::{FetchError, Result};
use crate::sources::{http, CandleProvider, PayloadSchema, RawPayload};
use crate::types::{CandleRequest, Credentials, SymbolPair};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use tracing::{debug, info, warn};

const BINANCE_API_URL: &str = "https://api.binance.com";

/// Binance caps a single klines call at 1000 rows.
const MAX_KLINES_PER_CALL: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Authenticated,
    Public,
}

/// Binance spot klines client.
///
/// The authenticated mode sends the caller's API key and pings the API
/// before asking for klines, so a location restriction on the account is
/// reported before any data call. The public mode needs no credentials.
#[derive(Clone)]
pub struct BinanceClient {
    client: Client,
    base_url: String,
    mode: Mode,
}

impl BinanceClient {
    /// Client that uses the credentials supplied with each request.
    pub fn authenticated(client: Client) -> Self {
        Self {
            client,
            base_url: BINANCE_API_URL.to_string(),
            mode: Mode::Authenticated,
        }
    }

    /// Client for the unauthenticated public REST API.
    pub fn public(client: Client) -> Self {
        Self {
            client,
            base_url: BINANCE_API_URL.to_string(),
            mode: Mode::Public,
        }
    }

    /// Point the client at a different host.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Trading pairs to try, in order.
    pub fn aliases(pair: &SymbolPair) -> Vec<String> {
        pair.quote_candidates()
            .into_iter()
            .map(|quote| format!("{}{}", pair.base, quote))
            .collect()
    }

    fn credentials<'a>(&self, request: &'a CandleRequest) -> Option<&'a Credentials> {
        match self.mode {
            Mode::Authenticated => request.credentials.as_ref(),
            Mode::Public => None,
        }
    }

    fn get(&self, path: &str, credentials: Option<&Credentials>) -> reqwest::RequestBuilder {
        let mut request = self.client.get(format!("{}{}", self.base_url, path));
        if let Some(creds) = credentials {
            request = request.header("X-MBX-APIKEY", &creds.api_key);
        }
        request
    }

    async fn ping(&self, credentials: &Credentials) -> Result<()> {
        http::get_json(self.id(), self.get("/api/v3/ping", Some(credentials))).await?;
        Ok(())
    }

    /// Fetch up to `limit` most recent klines, paging backwards when the
    /// limit exceeds a single call.
    async fn fetch_klines(
        &self,
        symbol: &str,
        request: &CandleRequest,
        credentials: Option<&Credentials>,
    ) -> Result<Vec<Value>> {
        let mut rows: Vec<Value> = Vec::new();
        let mut end_time: Option<i64> = None;
        let mut remaining = request.limit;

        while remaining > 0 {
            let batch = remaining.min(MAX_KLINES_PER_CALL);
            let mut query = vec![
                ("symbol", symbol.to_string()),
                ("interval", request.timeframe.as_str().to_string()),
                ("limit", batch.to_string()),
            ];
            if let Some(end) = end_time {
                query.push(("endTime", end.to_string()));
            }

            debug!("{} klines {} {} limit={}", self.id(), symbol, request.timeframe, batch);

            let body = http::get_json(self.id(), self.get("/api/v3/klines", credentials).query(&query)).await?;
            let Value::Array(mut page) = body else {
                return Err(FetchError::malformed(self.id(), "klines response is not an array"));
            };

            // Keep only the newest `batch` rows of an oversized page
            if page.len() > batch {
                page.drain(..page.len() - batch);
            }

            let page_len = page.len();
            let first_open = page
                .first()
                .and_then(|row| row.get(0))
                .and_then(Value::as_i64);

            let mut merged = page;
            merged.append(&mut rows);
            rows = merged;

            remaining = remaining.saturating_sub(page_len);
            if page_len < batch || remaining == 0 {
                break;
            }
            match first_open {
                Some(open) => end_time = Some(open - 1),
                None => break,
            }
        }

        Ok(rows)
    }
}

#[async_trait]
impl CandleProvider for BinanceClient {
    fn id(&self) -> &str {
        match self.mode {
            Mode::Authenticated => "binance-auth",
            Mode::Public => "binance-public",
        }
    }

    fn requires_credentials(&self) -> bool {
        self.mode == Mode::Authenticated
    }

    async fn fetch(&self, request: &CandleRequest) -> Result<RawPayload> {
        let credentials = self.credentials(request);
        if self.mode == Mode::Authenticated {
            let creds = credentials
                .ok_or_else(|| FetchError::auth_rejected(self.id(), "no credentials supplied"))?;
            if let Err(e) = self.ping(creds).await {
                if e.is_geo_restricted() {
                    warn!("{} refused service from this location: {}", self.id(), e);
                }
                return Err(e);
            }
        }

        for alias in Self::aliases(&request.pair) {
            match self.fetch_klines(&alias, request, credentials).await {
                Ok(rows) if rows.is_empty() => {
                    debug!("{} returned no klines for {}", self.id(), alias);
                }
                Ok(rows) => {
                    info!("{} served {} klines for {}", self.id(), rows.len(), alias);
                    return Ok(RawPayload::new(
                        self.id(),
                        PayloadSchema::BinanceKlines,
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

#[cfg(test)]
mod tests {
    use super::*;

    // =========================================================================
    // Alias Tests
    // =========================================================================

    #[test]
    fn test_aliases_start_with_requested_pair() {
        let pair = SymbolPair::parse("BTCUSDT").unwrap();
        assert_eq!(
            BinanceClient::aliases(&pair),
            vec!["BTCUSDT", "BTCUSD", "BTCUSDC"]
        );
    }

    #[test]
    fn test_aliases_non_dollar_quote() {
        let pair = SymbolPair::parse("ETHBTC").unwrap();
        assert_eq!(BinanceClient::aliases(&pair)[0], "ETHBTC");
        assert_eq!(BinanceClient::aliases(&pair).len(), 4);
    }

    // =========================================================================
    // Mode Tests
    // =========================================================================

    #[test]
    fn test_ids_and_credential_requirement() {
        let auth = BinanceClient::authenticated(Client::new());
        let public = BinanceClient::public(Client::new());
        assert_eq!(auth.id(), "binance-auth");
        assert_eq!(public.id(), "binance-public");
        assert!(auth.requires_credentials());
        assert!(!public.requires_credentials());
    }

    #[test]
    fn test_base_url_trailing_slash() {
        let client = BinanceClient::public(Client::new()).with_base_url("http://localhost:8080/");
        assert_eq!(client.base_url, "http://localhost:8080");
    }
}
