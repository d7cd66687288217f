use crate::error::{FetchError, Result};
use crate::types::Timeframe;
use std::fmt;

/// Largest candle window a single request may ask for.
pub const MAX_LIMIT: usize = 2000;

/// Quote currencies recognised when splitting a unified symbol, longest first.
const KNOWN_QUOTES: &[&str] = &[
    "FDUSD", "USDT", "USDC", "BUSD", "TUSD", "USD", "EUR", "GBP", "TRY", "BTC", "ETH", "BNB",
];

/// Exchange API credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub api_key: String,
    pub api_secret: String,
}

impl Credentials {
    pub fn new(api_key: impl Into<String>, api_secret: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_secret: api_secret.into(),
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shown: String = self.api_key.chars().take(4).collect();
        f.debug_struct("Credentials")
            .field("api_key", &format!("{}…", shown))
            .field("api_secret", &"<redacted>")
            .finish()
    }
}

/// Base/quote split of a unified symbol such as `BTCUSDT`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SymbolPair {
    pub base: String,
    pub quote: String,
}

impl SymbolPair {
    /// Split a unified symbol. Accepts `BTCUSDT`, `btc-usdt`, `BTC/USDT`.
    pub fn parse(symbol: &str) -> Option<Self> {
        let upper = symbol.trim().to_uppercase();

        for sep in ['/', '-', '_'] {
            if let Some((base, quote)) = upper.split_once(sep) {
                if !base.is_empty() && !quote.is_empty() {
                    return Some(Self {
                        base: base.to_string(),
                        quote: quote.to_string(),
                    });
                }
            }
        }

        KNOWN_QUOTES.iter().find_map(|quote| {
            let base = upper.strip_suffix(quote)?;
            if base.is_empty() {
                None
            } else {
                Some(Self {
                    base: base.to_string(),
                    quote: quote.to_string(),
                })
            }
        })
    }

    /// Unified concatenated form, e.g. `BTCUSDT`.
    pub fn unified(&self) -> String {
        format!("{}{}", self.base, self.quote)
    }

    /// Quote currencies to try, in priority order: the requested quote first,
    /// then dollar-like substitutes.
    pub fn quote_candidates(&self) -> Vec<String> {
        let mut quotes = vec![self.quote.clone()];
        for alt in ["USDT", "USD", "USDC"] {
            if !quotes.iter().any(|q| q == alt) {
                quotes.push(alt.to_string());
            }
        }
        quotes
    }
}

impl fmt::Display for SymbolPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.base, self.quote)
    }
}

/// A validated candle fetch request.
#[derive(Debug, Clone)]
pub struct CandleRequest {
    pub symbol: String,
    pub pair: SymbolPair,
    pub timeframe: Timeframe,
    pub limit: usize,
    pub credentials: Option<Credentials>,
}

impl CandleRequest {
    pub fn new(
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
        credentials: Option<Credentials>,
    ) -> Result<Self> {
        let symbol = symbol.trim().to_uppercase();
        if symbol.is_empty() {
            return Err(FetchError::InvalidRequest("symbol is empty".to_string()));
        }
        if !(1..=MAX_LIMIT).contains(&limit) {
            return Err(FetchError::InvalidRequest(format!(
                "limit {} outside 1..={}",
                limit, MAX_LIMIT
            )));
        }
        let pair = SymbolPair::parse(&symbol).ok_or_else(|| {
            FetchError::InvalidRequest(format!("cannot split {} into base and quote", symbol))
        })?;

        Ok(Self {
            symbol: pair.unified(),
            pair,
            timeframe,
            limit,
            credentials,
        })
    }

    pub fn has_credentials(&self) -> bool {
        self.credentials.is_some()
    }
}
