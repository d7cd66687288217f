//! Ordered multi-source candle fetch.
//!
//! Providers are tried one after another in priority order. The first
//! provider whose payload normalizes into a non-empty candle list wins and
//! is recorded as the source. Every failure is logged and remembered; only
//! when the whole chain fails does the caller see an error.

use crate::config::Config;
use crate::error::{FetchError, Result, SourceFailure};
use crate::services::cache::{CandleCache, TtlCache};
use crate::services::normalizer::normalize;
use crate::sources::{build_chain, CandleProvider};
use crate::types::{Candle, CandleRequest, CandleSequence, Credentials, SourceId, Timeframe};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Candle fetcher with source fallback.
#[derive(Clone)]
pub struct FallbackFetcher {
    providers: Vec<Arc<dyn CandleProvider>>,
    cache: Option<Arc<dyn CandleCache>>,
}

impl FallbackFetcher {
    /// Fetcher over `providers`, tried in the given order.
    pub fn new(providers: Vec<Arc<dyn CandleProvider>>) -> Self {
        Self {
            providers,
            cache: None,
        }
    }

    /// Consult `cache` before the provider chain and fill it on success.
    pub fn with_cache(mut self, cache: Arc<dyn CandleCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Fetcher over the configured provider chain.
    pub fn from_config(config: &Config) -> Self {
        let fetcher = Self::new(build_chain(config));
        if config.cache_ttl_secs > 0 {
            fetcher.with_cache(Arc::new(TtlCache::new(Duration::from_secs(config.cache_ttl_secs))))
        } else {
            fetcher
        }
    }

    pub fn provider_ids(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.id()).collect()
    }

    /// Validate the request and fetch it through the chain.
    pub async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
        credentials: Option<Credentials>,
    ) -> Result<(CandleSequence, SourceId)> {
        let request = CandleRequest::new(symbol, timeframe, limit, credentials)?;
        self.fetch_with_fallback(&request).await
    }

    /// Try each provider in order until one yields candles.
    ///
    /// Providers that need credentials are skipped when the request has
    /// none. The returned sequence holds at most `limit` of the most recent
    /// candles.
    pub async fn fetch_with_fallback(&self, request: &CandleRequest) -> Result<(CandleSequence, SourceId)> {
        if let Some(cache) = &self.cache {
            if let Some(sequence) = cache.get(request) {
                debug!("Cache hit for {} {} ({})", request.symbol, request.timeframe, sequence.source);
                let source = sequence.source.clone();
                return Ok((sequence, source));
            }
        }

        let mut failures: Vec<SourceFailure> = Vec::new();

        for provider in &self.providers {
            let id = provider.id();
            if provider.requires_credentials() && !request.has_credentials() {
                debug!("Skipping {}: no credentials supplied", id);
                continue;
            }

            debug!("Trying {} for {} {} limit={}", id, request.symbol, request.timeframe, request.limit);

            match Self::attempt(provider.as_ref(), request).await {
                Ok(candles) => {
                    info!(
                        "Fetched {} {} candles for {} from {}",
                        candles.len(),
                        request.timeframe,
                        request.symbol,
                        id
                    );
                    let sequence = CandleSequence {
                        symbol: request.symbol.clone(),
                        timeframe: request.timeframe,
                        limit: request.limit,
                        source: id.to_string(),
                        candles,
                    };
                    if let Some(cache) = &self.cache {
                        cache.put(request, &sequence);
                    }
                    return Ok((sequence, id.to_string()));
                }
                Err(e) => {
                    if e.is_geo_restricted() {
                        warn!(
                            "{} refuses service from this location, falling back: {}",
                            id, e
                        );
                    } else {
                        warn!("{} failed for {}: {}", id, request.symbol, e);
                    }
                    failures.push(e.to_failure(id));
                }
            }
        }

        let err = FetchError::AllSourcesExhausted(failures);
        error!("Could not fetch {} {}: {}", request.symbol, request.timeframe, err);
        Err(err)
    }

    async fn attempt(provider: &dyn CandleProvider, request: &CandleRequest) -> Result<Vec<Candle>> {
        let payload = provider.fetch(request).await?;
        let mut candles = normalize(&payload)?;
        if candles.is_empty() {
            return Err(FetchError::not_found(provider.id(), request.symbol.clone()));
        }
        if candles.len() > request.limit {
            candles.drain(..candles.len() - request.limit);
        }
        Ok(candles)
    }
}
