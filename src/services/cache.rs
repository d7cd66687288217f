use crate::types::{CandleRequest, CandleSequence, Timeframe};
use dashmap::DashMap;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// Candle cache consulted before the provider chain.
///
/// Implementations must tolerate concurrent readers and writers. Writing
/// the same key twice stores an equivalent value.
pub trait CandleCache: Send + Sync {
    fn get(&self, request: &CandleRequest) -> Option<CandleSequence>;
    fn put(&self, request: &CandleRequest, sequence: &CandleSequence);
}

/// Cache key. Credentials are not part of it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub symbol: String,
    pub timeframe: Timeframe,
    pub limit: usize,
    /// Wall-clock seconds divided by the TTL.
    pub bucket: u64,
}

impl CacheKey {
    pub fn new(request: &CandleRequest, ttl: Duration, now_secs: u64) -> Self {
        Self {
            symbol: request.symbol.clone(),
            timeframe: request.timeframe,
            limit: request.limit,
            bucket: now_secs / ttl.as_secs().max(1),
        }
    }
}

struct CacheEntry {
    value: CandleSequence,
    expires_at: Instant,
}

/// In-memory TTL cache for candle sequences.
pub struct TtlCache {
    data: DashMap<CacheKey, CacheEntry>,
    ttl: Duration,
}

impl TtlCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            data: DashMap::new(),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn key(&self, request: &CandleRequest) -> CacheKey {
        let now_secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        CacheKey::new(request, self.ttl, now_secs)
    }

    /// Remove all expired entries from the cache.
    pub fn cleanup(&self) {
        let now = Instant::now();
        self.data.retain(|_, entry| entry.expires_at > now);
    }

    /// Number of entries, including expired ones.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl CandleCache for TtlCache {
    fn get(&self, request: &CandleRequest) -> Option<CandleSequence> {
        let key = self.key(request);
        let entry = self.data.get(&key)?;
        if entry.expires_at > Instant::now() {
            Some(entry.value.clone())
        } else {
            drop(entry);
            self.data.remove(&key);
            None
        }
    }

    /// Stores the sequence under the current bucket. Entries from earlier
    /// buckets are unreachable, so they are evicted along with expired ones.
    fn put(&self, request: &CandleRequest, sequence: &CandleSequence) {
        let key = self.key(request);
        let now = Instant::now();
        self.data
            .retain(|k, entry| k.bucket == key.bucket && entry.expires_at > now);
        self.data.insert(
            key,
            CacheEntry {
                value: sequence.clone(),
                expires_at: Instant::now() + self.ttl,
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Candle, Credentials};

    fn request(symbol: &str, limit: usize) -> CandleRequest {
        CandleRequest::new(symbol, Timeframe::OneHour, limit, None).unwrap()
    }

    fn sequence(symbol: &str) -> CandleSequence {
        CandleSequence {
            symbol: symbol.to_string(),
            timeframe: Timeframe::OneHour,
            limit: 10,
            source: "binance-public".to_string(),
            candles: vec![Candle::new(0, 1.0, 1.0, 1.0, 1.0, None)],
        }
    }

    #[test]
    fn test_cache_basic() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.put(&request("BTCUSDT", 10), &sequence("BTCUSDT"));
        assert_eq!(cache.get(&request("BTCUSDT", 10)), Some(sequence("BTCUSDT")));
        assert_eq!(cache.get(&request("BTCUSDT", 20)), None);
        assert_eq!(cache.get(&request("ETHUSDT", 10)), None);
    }

    #[test]
    fn test_cache_expiration() {
        let cache = TtlCache::new(Duration::from_millis(10));
        cache.put(&request("BTCUSDT", 10), &sequence("BTCUSDT"));
        std::thread::sleep(Duration::from_millis(20));
        assert_eq!(cache.get(&request("BTCUSDT", 10)), None);
    }

    #[test]
    fn test_credentials_not_part_of_key() {
        let cache = TtlCache::new(Duration::from_secs(60));
        cache.put(&request("BTCUSDT", 10), &sequence("BTCUSDT"));
        let with_creds = CandleRequest::new(
            "BTCUSDT",
            Timeframe::OneHour,
            10,
            Some(Credentials::new("key", "secret")),
        )
        .unwrap();
        assert!(cache.get(&with_creds).is_some());
    }

    #[test]
    fn test_bucket_rolls_over() {
        let req = request("BTCUSDT", 10);
        let ttl = Duration::from_secs(60);
        assert_eq!(CacheKey::new(&req, ttl, 119).bucket, 1);
        assert_ne!(CacheKey::new(&req, ttl, 119), CacheKey::new(&req, ttl, 120));
    }

    #[test]
    fn test_cleanup() {
        let cache = TtlCache::new(Duration::from_millis(10));
        cache.put(&request("BTCUSDT", 10), &sequence("BTCUSDT"));
        cache.put(&request("ETHUSDT", 10), &sequence("ETHUSDT"));
        assert!(!cache.is_empty());
        std::thread::sleep(Duration::from_millis(20));
        cache.cleanup();
        assert!(cache.is_empty());
    }

    #[test]
    fn test_put_evicts_stale_entries() {
        let cache = TtlCache::new(Duration::from_secs(1));
        cache.put(&request("BTCUSDT", 10), &sequence("BTCUSDT"));
        std::thread::sleep(Duration::from_millis(1100));
        cache.put(&request("ETHUSDT", 10), &sequence("ETHUSDT"));
        assert_eq!(cache.len(), 1);
        assert!(cache.get(&request("ETHUSDT", 10)).is_some());

        std::thread::sleep(Duration::from_millis(1100));
        cache.put(&request("ETHUSDT", 10), &sequence("ETHUSDT"));
        assert_eq!(cache.len(), 1);
    }
}
