//! In-memory TTL cache of the last good quote per symbol.
//!
//! Entries are purged lazily: an expired entry is removed by the read that
//! finds it. There is no background sweep.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use log::{debug, warn};
use tokio::time::Instant;

use crate::models::Quote;

/// Default time-to-live for cached quotes.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
struct CacheEntry {
    quote: Quote,
    expires_at: Instant,
}

/// Symbol -> quote cache with a fixed TTL.
pub struct QuoteCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl QuoteCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    fn lock_entries(&self) -> MutexGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.lock().unwrap_or_else(|poisoned| {
            warn!("Quote cache mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cached quote for an already normalized symbol, if still fresh.
    pub fn get(&self, symbol: &str) -> Option<Quote> {
        let mut entries = self.lock_entries();
        let now = Instant::now();
        let expired = match entries.get(symbol) {
            Some(entry) if now <= entry.expires_at => return Some(entry.quote.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            entries.remove(symbol);
            debug!("Quote cache entry for '{}' expired", symbol);
        }
        None
    }

    pub fn insert(&self, symbol: &str, quote: Quote) {
        let Some(expires_at) = Instant::now().checked_add(self.ttl) else {
            warn!("Cache TTL {:?} overflows the clock, not caching {}", self.ttl, symbol);
            return;
        };
        self.lock_entries()
            .insert(symbol.to_string(), CacheEntry { quote, expires_at });
    }

    /// Expiry instant of a stored entry, fresh or not.
    pub fn expiry_of(&self, symbol: &str) -> Option<Instant> {
        self.lock_entries().get(symbol).map(|e| e.expires_at)
    }

    pub fn len(&self) -> usize {
        self.lock_entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.lock_entries().clear();
    }
}

impl Default for QuoteCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL)
    }
}
