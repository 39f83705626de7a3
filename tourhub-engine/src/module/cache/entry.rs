use chrono::{DateTime, Utc};

/// A cached value with its freshness window
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<V> {
    pub value: V,
    pub fetched_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Value came from the fallback generator rather than the provider
    pub degraded: bool,
}

impl<V> CacheEntry<V> {
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// What a loader hands back to the cache
#[derive(Debug, Clone, PartialEq)]
pub struct Loaded<V> {
    pub value: V,
    pub degraded: bool,
    /// Store under the negative TTL instead of the tier TTL
    pub short_lived: bool,
}

impl<V> Loaded<V> {
    pub fn fresh(value: V) -> Self {
        Self {
            value,
            degraded: false,
            short_lived: false,
        }
    }

    /// Fallback data, kept only briefly so the provider is retried soon
    pub fn degraded(value: V) -> Self {
        Self {
            value,
            degraded: true,
            short_lived: true,
        }
    }

    /// Authoritative but negative answer, such as a missing package
    pub fn negative(value: V) -> Self {
        Self {
            value,
            degraded: false,
            short_lived: true,
        }
    }
}
