use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::{Mutex, RwLock, broadcast};
use tracing::{debug, error};

use super::Tier;
use super::entry::{CacheEntry, Loaded};
use crate::clock::Clock;
use crate::error::CacheError;

/// A load currently running for one key
struct InFlight<V> {
    generation: u64,
    tx: broadcast::Sender<Arc<CacheEntry<V>>>,
}

#[derive(Debug, Default)]
struct TierCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    coalesced: AtomicU64,
    loads: AtomicU64,
}

/// Point-in-time counters for one tier
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierStats {
    pub tier: Tier,
    pub entries: usize,
    pub hits: u64,
    pub misses: u64,
    /// Misses that joined a load already in flight
    pub coalesced: u64,
    pub loads: u64,
    pub hit_rate: f64,
    pub last_refresh_at: Option<DateTime<Utc>>,
}

/// One cache tier.
///
/// Lock order is `in_flight` then `entries`. Loads run on their own task, so a
/// caller that gives up waiting never cancels the load for everyone else.
pub struct CacheTier<V> {
    tier: Tier,
    ttl: TimeDelta,
    negative_ttl: TimeDelta,
    clock: Arc<dyn Clock>,
    entries: RwLock<HashMap<String, Arc<CacheEntry<V>>>>,
    in_flight: Mutex<HashMap<String, InFlight<V>>>,
    generation: AtomicU64,
    counters: TierCounters,
    last_refresh_at: RwLock<Option<DateTime<Utc>>>,
}

impl<V> CacheTier<V>
where
    V: Send + Sync + 'static,
{
    pub fn new(tier: Tier, ttl: TimeDelta, negative_ttl: TimeDelta, clock: Arc<dyn Clock>) -> Self {
        Self {
            tier,
            ttl,
            negative_ttl,
            clock,
            entries: RwLock::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
            generation: AtomicU64::new(0),
            counters: TierCounters::default(),
            last_refresh_at: RwLock::new(None),
        }
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }

    /// Return the fresh entry for `key`, or load it.
    ///
    /// At most one `loader` runs per key at a time; every concurrent caller
    /// receives the same entry.
    pub async fn get_or_load<F, Fut>(self: &Arc<Self>, key: &str, loader: F) -> Result<Arc<CacheEntry<V>>, CacheError>
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Loaded<V>> + Send + 'static,
    {
        if let Some(entry) = self.fresh_entry(key).await {
            self.counters.hits.fetch_add(1, Ordering::Relaxed);
            return Ok(entry);
        }

        let mut rx = {
            let mut in_flight = self.in_flight.lock().await;

            // A load may have finished while we waited for the lock
            if let Some(entry) = self.fresh_entry(key).await {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                return Ok(entry);
            }

            self.counters.misses.fetch_add(1, Ordering::Relaxed);
            match in_flight.get(key) {
                Some(flight) => {
                    self.counters.coalesced.fetch_add(1, Ordering::Relaxed);
                    debug!("{} cache: joining in-flight load for '{}'", self.tier, key);
                    flight.tx.subscribe()
                }
                None => {
                    let (tx, rx) = broadcast::channel(1);
                    let generation = self.generation.load(Ordering::SeqCst);
                    in_flight.insert(
                        key.to_string(),
                        InFlight {
                            generation,
                            tx: tx.clone(),
                        },
                    );
                    self.counters.loads.fetch_add(1, Ordering::Relaxed);
                    debug!("{} cache: loading '{}' (generation {})", self.tier, key, generation);
                    self.spawn_load(key.to_string(), generation, tx, loader);
                    rx
                }
            }
        };

        rx.recv().await.map_err(|_| CacheError::LoadAborted {
            tier: self.tier,
            key: key.to_string(),
        })
    }

    /// Current entry for `key` and whether it is still fresh. Stale entries
    /// are returned too; the counters are not touched.
    pub async fn get(&self, key: &str) -> Option<(Arc<CacheEntry<V>>, bool)> {
        let now = self.clock.now();
        self.entries
            .read()
            .await
            .get(key)
            .map(|entry| (Arc::clone(entry), entry.is_fresh(now)))
    }

    /// Drop one key, or every key when `key` is `None`.
    ///
    /// Loads already in flight still answer their waiters but are not stored.
    pub async fn invalidate(&self, key: Option<&str>) {
        let mut in_flight = self.in_flight.lock().await;
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let mut entries = self.entries.write().await;

        match key {
            Some(key) => {
                entries.remove(key);
                in_flight.remove(key);
            }
            None => {
                entries.clear();
                in_flight.clear();
            }
        }
        debug!("{} cache invalidated (generation {})", self.tier, generation);
    }

    /// Remove expired entries, returning how many were dropped
    pub async fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.is_fresh(now));
        before - entries.len()
    }

    pub async fn stats(&self) -> TierStats {
        let hits = self.counters.hits.load(Ordering::Relaxed);
        let misses = self.counters.misses.load(Ordering::Relaxed);
        TierStats {
            tier: self.tier,
            entries: self.entries.read().await.len(),
            hits,
            misses,
            coalesced: self.counters.coalesced.load(Ordering::Relaxed),
            loads: self.counters.loads.load(Ordering::Relaxed),
            hit_rate: hit_rate(hits, misses),
            last_refresh_at: *self.last_refresh_at.read().await,
        }
    }

    pub fn reset_stats(&self) {
        self.counters.hits.store(0, Ordering::Relaxed);
        self.counters.misses.store(0, Ordering::Relaxed);
        self.counters.coalesced.store(0, Ordering::Relaxed);
        self.counters.loads.store(0, Ordering::Relaxed);
    }

    async fn fresh_entry(&self, key: &str) -> Option<Arc<CacheEntry<V>>> {
        let now = self.clock.now();
        self.entries
            .read()
            .await
            .get(key)
            .filter(|entry| entry.is_fresh(now))
            .cloned()
    }

    fn spawn_load<F, Fut>(
        self: &Arc<Self>,
        key: String,
        generation: u64,
        tx: broadcast::Sender<Arc<CacheEntry<V>>>,
        loader: F,
    ) where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Loaded<V>> + Send + 'static,
    {
        let tier = Arc::clone(self);
        tokio::spawn(async move {
            match tokio::spawn(loader()).await {
                Ok(loaded) => tier.complete(key, generation, tx, loaded).await,
                Err(e) => {
                    error!("{} cache: load for '{}' did not finish: {}", tier.tier, key, e);
                    tier.abort(&key, generation).await;
                    // Dropping the last sender wakes waiters with an error
                    drop(tx);
                }
            }
        });
    }

    async fn complete(&self, key: String, generation: u64, tx: broadcast::Sender<Arc<CacheEntry<V>>>, loaded: Loaded<V>) {
        let now = self.clock.now();
        let ttl = if loaded.short_lived { self.negative_ttl } else { self.ttl };
        let entry = Arc::new(CacheEntry {
            value: loaded.value,
            fetched_at: now,
            expires_at: now + ttl,
            degraded: loaded.degraded,
        });

        {
            let mut in_flight = self.in_flight.lock().await;
            if self.generation.load(Ordering::SeqCst) == generation {
                self.entries.write().await.insert(key.clone(), Arc::clone(&entry));
                *self.last_refresh_at.write().await = Some(now);
            } else {
                debug!("{} cache: discarding load for '{}' from older generation", self.tier, key);
            }

            if in_flight.get(&key).is_some_and(|flight| flight.generation == generation) {
                in_flight.remove(&key);
            }
        }

        // No receivers left is fine: every waiter may have given up
        let _ = tx.send(entry);
    }

    async fn abort(&self, key: &str, generation: u64) {
        let mut in_flight = self.in_flight.lock().await;
        if in_flight.get(key).is_some_and(|flight| flight.generation == generation) {
            in_flight.remove(key);
        }
    }
}

fn hit_rate(hits: u64, misses: u64) -> f64 {
    let total = hits + misses;
    if total == 0 { 0.0 } else { hits as f64 / total as f64 }
}
