//! Catalog manager - ties fetcher, cache, ranking and fallback together

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;
use tokio::sync::RwLock;
use tourhub_common::{
    ListOptions, Package, PackageDetails, PackageList, ResultSource, SearchQuery, SearchResults,
};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::fallback::{FallbackGenerator, FallbackKind};
use super::search::{filter_and_rank, paginate, select_featured};
use super::stats::{EngineStats, RefreshReport, overall_hit_rate};
use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::error::{CacheError, EngineError, RemoteError};
use crate::module::cache::{CacheEntry, CacheStore, Loaded};
use crate::module::provider::{
    Credentials, FetchFilters, ProviderTransport, RemoteFetcher, RetryPolicy, SessionManager,
};
use crate::module::ranking::{KeywordRegistry, KeywordSource, rank, score};

/// Cache key for the unfiltered listings
const DEFAULT_KEY: &str = "default";

type ListEntry = Arc<CacheEntry<Vec<Package>>>;

/// Owns the inventory pipeline. Every accessor answers from the cache,
/// loading through the provider on a miss and degrading to fallback data
/// when the provider cannot be reached.
pub struct CatalogManager {
    fetcher: Arc<RemoteFetcher>,
    cache: CacheStore,
    keywords: KeywordRegistry,
    fallback: Arc<FallbackGenerator>,
    clock: Arc<dyn Clock>,
    featured_pool_size: usize,
    refresh_runs: AtomicU64,
    last_refresh: RwLock<Option<RefreshReport>>,
}

impl CatalogManager {
    pub fn new(
        config: &EngineConfig,
        transport: Arc<dyn ProviderTransport>,
        keyword_source: Arc<dyn KeywordSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let session = Arc::new(SessionManager::new(
            Arc::clone(&transport),
            Credentials::new(&config.provider.username, &config.provider.password),
            Arc::clone(&clock),
            config.session.refresh_lead(),
            chrono::TimeDelta::seconds(config.session.default_token_lifetime_seconds),
            config.provider.request_timeout(),
        ));
        let fetcher = RemoteFetcher::new(
            transport,
            session,
            Arc::clone(&clock),
            RetryPolicy::from_config(&config.retry),
            config.provider.request_timeout(),
        )
        .with_paging(config.provider.page_size, config.provider.max_pages);

        Self {
            fetcher: Arc::new(fetcher),
            cache: CacheStore::new(&config.cache, Arc::clone(&clock)),
            keywords: KeywordRegistry::new(keyword_source),
            fallback: Arc::new(FallbackGenerator::new(&config.fallback, Arc::clone(&clock))),
            clock,
            featured_pool_size: config.cache.featured_pool_size.max(1),
            refresh_runs: AtomicU64::new(0),
            last_refresh: RwLock::new(None),
        }
    }

    /// Full listing in display order
    pub async fn get_all(&self, options: ListOptions) -> PackageList {
        let entry = self.all_entry().await;
        let table = self.keywords.current().await;

        let mut packages = entry.value.clone();
        rank(&mut packages, &table);
        PackageList {
            packages: paginate(packages, options.limit, options.offset),
            source: ResultSource::from_degraded(entry.degraded),
        }
    }

    /// Featured packages, at most `limit`
    pub async fn get_featured(&self, limit: usize) -> PackageList {
        let entry = self.featured_entry().await;
        let table = self.keywords.current().await;

        PackageList {
            packages: select_featured(&entry.value, &table, limit),
            source: ResultSource::from_degraded(entry.degraded),
        }
    }

    pub async fn search(&self, query: &SearchQuery) -> SearchResults {
        let entry = self.all_entry().await;
        let table = self.keywords.current().await;

        let (items, total) = filter_and_rank(&entry.value, query, &table);
        debug!("Search matched {} of {} packages", total, entry.value.len());
        SearchResults {
            items,
            total,
            source: ResultSource::from_degraded(entry.degraded),
        }
    }

    /// One package by id. A provider 404 is reported as [`EngineError::NotFound`].
    pub async fn get_detail(&self, id: &str) -> Result<PackageDetails, EngineError> {
        let id = id.trim();
        if id.is_empty() {
            return Err(EngineError::NotFound(id.to_string()));
        }

        let fetcher = Arc::clone(&self.fetcher);
        let fallback = Arc::clone(&self.fallback);
        let listing = Arc::clone(&self.cache.all);
        let key = id.to_string();
        let loaded = self
            .cache
            .details
            .get_or_load(id, move || async move {
                match fetcher.fetch_detail(&key).await {
                    Ok(package) => Loaded::fresh(Some(package)),
                    Err(RemoteError::NotFound(_)) => Loaded::negative(None),
                    Err(e) => {
                        warn!("Detail for {} unavailable from provider ({}), degrading", key, e);
                        let cached = listing
                            .get(DEFAULT_KEY)
                            .await
                            .and_then(|(entry, _)| entry.value.iter().find(|p| p.id == key).cloned());
                        Loaded::degraded(cached.or_else(|| fallback.find(&key)))
                    }
                }
            })
            .await;

        let package = match loaded {
            Ok(entry) => entry.value.clone(),
            Err(e) => {
                error!("{}", e);
                self.fallback.find(id)
            }
        };

        let mut package = package.ok_or_else(|| EngineError::NotFound(id.to_string()))?;
        let table = self.keywords.current().await;
        package.priority_score = score(&package, &table);
        let source = ResultSource::from_degraded(package.is_fallback());
        Ok(PackageDetails { package, source })
    }

    /// Drop every tier and the provider token, then reload both listings
    pub async fn refresh_all(&self) -> RefreshReport {
        let run_id = Uuid::now_v7();
        let started_at = self.clock.now();
        let start_time = Instant::now();
        info!("Starting full catalog refresh (run {})", run_id);

        self.cache.invalidate_all().await;
        self.fetcher.session().invalidate().await;

        let (all, featured) = tokio::join!(self.all_entry(), self.featured_entry());

        let report = RefreshReport {
            run_id,
            started_at,
            packages_refreshed: all.value.len(),
            featured_count: featured.value.len(),
            source: ResultSource::from_degraded(all.degraded || featured.degraded),
            duration_seconds: start_time.elapsed().as_secs_f64(),
        };

        if report.success() {
            info!(
                "Catalog refresh {} completed: {} packages, {} featured in {:.2}s",
                run_id, report.packages_refreshed, report.featured_count, report.duration_seconds
            );
        } else {
            warn!(
                "Catalog refresh {} served fallback data: {} packages, {} featured",
                run_id, report.packages_refreshed, report.featured_count
            );
        }

        self.refresh_runs.fetch_add(1, Ordering::Relaxed);
        *self.last_refresh.write().await = Some(report.clone());
        report
    }

    /// Best-effort pre-population of the listing tiers. Returns true when the
    /// provider answered for both.
    pub async fn warm_up(&self) -> bool {
        info!("Warming up catalog cache...");
        let (all, featured) = tokio::join!(self.all_entry(), self.featured_entry());

        let warmed = !all.degraded && !featured.degraded;
        if warmed {
            info!(
                "Cache warm: {} packages, {} featured candidates",
                all.value.len(),
                featured.value.len()
            );
        } else {
            warn!("Cache warm-up fell back to synthetic data; the provider will be retried");
        }
        warmed
    }

    pub async fn stats(&self) -> EngineStats {
        let tiers = self.cache.stats().await;
        let table = self.keywords.cached().await;
        let session = self.fetcher.session();

        EngineStats {
            generated_at: self.clock.now(),
            cache_hit_rate: overall_hit_rate(&tiers),
            tiers,
            avg_response_time_estimate_ms: self.fetcher.latency().average_ms(),
            remote_calls: self.fetcher.latency().samples(),
            keyword_distribution: table.distribution(),
            auth_state: session.auth_state().await,
            token_refreshes: session.refresh_count(),
            refresh_runs: self.refresh_runs.load(Ordering::Relaxed),
            last_refresh: self.last_refresh.read().await.clone(),
        }
    }

    pub fn reset_stats(&self) {
        self.cache.reset_stats();
        self.fetcher.latency().reset();
        info!("Engine statistics reset");
    }

    /// Drop expired cache entries
    pub async fn purge_expired(&self) -> usize {
        self.cache.purge_expired().await
    }

    async fn all_entry(&self) -> ListEntry {
        let fetcher = Arc::clone(&self.fetcher);
        let fallback = Arc::clone(&self.fallback);
        let result = self
            .cache
            .all
            .get_or_load(DEFAULT_KEY, move || async move {
                match fetcher.fetch_all(&FetchFilters::default()).await {
                    Ok(packages) => Loaded::fresh(packages),
                    Err(e) => {
                        warn!("Provider listing unavailable ({}), serving fallback packages", e);
                        Loaded::degraded(fallback.generate(FallbackKind::All))
                    }
                }
            })
            .await;
        self.or_fallback(result, FallbackKind::All)
    }

    async fn featured_entry(&self) -> ListEntry {
        let fetcher = Arc::clone(&self.fetcher);
        let fallback = Arc::clone(&self.fallback);
        let pool_size = self.featured_pool_size;
        let result = self
            .cache
            .featured
            .get_or_load(DEFAULT_KEY, move || async move {
                match fetcher.fetch_featured(pool_size).await {
                    Ok(packages) => Loaded::fresh(packages),
                    Err(e) => {
                        warn!("Provider featured list unavailable ({}), serving fallback packages", e);
                        Loaded::degraded(fallback.generate(FallbackKind::Featured))
                    }
                }
            })
            .await;
        self.or_fallback(result, FallbackKind::Featured)
    }

    /// A load that never finished is answered with uncached fallback data
    fn or_fallback(&self, result: Result<ListEntry, CacheError>, kind: FallbackKind) -> ListEntry {
        result.unwrap_or_else(|e| {
            error!("{}", e);
            let now = self.clock.now();
            Arc::new(CacheEntry {
                value: self.fallback.generate(kind),
                fetched_at: now,
                expires_at: now,
                degraded: true,
            })
        })
    }
}
