//! Authenticated provider calls with timeout, retry and backoff

use std::collections::HashSet;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tourhub_common::Package;
use tracing::{debug, error, info, warn};

use super::session::SessionManager;
use super::transport::{ProviderTransport, SearchParams};
use super::types::RawPackage;
use crate::clock::Clock;
use crate::config::RetryConfig;
use crate::error::{AuthError, RemoteError, TransportError};

/// Attempt budget and exponential backoff schedule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts.max(1),
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }

    /// Delay after the `attempt`-th failure (1-based): `base * 2^(attempt-1)`, capped
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.base_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }
}

/// Server-side filters for a full listing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FetchFilters {
    pub destination: Option<String>,
    pub country: Option<String>,
    pub category: Option<String>,
    pub price_min: Option<f64>,
    pub price_max: Option<f64>,
}

/// Wall time spent in logical provider calls
#[derive(Debug, Default)]
pub struct LatencyTracker {
    total_micros: AtomicU64,
    samples: AtomicU64,
}

impl LatencyTracker {
    pub fn record(&self, elapsed: Duration) {
        let micros = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        self.total_micros.fetch_add(micros, Ordering::Relaxed);
        self.samples.fetch_add(1, Ordering::Relaxed);
    }

    pub fn average_ms(&self) -> Option<f64> {
        let samples = self.samples.load(Ordering::Relaxed);
        if samples == 0 {
            return None;
        }
        let total = self.total_micros.load(Ordering::Relaxed) as f64;
        Some(total / samples as f64 / 1000.0)
    }

    pub fn samples(&self) -> u64 {
        self.samples.load(Ordering::Relaxed)
    }

    pub fn reset(&self) {
        self.total_micros.store(0, Ordering::Relaxed);
        self.samples.store(0, Ordering::Relaxed);
    }
}

/// Fetches inventory from the provider.
///
/// Every call acquires a token, runs under a hard timeout and retries
/// transient failures (timeouts, connection errors, 5xx). Other 4xx responses
/// fail immediately, except a 401 which forces one token refresh and one
/// retry.
pub struct RemoteFetcher {
    transport: Arc<dyn ProviderTransport>,
    session: Arc<SessionManager>,
    clock: Arc<dyn Clock>,
    policy: RetryPolicy,
    request_timeout: Duration,
    page_size: usize,
    max_pages: usize,
    latency: LatencyTracker,
}

impl RemoteFetcher {
    pub fn new(
        transport: Arc<dyn ProviderTransport>,
        session: Arc<SessionManager>,
        clock: Arc<dyn Clock>,
        policy: RetryPolicy,
        request_timeout: Duration,
    ) -> Self {
        Self {
            transport,
            session,
            clock,
            policy,
            request_timeout,
            page_size: 100,
            max_pages: 5,
            latency: LatencyTracker::default(),
        }
    }

    pub fn with_paging(mut self, page_size: usize, max_pages: usize) -> Self {
        self.page_size = page_size.max(1);
        self.max_pages = max_pages.max(1);
        self
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    pub fn latency(&self) -> &LatencyTracker {
        &self.latency
    }

    /// Packages the provider flags as featured
    pub async fn fetch_featured(&self, limit: usize) -> Result<Vec<Package>, RemoteError> {
        let started = Instant::now();
        let params = SearchParams {
            featured: true,
            page: 1,
            page_size: limit.max(1),
            ..Default::default()
        };
        let result = self.search_page(&params).await;
        self.latency.record(started.elapsed());

        let records = result?;
        let packages = self.normalize(records);
        info!("Fetched {} featured packages from provider", packages.len());
        Ok(packages)
    }

    /// Full listing, walking pages until a short page or the page cap
    pub async fn fetch_all(&self, filters: &FetchFilters) -> Result<Vec<Package>, RemoteError> {
        let started = Instant::now();
        let result = self.collect_pages(filters).await;
        self.latency.record(started.elapsed());

        let packages = result?;
        info!("Fetched {} packages from provider", packages.len());
        Ok(packages)
    }

    /// A single package; a provider 404 becomes [`RemoteError::NotFound`]
    pub async fn fetch_detail(&self, id: &str) -> Result<Package, RemoteError> {
        let started = Instant::now();
        let transport = Arc::clone(&self.transport);
        let requested = id.to_string();
        let result = self
            .execute("detail", move |token| {
                let transport = Arc::clone(&transport);
                let requested = requested.clone();
                async move { transport.package(&token, &requested).await }
            })
            .await;
        self.latency.record(started.elapsed());

        match result {
            Ok(record) => Ok(record.into_package_with_id(id, self.clock.now())),
            Err(RemoteError::Rejected(404)) => Err(RemoteError::NotFound(id.to_string())),
            Err(e) => Err(e),
        }
    }

    async fn collect_pages(&self, filters: &FetchFilters) -> Result<Vec<Package>, RemoteError> {
        let mut packages = Vec::new();
        let mut seen = HashSet::new();

        for page in 1..=self.max_pages {
            let params = SearchParams {
                featured: false,
                destination: filters.destination.clone(),
                country: filters.country.clone(),
                category: filters.category.clone(),
                price_min: filters.price_min,
                price_max: filters.price_max,
                page,
                page_size: self.page_size,
            };

            let records = match self.search_page(&params).await {
                Ok(records) => records,
                Err(e) if page > 1 => {
                    warn!(
                        "Page {} of provider listing failed ({}), keeping {} packages from earlier pages",
                        page,
                        e,
                        packages.len()
                    );
                    break;
                }
                Err(e) => return Err(e),
            };

            let short_page = records.len() < self.page_size;
            for package in self.normalize(records) {
                if seen.insert(package.id.clone()) {
                    packages.push(package);
                } else {
                    debug!("Skipping duplicate package id {} on page {}", package.id, page);
                }
            }

            if short_page {
                break;
            }
        }

        Ok(packages)
    }

    async fn search_page(&self, params: &SearchParams) -> Result<Vec<RawPackage>, RemoteError> {
        let transport = Arc::clone(&self.transport);
        let params = params.clone();
        self.execute("search", move |token| {
            let transport = Arc::clone(&transport);
            let params = params.clone();
            async move { transport.search(&token, &params).await }
        })
        .await
    }

    fn normalize(&self, records: Vec<RawPackage>) -> Vec<Package> {
        let now = self.clock.now();
        let total = records.len();
        let packages: Vec<Package> = records
            .into_iter()
            .filter_map(|record| record.into_package(now))
            .collect();
        if packages.len() < total {
            warn!("Dropped {} provider records without an id", total - packages.len());
        }
        packages
    }

    /// Retry loop shared by every provider call
    async fn execute<T, F, Fut>(&self, operation: &str, call: F) -> Result<T, RemoteError>
    where
        F: Fn(String) -> Fut,
        Fut: Future<Output = Result<T, TransportError>>,
    {
        let mut attempt: u32 = 0;
        let mut reauthenticated = false;

        loop {
            attempt += 1;
            let token = self.session.acquire_token().await?;

            let outcome = match tokio::time::timeout(self.request_timeout, call(token.clone())).await {
                Ok(result) => result,
                Err(_) => Err(TransportError::Timeout),
            };

            let failure = match outcome {
                Ok(value) => {
                    if attempt > 1 {
                        debug!("Provider {} succeeded on attempt {}", operation, attempt);
                    }
                    return Ok(value);
                }
                Err(failure) => failure,
            };

            match failure {
                TransportError::Status(401) if !reauthenticated => {
                    warn!("Provider refused token for {}, re-authenticating", operation);
                    reauthenticated = true;
                    self.session.force_refresh(&token).await?;
                }
                TransportError::Status(401) => {
                    error!("Provider refused a freshly issued token for {}", operation);
                    return Err(RemoteError::Auth(AuthError::Rejected(401)));
                }
                TransportError::Decode(message) => {
                    error!("Provider {} returned malformed data: {}", operation, message);
                    return Err(RemoteError::Malformed(message));
                }
                failure if failure.is_transient() => {
                    if attempt >= self.policy.max_attempts {
                        error!(
                            "Provider {} failed after {} attempts: {}",
                            operation, attempt, failure
                        );
                        return Err(RemoteError::Unavailable {
                            attempts: attempt,
                            last: failure,
                        });
                    }

                    let delay = self.policy.delay_for(attempt);
                    warn!(
                        "Provider {} attempt {}/{} failed: {}. Retrying in {:?}",
                        operation, attempt, self.policy.max_attempts, failure, delay
                    );
                    tokio::time::sleep(delay).await;
                }
                TransportError::Status(code) => {
                    debug!("Provider {} rejected with HTTP {}", operation, code);
                    return Err(RemoteError::Rejected(code));
                }
                failure => {
                    return Err(RemoteError::Unavailable {
                        attempts: attempt,
                        last: failure,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeTransport, ManualClock, raw_package};
    use chrono::TimeDelta;

    fn fetcher(transport: Arc<FakeTransport>) -> RemoteFetcher {
        let clock = Arc::new(ManualClock::default());
        let session = Arc::new(SessionManager::new(
            transport.clone(),
            super::super::transport::Credentials::new("agency", "secret"),
            clock.clone(),
            TimeDelta::seconds(60),
            TimeDelta::seconds(3600),
            Duration::from_secs(5),
        ));
        let policy = RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(4),
        };
        RemoteFetcher::new(transport, session, clock, policy, Duration::from_millis(200))
            .with_paging(2, 3)
    }

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(350),
        };
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(350));
        assert_eq!(policy.delay_for(40), Duration::from_millis(350));
    }

    #[tokio::test]
    async fn test_transient_failures_are_retried() {
        let transport = Arc::new(FakeTransport::new());
        transport.set_packages(vec![raw_package("a", "Roma")]);
        transport.fail_next_searches(vec![TransportError::Status(503), TransportError::Timeout]);

        let packages = fetcher(transport.clone()).fetch_featured(10).await.unwrap();
        assert_eq!(packages.len(), 1);
        assert_eq!(transport.search_calls(), 3);
    }

    #[tokio::test]
    async fn test_exhausted_retries_report_unavailable() {
        let transport = Arc::new(FakeTransport::new());
        transport.fail_all_searches(TransportError::Status(502));

        let err = fetcher(transport.clone()).fetch_all(&FetchFilters::default()).await.unwrap_err();
        assert_eq!(
            err,
            RemoteError::Unavailable {
                attempts: 3,
                last: TransportError::Status(502)
            }
        );
        assert_eq!(transport.search_calls(), 3);
    }

    #[tokio::test]
    async fn test_client_errors_fail_fast() {
        let transport = Arc::new(FakeTransport::new());
        transport.fail_next_searches(vec![TransportError::Status(400)]);

        let err = fetcher(transport.clone()).fetch_featured(5).await.unwrap_err();
        assert_eq!(err, RemoteError::Rejected(400));
        assert_eq!(transport.search_calls(), 1);
    }

    #[tokio::test]
    async fn test_unauthorized_forces_one_refresh_then_retries() {
        let transport = Arc::new(FakeTransport::new());
        transport.set_packages(vec![raw_package("a", "Roma")]);
        transport.fail_next_searches(vec![TransportError::Status(401)]);

        let packages = fetcher(transport.clone()).fetch_featured(5).await.unwrap();
        assert_eq!(packages.len(), 1);
        assert_eq!(transport.auth_calls(), 2);
        assert_eq!(transport.search_calls(), 2);
    }

    #[tokio::test]
    async fn test_repeated_unauthorized_is_an_auth_error() {
        let transport = Arc::new(FakeTransport::new());
        transport.fail_next_searches(vec![TransportError::Status(401), TransportError::Status(401)]);

        let err = fetcher(transport.clone()).fetch_featured(5).await.unwrap_err();
        assert_eq!(err, RemoteError::Auth(AuthError::Rejected(401)));
        assert_eq!(transport.search_calls(), 2);
    }

    #[tokio::test]
    async fn test_slow_provider_hits_hard_timeout() {
        let transport = Arc::new(FakeTransport::new().with_latency(Duration::from_millis(500)));
        transport.set_packages(vec![raw_package("a", "Roma")]);

        let err = fetcher(transport.clone()).fetch_featured(5).await.unwrap_err();
        assert!(matches!(
            err,
            RemoteError::Unavailable { last: TransportError::Timeout, .. }
        ));
    }

    #[tokio::test]
    async fn test_fetch_all_walks_pages_and_dedupes() {
        let transport = Arc::new(FakeTransport::new());
        transport.set_packages(vec![
            raw_package("a", "Roma"),
            raw_package("b", "Lisboa"),
            raw_package("b", "Lisboa"),
            raw_package("c", "Oporto"),
            raw_package("d", "Sevilla"),
        ]);

        let packages = fetcher(transport.clone()).fetch_all(&FetchFilters::default()).await.unwrap();
        let ids: Vec<&str> = packages.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c", "d"]);
        assert_eq!(transport.search_calls(), 3);
    }

    #[tokio::test]
    async fn test_detail_not_found() {
        let transport = Arc::new(FakeTransport::new());
        transport.set_packages(vec![raw_package("a", "Roma")]);
        let fetcher = fetcher(transport.clone());

        assert_eq!(fetcher.fetch_detail("a").await.unwrap().title, "Roma");
        assert_eq!(
            fetcher.fetch_detail("zzz").await.unwrap_err(),
            RemoteError::NotFound("zzz".into())
        );
        assert_eq!(transport.detail_calls(), 2);
        assert_eq!(fetcher.latency().samples(), 2);
    }

    #[tokio::test]
    async fn test_auth_failure_stops_before_any_request() {
        let transport = Arc::new(FakeTransport::new());
        transport.reject_auth(403);

        let err = fetcher(transport.clone()).fetch_featured(5).await.unwrap_err();
        assert_eq!(err, RemoteError::Auth(AuthError::Rejected(403)));
        assert_eq!(transport.search_calls(), 0);
    }
}
