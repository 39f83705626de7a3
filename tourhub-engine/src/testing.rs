//! Test doubles shared across module tests

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, TimeZone, Utc};
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::error::TransportError;
use crate::module::provider::types::{AuthGrant, RawId, RawPackage};
use crate::module::provider::{Credentials, ProviderTransport, SearchParams};

/// Clock that only moves when told to
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl Default for ManualClock {
    fn default() -> Self {
        let start = Utc
            .with_ymd_and_hms(2026, 3, 1, 9, 0, 0)
            .single()
            .unwrap_or_else(Utc::now);
        Self {
            now: Mutex::new(start),
        }
    }
}

impl ManualClock {
    pub fn advance(&self, delta: TimeDelta) {
        let mut now = self.now.lock().unwrap();
        *now += delta;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// In-memory provider.
///
/// Search filters are ignored; pagination is honoured. Every authentication
/// issues a distinct token, valid for one hour unless told otherwise.
pub struct FakeTransport {
    packages: Mutex<Vec<RawPackage>>,
    latency: Duration,
    auth_rejection: Mutex<Option<u16>>,
    grant_lifetime: Mutex<Option<i64>>,
    scripted_search_failures: Mutex<VecDeque<TransportError>>,
    persistent_search_failure: Mutex<Option<TransportError>>,
    persistent_detail_failure: Mutex<Option<TransportError>>,
    auth_calls: AtomicU64,
    search_calls: AtomicU64,
    detail_calls: AtomicU64,
}

impl FakeTransport {
    pub fn new() -> Self {
        Self {
            packages: Mutex::new(Vec::new()),
            latency: Duration::ZERO,
            auth_rejection: Mutex::new(None),
            grant_lifetime: Mutex::new(Some(3600)),
            scripted_search_failures: Mutex::new(VecDeque::new()),
            persistent_search_failure: Mutex::new(None),
            persistent_detail_failure: Mutex::new(None),
            auth_calls: AtomicU64::new(0),
            search_calls: AtomicU64::new(0),
            detail_calls: AtomicU64::new(0),
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn set_packages(&self, packages: Vec<RawPackage>) {
        *self.packages.lock().unwrap() = packages;
    }

    pub fn reject_auth(&self, status: u16) {
        *self.auth_rejection.lock().unwrap() = Some(status);
    }

    pub fn accept_auth(&self) {
        *self.auth_rejection.lock().unwrap() = None;
    }

    /// `expiresInSeconds` reported by the next grants
    pub fn set_grant_lifetime(&self, seconds: Option<i64>) {
        *self.grant_lifetime.lock().unwrap() = seconds;
    }

    /// Fail the next searches in order, then behave normally
    pub fn fail_next_searches(&self, failures: Vec<TransportError>) {
        self.scripted_search_failures.lock().unwrap().extend(failures);
    }

    pub fn fail_all_searches(&self, failure: TransportError) {
        *self.persistent_search_failure.lock().unwrap() = Some(failure);
    }

    pub fn fail_all_details(&self, failure: TransportError) {
        *self.persistent_detail_failure.lock().unwrap() = Some(failure);
    }

    /// Make every data request fail with a 503
    pub fn go_down(&self) {
        self.fail_all_searches(TransportError::Status(503));
        self.fail_all_details(TransportError::Status(503));
    }

    pub fn recover(&self) {
        *self.persistent_search_failure.lock().unwrap() = None;
        *self.persistent_detail_failure.lock().unwrap() = None;
        self.scripted_search_failures.lock().unwrap().clear();
    }

    pub fn auth_calls(&self) -> u64 {
        self.auth_calls.load(Ordering::SeqCst)
    }

    pub fn search_calls(&self) -> u64 {
        self.search_calls.load(Ordering::SeqCst)
    }

    pub fn detail_calls(&self) -> u64 {
        self.detail_calls.load(Ordering::SeqCst)
    }

    async fn pause(&self) {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
    }
}

#[async_trait]
impl ProviderTransport for FakeTransport {
    async fn authenticate(&self, _credentials: &Credentials) -> Result<AuthGrant, TransportError> {
        let n = self.auth_calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.pause().await;

        if let Some(status) = *self.auth_rejection.lock().unwrap() {
            return Err(TransportError::Status(status));
        }
        Ok(AuthGrant {
            token: format!("token-{}", n),
            expires_in_seconds: *self.grant_lifetime.lock().unwrap(),
        })
    }

    async fn search(&self, _token: &str, params: &SearchParams) -> Result<Vec<RawPackage>, TransportError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;

        if let Some(failure) = self.scripted_search_failures.lock().unwrap().pop_front() {
            return Err(failure);
        }
        if let Some(failure) = self.persistent_search_failure.lock().unwrap().clone() {
            return Err(failure);
        }

        let packages = self.packages.lock().unwrap();
        let page = params.page.max(1);
        let start = (page - 1) * params.page_size;
        Ok(packages
            .iter()
            .skip(start)
            .take(params.page_size)
            .cloned()
            .collect())
    }

    async fn package(&self, _token: &str, id: &str) -> Result<RawPackage, TransportError> {
        self.detail_calls.fetch_add(1, Ordering::SeqCst);
        self.pause().await;

        if let Some(failure) = self.persistent_detail_failure.lock().unwrap().clone() {
            return Err(failure);
        }

        self.packages
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.id == Some(RawId::Text(id.to_string())))
            .cloned()
            .ok_or(TransportError::Status(404))
    }
}

/// Minimal provider record
pub fn raw_package(id: &str, title: &str) -> RawPackage {
    RawPackage {
        id: Some(RawId::Text(id.to_string())),
        title: Some(title.to_string()),
        ..Default::default()
    }
}

/// Provider record with the fields ranking and search look at
pub fn raw_trip(id: &str, title: &str, destination: &str, category: &str, price: f64) -> RawPackage {
    RawPackage {
        destination: Some(destination.to_string()),
        category: Some(category.to_string()),
        price: Some(crate::module::provider::types::RawPrice::Amount(price)),
        ..raw_package(id, title)
    }
}

/// Config with credentials and near-zero retry backoff
pub fn test_config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.provider.base_url = "https://inventory.test/api".into();
    config.provider.username = "agency".into();
    config.provider.password = "secret".into();
    config.provider.page_size = 50;
    config.provider.max_pages = 3;
    config.retry.max_attempts = 3;
    config.retry.base_delay_ms = 1;
    config.retry.max_delay_ms = 2;
    config
}
