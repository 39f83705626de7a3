//! Inbound query surface consumed by the route layer

use anyhow::Result;
use std::sync::Arc;
use tourhub_common::{
    DisplayPackage, ListOptions, PackageDetails, PackageList, SearchQuery, SearchResults,
};
use tracing::{debug, info};

use crate::clock::{Clock, SystemClock};
use crate::config::{EngineConfig, KeywordConfig};
use crate::error::EngineError;
use crate::module::catalog::{CatalogManager, EngineStats, RefreshReport};
use crate::module::homepage::HomepageFormatter;
use crate::module::provider::{HttpTransport, ProviderTransport};
use crate::module::ranking::{FileKeywords, KeywordSource, StaticKeywords};

const DEFAULT_FEATURED_LIMIT: usize = 10;

/// Package service shared by every request handler
pub struct PackageService {
    catalog: Arc<CatalogManager>,
    homepage: HomepageFormatter,
    homepage_count: usize,
}

impl PackageService {
    pub fn new(
        config: &EngineConfig,
        transport: Arc<dyn ProviderTransport>,
        keyword_source: Arc<dyn KeywordSource>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let catalog = CatalogManager::new(config, transport, keyword_source, clock);
        Self {
            catalog: Arc::new(catalog),
            homepage: HomepageFormatter::new(&config.homepage),
            homepage_count: config.homepage.default_count.max(1),
        }
    }

    /// Production wiring: HTTP transport, configured keyword source, wall clock
    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        let transport = HttpTransport::new(&config.provider)?;
        let keyword_source = keyword_source(&config.keywords);
        info!("Keyword table source: {}", keyword_source.describe());

        Ok(Self::new(config, Arc::new(transport), keyword_source, Arc::new(SystemClock)))
    }

    pub fn catalog(&self) -> Arc<CatalogManager> {
        Arc::clone(&self.catalog)
    }

    pub async fn get_all_packages(&self, options: ListOptions) -> PackageList {
        self.catalog.get_all(options).await
    }

    pub async fn get_featured_packages(&self, options: ListOptions) -> PackageList {
        let limit = options.limit.unwrap_or(DEFAULT_FEATURED_LIMIT).max(1);
        let mut list = self.catalog.get_featured(options.offset.saturating_add(limit)).await;
        list.packages = list.packages.into_iter().skip(options.offset).collect();
        list
    }

    pub async fn get_package_details(&self, id: &str) -> Result<PackageDetails, EngineError> {
        self.catalog.get_detail(id).await
    }

    pub async fn search_packages(&self, query: &SearchQuery) -> SearchResults {
        debug!("Search request: {:?}", query);
        self.catalog.search(query).await
    }

    pub async fn get_stats(&self) -> EngineStats {
        self.catalog.stats().await
    }

    pub fn reset_stats(&self) {
        self.catalog.reset_stats();
    }

    pub async fn refresh_all_data(&self) -> RefreshReport {
        self.catalog.refresh_all().await
    }

    /// Never fails; returns whether the provider answered
    pub async fn warm_up_cache(&self) -> bool {
        self.catalog.warm_up().await
    }

    pub async fn get_packages_for_homepage(&self) -> Vec<DisplayPackage> {
        let featured = self.catalog.get_featured(self.homepage_count).await;
        self.homepage.format_all(&featured.packages)
    }
}

/// An admin keyword file wins over inline entries
pub fn keyword_source(config: &KeywordConfig) -> Arc<dyn KeywordSource> {
    match config.file.as_deref().map(str::trim).filter(|f| !f.is_empty()) {
        Some(path) => Arc::new(FileKeywords::new(path)),
        None => Arc::new(StaticKeywords::new(config.entries.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::ranking::KeywordRecord;
    use crate::testing::{FakeTransport, ManualClock, raw_trip, test_config};
    use tourhub_common::{PackageSource, ResultSource};

    fn service(transport: Arc<FakeTransport>) -> PackageService {
        let mut config = test_config();
        config.homepage.default_count = 2;
        config.homepage.contact_email = "reservas@tourhub.travel".into();
        config.keywords.entries = vec![KeywordRecord::new("playa", "beach", 10.0)];

        PackageService::new(
            &config,
            transport,
            keyword_source(&config.keywords),
            Arc::new(ManualClock::default()),
        )
    }

    #[tokio::test]
    async fn test_homepage_cards_from_provider() {
        let transport = Arc::new(FakeTransport::new());
        transport.set_packages(vec![
            raw_trip("p-1", "Madrid Escapada", "Madrid, España", "ciudad", 420.0),
            raw_trip("p-2", "Playa Blanca", "Lanzarote, España", "playa", 1290.0),
            raw_trip("p-3", "Roma Clásica", "Roma", "ciudad", 610.0),
        ]);
        let service = service(transport);

        let cards = service.get_packages_for_homepage().await;
        assert_eq!(cards.len(), 2);
        assert_eq!(cards[0].id, "p-2");
        assert_eq!(cards[0].price_label, "1.290 €");
        assert_eq!(cards[0].detail_url, "/paquetes/p-2");
        assert_eq!(cards[0].contact.email, "reservas@tourhub.travel");
        assert_eq!(cards[0].source, PackageSource::Provider);
    }

    #[tokio::test]
    async fn test_homepage_degrades_transparently() {
        let transport = Arc::new(FakeTransport::new());
        transport.go_down();
        let service = service(transport);

        let cards = service.get_packages_for_homepage().await;
        assert_eq!(cards.len(), 2);
        assert!(cards.iter().all(|c| c.source == PackageSource::Fallback));
        assert!(cards.iter().all(|c| c.detail_url.starts_with("/paquetes/fallback-")));
    }

    #[tokio::test]
    async fn test_featured_pagination_and_warm_up() {
        let transport = Arc::new(FakeTransport::new());
        transport.set_packages(vec![
            raw_trip("p-1", "Madrid", "Madrid", "ciudad", 420.0),
            raw_trip("p-2", "Playa Blanca", "Lanzarote", "playa", 1290.0),
            raw_trip("p-3", "Roma", "Roma", "ciudad", 610.0),
        ]);
        let service = service(transport.clone());

        assert!(service.warm_up_cache().await);
        let page = service
            .get_featured_packages(ListOptions {
                limit: Some(1),
                offset: 1,
            })
            .await;
        assert_eq!(page.source, ResultSource::Cache);
        assert_eq!(page.packages.len(), 1);
        assert_eq!(page.packages[0].id, "p-1");

        // Warm-up filled both listing tiers
        let calls = transport.search_calls();
        service.get_all_packages(ListOptions::default()).await;
        assert_eq!(transport.search_calls(), calls);
    }

    #[tokio::test]
    async fn test_featured_offset_past_the_end_is_empty() {
        let transport = Arc::new(FakeTransport::new());
        transport.set_packages(vec![raw_trip("p-1", "Madrid", "Madrid", "ciudad", 420.0)]);
        let service = service(transport);

        let page = service
            .get_featured_packages(ListOptions {
                limit: Some(10),
                offset: usize::MAX,
            })
            .await;
        assert!(page.packages.is_empty());
        assert_eq!(page.source, ResultSource::Cache);
    }

    #[tokio::test]
    async fn test_details_not_found_reaches_caller() {
        let transport = Arc::new(FakeTransport::new());
        let service = service(transport);

        assert_eq!(
            service.get_package_details("missing").await,
            Err(EngineError::NotFound("missing".into()))
        );
    }

    #[test]
    fn test_keyword_file_takes_precedence() {
        let config = KeywordConfig {
            file: Some("/etc/tourhub/keywords.toml".into()),
            entries: vec![KeywordRecord::new("playa", "beach", 10.0)],
        };
        assert!(keyword_source(&config).describe().contains("keywords.toml"));

        let config = KeywordConfig {
            file: Some("  ".into()),
            entries: vec![KeywordRecord::new("playa", "beach", 10.0)],
        };
        assert_eq!(keyword_source(&config).describe(), "1 inline entries");
    }
}
