use std::sync::Arc;
use tourhub_common::Package;
use tracing::{debug, info};

use super::Tier;
use super::tier::{CacheTier, TierStats};
use crate::clock::Clock;
use crate::config::CacheConfig;

/// The three package tiers
pub struct CacheStore {
    pub featured: Arc<CacheTier<Vec<Package>>>,
    pub all: Arc<CacheTier<Vec<Package>>>,
    /// `None` records a package the provider does not know
    pub details: Arc<CacheTier<Option<Package>>>,
}

impl CacheStore {
    pub fn new(config: &CacheConfig, clock: Arc<dyn Clock>) -> Self {
        let negative_ttl = config.negative_ttl();
        Self {
            featured: Arc::new(CacheTier::new(
                Tier::Featured,
                config.featured_ttl(),
                negative_ttl,
                Arc::clone(&clock),
            )),
            all: Arc::new(CacheTier::new(
                Tier::All,
                config.all_ttl(),
                negative_ttl,
                Arc::clone(&clock),
            )),
            details: Arc::new(CacheTier::new(Tier::Details, config.details_ttl(), negative_ttl, clock)),
        }
    }

    pub async fn invalidate_all(&self) {
        self.featured.invalidate(None).await;
        self.all.invalidate(None).await;
        self.details.invalidate(None).await;
        info!("All cache tiers invalidated");
    }

    pub async fn purge_expired(&self) -> usize {
        let purged = self.featured.purge_expired().await
            + self.all.purge_expired().await
            + self.details.purge_expired().await;
        if purged > 0 {
            debug!("Purged {} expired cache entries", purged);
        }
        purged
    }

    /// Stats for every tier, in [`Tier::ALL`] order
    pub async fn stats(&self) -> Vec<TierStats> {
        vec![
            self.featured.stats().await,
            self.all.stats().await,
            self.details.stats().await,
        ]
    }

    pub fn reset_stats(&self) {
        self.featured.reset_stats();
        self.all.reset_stats();
        self.details.reset_stats();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::cache::Loaded;
    use crate::testing::ManualClock;
    use chrono::Utc;
    use tourhub_common::PackageSource;

    #[tokio::test]
    async fn test_tiers_are_independent() {
        let clock = Arc::new(ManualClock::default());
        let store = CacheStore::new(&CacheConfig::default(), clock);

        store
            .all
            .get_or_load("default", || async {
                Loaded::fresh(vec![Package::new("a", "A", PackageSource::Provider, Utc::now())])
            })
            .await
            .unwrap();
        store
            .details
            .get_or_load("missing", || async { Loaded::negative(None) })
            .await
            .unwrap();

        let stats = store.stats().await;
        let tiers: Vec<Tier> = stats.iter().map(|s| s.tier).collect();
        assert_eq!(tiers, Tier::ALL.to_vec());
        assert_eq!(stats[0].entries, 0);
        assert_eq!(stats[1].entries, 1);
        assert_eq!(stats[2].entries, 1);

        store.invalidate_all().await;
        assert!(store.stats().await.iter().all(|s| s.entries == 0));
    }
}
