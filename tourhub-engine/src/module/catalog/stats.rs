use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use tourhub_common::ResultSource;
use uuid::Uuid;

use crate::module::cache::TierStats;
use crate::module::provider::AuthState;

/// Outcome of one full refresh
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub packages_refreshed: usize,
    pub featured_count: usize,
    pub source: ResultSource,
    pub duration_seconds: f64,
}

impl RefreshReport {
    /// True when both lists came from the provider
    pub fn success(&self) -> bool {
        !self.source.is_fallback()
    }
}

/// Engine health snapshot
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStats {
    pub generated_at: DateTime<Utc>,
    pub tiers: Vec<TierStats>,
    /// Hits over lookups across all tiers since the last reset
    pub cache_hit_rate: f64,
    /// Mean wall time of provider calls, `None` before the first call
    pub avg_response_time_estimate_ms: Option<f64>,
    pub remote_calls: u64,
    pub keyword_distribution: BTreeMap<String, usize>,
    pub auth_state: AuthState,
    pub token_refreshes: u64,
    pub refresh_runs: u64,
    pub last_refresh: Option<RefreshReport>,
}

pub(crate) fn overall_hit_rate(tiers: &[TierStats]) -> f64 {
    let hits: u64 = tiers.iter().map(|t| t.hits).sum();
    let lookups: u64 = tiers.iter().map(|t| t.hits + t.misses).sum();
    if lookups == 0 {
        0.0
    } else {
        hits as f64 / lookups as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::cache::Tier;

    fn tier(tier: Tier, hits: u64, misses: u64) -> TierStats {
        TierStats {
            tier,
            entries: 0,
            hits,
            misses,
            coalesced: 0,
            loads: misses,
            hit_rate: 0.0,
            last_refresh_at: None,
        }
    }

    #[test]
    fn test_overall_hit_rate_weights_by_lookups() {
        let tiers = vec![tier(Tier::Featured, 3, 1), tier(Tier::All, 0, 0), tier(Tier::Details, 1, 3)];
        assert_eq!(overall_hit_rate(&tiers), 0.5);
        assert_eq!(overall_hit_rate(&[]), 0.0);
    }
}
