//! Tiered TTL cache with single-flight loading.
//!
//! Three independent tiers (featured list, full list, per-package details)
//! share one mechanism: [`CacheTier`]. Concurrent misses on the same key share
//! one load; invalidation bumps a generation so loads started earlier never
//! overwrite newer state.

mod entry;
mod store;
mod tier;

pub use entry::{CacheEntry, Loaded};
pub use store::CacheStore;
pub use tier::{CacheTier, TierStats};

use serde::Serialize;
use std::fmt;

/// Cache tier identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Featured,
    All,
    Details,
}

impl Tier {
    pub const ALL: [Tier; 3] = [Tier::Featured, Tier::All, Tier::Details];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Featured => "featured",
            Tier::All => "all",
            Tier::Details => "details",
        }
    }
}

impl fmt::Display for Tier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
