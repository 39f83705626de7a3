//! Package catalog
//!
//! - `CatalogManager`: cached, ranked, fallback-backed access to inventory
//! - `FallbackGenerator`: synthetic packages for provider outages
//! - `search`: pure filtering and pagination helpers

mod fallback;
mod manager;
pub mod search;
mod stats;

pub use fallback::{FallbackGenerator, FallbackKind};
pub use manager::CatalogManager;
pub use stats::{EngineStats, RefreshReport};
