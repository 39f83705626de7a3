//! Travel package aggregation, caching and ranking engine

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;
pub mod module;
pub mod service;

#[cfg(test)]
pub(crate) mod testing;

pub use config::EngineConfig;
pub use error::EngineError;
pub use service::PackageService;
