pub mod cache;
pub mod catalog;
pub mod homepage;
pub mod provider;
pub mod ranking;
pub mod scheduled;
