use anyhow::{Context, Result};
use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::module::ranking::KeywordRecord;

/// Top-level engine configuration, loaded from `config.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub provider: ProviderConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub session: SessionConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub fallback: FallbackConfig,

    #[serde(default)]
    pub keywords: KeywordConfig,

    #[serde(default)]
    pub homepage: HomepageConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub password: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default = "default_request_timeout_seconds")]
    pub request_timeout_seconds: u64,

    /// Records requested per `/search` page
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// Upper bound on pages walked by a full listing
    #[serde(default = "default_max_pages")]
    pub max_pages: usize,
}

fn default_base_url() -> String {
    "https://api.provider.example/v1".to_string()
}

fn default_user_agent() -> String {
    format!("tourhub-engine/{}", env!("CARGO_PKG_VERSION"))
}

fn default_request_timeout_seconds() -> u64 {
    10
}

fn default_page_size() -> usize {
    100
}

fn default_max_pages() -> usize {
    5
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            username: String::new(),
            password: String::new(),
            user_agent: default_user_agent(),
            request_timeout_seconds: default_request_timeout_seconds(),
            page_size: default_page_size(),
            max_pages: default_max_pages(),
        }
    }
}

impl ProviderConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,

    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_base_delay_ms() -> u64 {
    500
}

fn default_max_delay_ms() -> u64 {
    4_000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Refresh the token when it expires within this window
    #[serde(default = "default_refresh_lead_seconds")]
    pub refresh_lead_seconds: i64,

    /// Lifetime assumed when the provider omits `expiresInSeconds`
    #[serde(default = "default_token_lifetime_seconds")]
    pub default_token_lifetime_seconds: i64,
}

fn default_refresh_lead_seconds() -> i64 {
    60
}

fn default_token_lifetime_seconds() -> i64 {
    3_600
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            refresh_lead_seconds: default_refresh_lead_seconds(),
            default_token_lifetime_seconds: default_token_lifetime_seconds(),
        }
    }
}

impl SessionConfig {
    pub fn refresh_lead(&self) -> TimeDelta {
        TimeDelta::seconds(self.refresh_lead_seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_featured_ttl_minutes")]
    pub featured_ttl_minutes: i64,

    #[serde(default = "default_all_ttl_minutes")]
    pub all_ttl_minutes: i64,

    #[serde(default = "default_details_ttl_minutes")]
    pub details_ttl_minutes: i64,

    /// TTL for degraded (fallback) and not-found entries
    #[serde(default = "default_negative_ttl_seconds")]
    pub negative_ttl_seconds: i64,

    /// Packages requested from the provider for the featured tier
    #[serde(default = "default_featured_pool_size")]
    pub featured_pool_size: usize,
}

fn default_featured_ttl_minutes() -> i64 {
    10
}

fn default_all_ttl_minutes() -> i64 {
    30
}

fn default_details_ttl_minutes() -> i64 {
    60
}

fn default_negative_ttl_seconds() -> i64 {
    60
}

fn default_featured_pool_size() -> usize {
    24
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            featured_ttl_minutes: default_featured_ttl_minutes(),
            all_ttl_minutes: default_all_ttl_minutes(),
            details_ttl_minutes: default_details_ttl_minutes(),
            negative_ttl_seconds: default_negative_ttl_seconds(),
            featured_pool_size: default_featured_pool_size(),
        }
    }
}

impl CacheConfig {
    pub fn featured_ttl(&self) -> TimeDelta {
        TimeDelta::minutes(self.featured_ttl_minutes)
    }

    pub fn all_ttl(&self) -> TimeDelta {
        TimeDelta::minutes(self.all_ttl_minutes)
    }

    pub fn details_ttl(&self) -> TimeDelta {
        TimeDelta::minutes(self.details_ttl_minutes)
    }

    pub fn negative_ttl(&self) -> TimeDelta {
        TimeDelta::seconds(self.negative_ttl_seconds)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FallbackConfig {
    #[serde(default = "default_fallback_all_count")]
    pub all_count: usize,

    #[serde(default = "default_fallback_featured_count")]
    pub featured_count: usize,
}

fn default_fallback_all_count() -> usize {
    12
}

fn default_fallback_featured_count() -> usize {
    6
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            all_count: default_fallback_all_count(),
            featured_count: default_fallback_featured_count(),
        }
    }
}

/// Keyword table location: an admin-maintained file wins over inline entries
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeywordConfig {
    #[serde(default)]
    pub file: Option<String>,

    #[serde(default)]
    pub entries: Vec<KeywordRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HomepageConfig {
    #[serde(default = "default_homepage_count")]
    pub default_count: usize,

    #[serde(default = "default_detail_url_base")]
    pub detail_url_base: String,

    #[serde(default)]
    pub contact_phone: String,

    #[serde(default)]
    pub contact_email: String,

    #[serde(default)]
    pub contact_whatsapp: String,
}

fn default_homepage_count() -> usize {
    8
}

fn default_detail_url_base() -> String {
    "/paquetes".to_string()
}

impl Default for HomepageConfig {
    fn default() -> Self {
        Self {
            default_count: default_homepage_count(),
            detail_url_base: default_detail_url_base(),
            contact_phone: String::new(),
            contact_email: String::new(),
            contact_whatsapp: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_refresh_interval_minutes")]
    pub refresh_interval_minutes: u64,

    #[serde(default = "default_warm_up_on_start")]
    pub warm_up_on_start: bool,
}

fn default_refresh_interval_minutes() -> u64 {
    30
}

fn default_warm_up_on_start() -> bool {
    true
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            refresh_interval_minutes: default_refresh_interval_minutes(),
            warm_up_on_start: default_warm_up_on_start(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    #[serde(default = "default_log_dir")]
    pub dir: String,

    #[serde(default = "default_log_retention_days")]
    pub retention_days: u64,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

fn default_log_retention_days() -> u64 {
    3
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dir: default_log_dir(),
            retention_days: default_log_retention_days(),
        }
    }
}

impl EngineConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file '{}'", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("Failed to parse config file '{}'", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.provider.base_url.trim().is_empty() {
            anyhow::bail!("provider.base_url must not be empty");
        }
        if self.provider.page_size == 0 || self.provider.max_pages == 0 {
            anyhow::bail!("provider.page_size and provider.max_pages must be at least 1");
        }
        if self.retry.max_attempts == 0 {
            anyhow::bail!("retry.max_attempts must be at least 1");
        }
        if self.cache.featured_ttl_minutes <= 0
            || self.cache.all_ttl_minutes <= 0
            || self.cache.details_ttl_minutes <= 0
            || self.cache.negative_ttl_seconds <= 0
        {
            anyhow::bail!("cache TTLs must be positive");
        }
        if self.scheduler.refresh_interval_minutes == 0 {
            anyhow::bail!("scheduler.refresh_interval_minutes must be at least 1");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = EngineConfig::from_toml("").unwrap();
        assert_eq!(config.cache.featured_ttl(), TimeDelta::minutes(10));
        assert_eq!(config.cache.all_ttl(), TimeDelta::minutes(30));
        assert_eq!(config.cache.details_ttl(), TimeDelta::minutes(60));
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.provider.request_timeout(), Duration::from_secs(10));
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_from_file_reads_keywords_and_overrides() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            r#"
[provider]
base_url = "https://inventory.test/api"
username = "agency"
password = "secret"

[cache]
all_ttl_minutes = 5

[[keywords.entries]]
term = "playa"
category = "beach"
weight = 10
"#
        )
        .unwrap();

        let config = EngineConfig::from_file(file.path()).unwrap();
        assert_eq!(config.provider.base_url, "https://inventory.test/api");
        assert_eq!(config.cache.all_ttl_minutes, 5);
        assert_eq!(config.cache.featured_ttl_minutes, 10);
        assert_eq!(config.keywords.entries.len(), 1);
        assert_eq!(config.keywords.entries[0].term.as_deref(), Some("playa"));
        assert!(config.keywords.entries[0].active);
    }

    #[test]
    fn test_validation_rejects_zero_attempts() {
        let err = EngineConfig::from_toml("[retry]\nmax_attempts = 0\n").unwrap_err();
        assert!(err.to_string().contains("max_attempts"));
    }
}
