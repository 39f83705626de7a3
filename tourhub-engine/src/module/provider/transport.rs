//! HTTP exchange with the inventory provider.
//!
//! [`ProviderTransport`] performs exactly one request per call and reports the
//! raw outcome. Retries, token handling and timeouts live in the fetcher.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;

use super::types::{AuthGrant, DetailPayload, RawPackage, SearchPayload};
use crate::config::ProviderConfig;
use crate::error::TransportError;

/// Provider login
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.username.trim().is_empty() && !self.password.is_empty()
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Query parameters for `GET /search`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchParams {
    pub featured: bool,
    pub destination: Option<String>,
    pub country: Option<String>,
    pub category: Option<String>,
    pub price_min: Option<f64>,
    pub price_max: Option<f64>,
    pub page: usize,
    pub page_size: usize,
}

impl SearchParams {
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if self.featured {
            pairs.push(("featured", "true".to_string()));
        }
        if let Some(destination) = &self.destination {
            pairs.push(("destination", destination.clone()));
        }
        if let Some(country) = &self.country {
            pairs.push(("country", country.clone()));
        }
        if let Some(category) = &self.category {
            pairs.push(("category", category.clone()));
        }
        if let Some(min) = self.price_min {
            pairs.push(("priceMin", min.to_string()));
        }
        if let Some(max) = self.price_max {
            pairs.push(("priceMax", max.to_string()));
        }
        pairs.push(("page", self.page.max(1).to_string()));
        pairs.push(("pageSize", self.page_size.to_string()));
        pairs
    }
}

/// One-shot provider calls
#[async_trait]
pub trait ProviderTransport: Send + Sync {
    /// `POST /auth`
    async fn authenticate(&self, credentials: &Credentials) -> Result<AuthGrant, TransportError>;

    /// `GET /search`
    async fn search(&self, token: &str, params: &SearchParams) -> Result<Vec<RawPackage>, TransportError>;

    /// `GET /packages/{id}`
    async fn package(&self, token: &str, id: &str) -> Result<RawPackage, TransportError>;
}

/// reqwest-backed transport
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(config: &ProviderConfig) -> Result<Self> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        Url::parse(&base_url)
            .with_context(|| format!("Invalid provider base URL '{}'", config.base_url))?;

        let client = Client::builder()
            .timeout(config.request_timeout())
            .connect_timeout(Duration::from_secs(5))
            .user_agent(config.user_agent.clone())
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { client, base_url })
    }

    fn endpoint(&self, path: &str) -> Result<Url, TransportError> {
        Url::parse(&format!("{}/{}", self.base_url, path))
            .map_err(|e| TransportError::Network(format!("invalid URL for '{}': {}", path, e)))
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, TransportError> {
        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status(status.as_u16()));
        }
        response.json::<T>().await.map_err(map_reqwest_error)
    }
}

fn map_reqwest_error(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout
    } else if error.is_decode() {
        TransportError::Decode(error.to_string())
    } else if let Some(status) = error.status() {
        TransportError::Status(status.as_u16())
    } else {
        TransportError::Network(error.to_string())
    }
}

#[async_trait]
impl ProviderTransport for HttpTransport {
    async fn authenticate(&self, credentials: &Credentials) -> Result<AuthGrant, TransportError> {
        let url = self.endpoint("auth")?;
        let response = self
            .client
            .post(url)
            .json(&serde_json::json!({
                "username": credentials.username,
                "password": credentials.password,
            }))
            .send()
            .await
            .map_err(map_reqwest_error)?;

        Self::decode(response).await
    }

    async fn search(&self, token: &str, params: &SearchParams) -> Result<Vec<RawPackage>, TransportError> {
        let mut url = self.endpoint("search")?;
        {
            let mut query = url.query_pairs_mut();
            for (key, value) in params.query_pairs() {
                query.append_pair(key, &value);
            }
        }

        tracing::debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let payload: SearchPayload = Self::decode(response).await?;
        Ok(payload.into_records())
    }

    async fn package(&self, token: &str, id: &str) -> Result<RawPackage, TransportError> {
        let url = self.endpoint(&format!("packages/{}", urlencoding::encode(id)))?;

        tracing::debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let payload: DetailPayload = Self::decode(response).await?;
        Ok(payload.into_record())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_params_encode_filters() {
        let params = SearchParams {
            featured: true,
            destination: Some("España".into()),
            price_max: Some(1500.0),
            page: 0,
            page_size: 50,
            ..Default::default()
        };
        let pairs = params.query_pairs();

        assert!(pairs.contains(&("featured", "true".to_string())));
        assert!(pairs.contains(&("destination", "España".to_string())));
        assert!(pairs.contains(&("priceMax", "1500".to_string())));
        assert!(pairs.contains(&("page", "1".to_string())));
        assert!(pairs.contains(&("pageSize", "50".to_string())));
    }

    #[test]
    fn test_credentials_debug_hides_password() {
        let credentials = Credentials::new("agency", "hunter2");
        let printed = format!("{:?}", credentials);
        assert!(printed.contains("agency"));
        assert!(!printed.contains("hunter2"));
    }

    #[test]
    fn test_http_transport_rejects_invalid_base_url() {
        let config = ProviderConfig {
            base_url: "not a url".into(),
            ..Default::default()
        };
        assert!(HttpTransport::new(&config).is_err());

        let config = ProviderConfig {
            base_url: "https://inventory.test/api/".into(),
            ..Default::default()
        };
        let transport = HttpTransport::new(&config).unwrap();
        let url = transport.endpoint("packages/a%20b").unwrap();
        assert_eq!(url.as_str(), "https://inventory.test/api/packages/a%20b");
    }

    #[tokio::test]
    #[ignore] // Requires a reachable provider
    async fn test_live_search() {
        let config = ProviderConfig::default();
        let transport = HttpTransport::new(&config).unwrap();
        let result = transport.search("token", &SearchParams::default()).await;
        assert!(result.is_ok() || result.is_err());
    }
}
