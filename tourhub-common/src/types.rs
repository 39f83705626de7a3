use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a package came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PackageSource {
    #[serde(rename = "provider")]
    Provider,
    #[serde(rename = "fallback")]
    Fallback,
}

impl PackageSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageSource::Provider => "provider",
            PackageSource::Fallback => "fallback",
        }
    }
}

impl std::fmt::Display for PackageSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for PackageSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "provider" => Ok(PackageSource::Provider),
            "fallback" => Ok(PackageSource::Fallback),
            _ => Err(format!("Unknown package source: {}", s)),
        }
    }
}

/// Whether a response was served from provider data or synthetic data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ResultSource {
    #[serde(rename = "cache")]
    Cache,
    #[serde(rename = "fallback")]
    Fallback,
}

impl ResultSource {
    pub fn from_degraded(degraded: bool) -> Self {
        if degraded {
            ResultSource::Fallback
        } else {
            ResultSource::Cache
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, ResultSource::Fallback)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ResultSource::Cache => "cache",
            ResultSource::Fallback => "fallback",
        }
    }
}

impl std::fmt::Display for ResultSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Price {
    pub amount: f64,
    pub currency: String,
}

impl Default for Price {
    fn default() -> Self {
        Self {
            amount: 0.0,
            currency: "EUR".to_string(),
        }
    }
}

/// Trip length
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TripDuration {
    pub days: u32,
    pub nights: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Images {
    pub main: Option<String>,
    #[serde(default)]
    pub gallery: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub average: f64,
    pub count: u32,
}

/// A travel package in its normalised form.
///
/// Every field is populated; missing provider data is replaced by explicit
/// defaults when the record is ingested. `source` is fixed at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Package {
    pub id: String,
    pub title: String,
    pub description: String,
    pub destination: String,
    pub country: String,
    pub price: Price,
    pub duration: TripDuration,
    pub category: String,
    pub images: Images,
    pub rating: Rating,
    pub features: Vec<String>,
    /// Flagged as featured by the provider
    pub featured: bool,
    /// Derived ranking value, always >= 0
    pub priority_score: f64,
    source: PackageSource,
    pub last_seen_at: DateTime<Utc>,
}

impl Package {
    /// Create a package with empty descriptive fields
    pub fn new(
        id: impl Into<String>,
        title: impl Into<String>,
        source: PackageSource,
        last_seen_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            destination: String::new(),
            country: String::new(),
            price: Price::default(),
            duration: TripDuration::default(),
            category: String::new(),
            images: Images::default(),
            rating: Rating::default(),
            features: Vec::new(),
            featured: false,
            priority_score: 0.0,
            source,
            last_seen_at,
        }
    }

    pub fn source(&self) -> PackageSource {
        self.source
    }

    pub fn is_fallback(&self) -> bool {
        self.source == PackageSource::Fallback
    }
}

/// Admin-managed ranking keyword
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyword {
    pub term: String,
    pub category: String,
    pub weight: f64,
    pub active: bool,
}

/// Search parameters. Empty strings are treated as "no filter".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SearchQuery {
    pub text: Option<String>,
    pub destination: Option<String>,
    pub country: Option<String>,
    pub category: Option<String>,
    pub price_min: Option<f64>,
    pub price_max: Option<f64>,
    pub limit: Option<usize>,
    pub offset: usize,
}

impl SearchQuery {
    pub fn destination(destination: impl Into<String>) -> Self {
        Self {
            destination: Some(destination.into()),
            ..Default::default()
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Default::default()
        }
    }
}

/// Pagination options for list accessors
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListOptions {
    pub limit: Option<usize>,
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResults {
    pub items: Vec<Package>,
    /// Filtered count before pagination
    pub total: usize,
    pub source: ResultSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageList {
    pub packages: Vec<Package>,
    pub source: ResultSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageDetails {
    pub package: Package,
    pub source: ResultSource,
}

/// Static contact block shown next to every homepage card
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContactInfo {
    pub phone: String,
    pub email: String,
    pub whatsapp: String,
}

/// Display-ready homepage card
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayPackage {
    pub id: String,
    pub title: String,
    pub destination: String,
    pub country: String,
    pub category: String,
    pub image: Option<String>,
    pub price_label: String,
    pub duration_label: String,
    pub rating: Rating,
    pub features: Vec<String>,
    pub contact: ContactInfo,
    pub detail_url: String,
    pub source: PackageSource,
}
