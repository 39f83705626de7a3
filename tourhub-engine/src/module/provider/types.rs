//! Wire records returned by the inventory provider.
//!
//! The provider is loose about field names and optional data, so every field
//! here is optional. `into_package` is the single place where a raw record
//! becomes a strict [`Package`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tourhub_common::{Images, Package, PackageSource, Price, Rating, TripDuration};
use tracing::warn;

const DEFAULT_CURRENCY: &str = "EUR";

/// Provider ids show up both as strings and as numbers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawId {
    Text(String),
    Number(i64),
}

impl RawId {
    fn normalized(&self) -> Option<String> {
        let id = match self {
            RawId::Text(text) => text.trim().to_string(),
            RawId::Number(number) => number.to_string(),
        };
        if id.is_empty() { None } else { Some(id) }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawPrice {
    Amount(f64),
    /// `"899"` or `"899,50"`
    Text(String),
    Detailed {
        #[serde(default, alias = "value")]
        amount: Option<f64>,
        #[serde(default)]
        currency: Option<String>,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawDuration {
    pub days: Option<u32>,
    pub nights: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawImages {
    #[serde(alias = "cover")]
    pub main: Option<String>,
    pub gallery: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawRating {
    pub average: Option<f64>,
    #[serde(alias = "reviews")]
    pub count: Option<u32>,
}

/// One package as the provider sends it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RawPackage {
    #[serde(alias = "code", alias = "packageId")]
    pub id: Option<RawId>,
    #[serde(alias = "name")]
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(alias = "city")]
    pub destination: Option<String>,
    pub country: Option<String>,
    pub price: Option<RawPrice>,
    pub duration: Option<RawDuration>,
    #[serde(alias = "type")]
    pub category: Option<String>,
    pub images: Option<RawImages>,
    pub rating: Option<RawRating>,
    pub features: Option<Vec<String>>,
    pub featured: Option<bool>,
}

impl RawPackage {
    /// Normalise into a strict package. Records without an id are unusable.
    pub fn into_package(self, seen_at: DateTime<Utc>) -> Option<Package> {
        let id = self.id.as_ref().and_then(RawId::normalized)?;
        Some(self.build(id, seen_at))
    }

    /// Normalise a detail record, using the requested id if the body omits it
    pub fn into_package_with_id(self, requested_id: &str, seen_at: DateTime<Utc>) -> Package {
        let id = self
            .id
            .as_ref()
            .and_then(RawId::normalized)
            .unwrap_or_else(|| requested_id.to_string());
        self.build(id, seen_at)
    }

    fn build(self, id: String, seen_at: DateTime<Utc>) -> Package {
        let destination = clean(self.destination);
        let title = clean(self.title);
        let title = if !title.is_empty() {
            title
        } else if !destination.is_empty() {
            destination.clone()
        } else {
            format!("Paquete {}", id)
        };

        let mut package = Package::new(id, title, PackageSource::Provider, seen_at);
        package.description = clean(self.description);
        package.destination = destination;
        package.country = clean(self.country);
        package.category = clean(self.category);
        package.price = normalize_price(self.price);
        package.duration = normalize_duration(self.duration);
        package.images = normalize_images(self.images);
        package.rating = normalize_rating(self.rating);
        package.features = self
            .features
            .unwrap_or_default()
            .into_iter()
            .map(|f| f.trim().to_string())
            .filter(|f| !f.is_empty())
            .collect();
        package.featured = self.featured.unwrap_or(false);
        package
    }
}

fn clean(value: Option<String>) -> String {
    value.map(|v| v.trim().to_string()).unwrap_or_default()
}

fn non_negative(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 { value } else { 0.0 }
}

fn normalize_price(price: Option<RawPrice>) -> Price {
    let (amount, currency) = match price {
        Some(RawPrice::Amount(amount)) => (amount, None),
        Some(RawPrice::Text(text)) => (text.trim().replace(',', ".").parse().unwrap_or(0.0), None),
        Some(RawPrice::Detailed { amount, currency }) => (amount.unwrap_or(0.0), currency),
        None => (0.0, None),
    };
    let currency = currency
        .map(|c| c.trim().to_uppercase())
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| DEFAULT_CURRENCY.to_string());
    Price {
        amount: non_negative(amount),
        currency,
    }
}

fn normalize_duration(duration: Option<RawDuration>) -> TripDuration {
    let raw = duration.unwrap_or_default();
    match (raw.days, raw.nights) {
        (Some(days), Some(nights)) => TripDuration { days, nights },
        (Some(days), None) => TripDuration {
            days,
            nights: days.saturating_sub(1),
        },
        (None, Some(nights)) => TripDuration {
            days: nights.saturating_add(1),
            nights,
        },
        (None, None) => TripDuration::default(),
    }
}

fn normalize_images(images: Option<RawImages>) -> Images {
    let raw = images.unwrap_or_default();
    let gallery: Vec<String> = raw
        .gallery
        .unwrap_or_default()
        .into_iter()
        .filter(|url| !url.trim().is_empty())
        .collect();
    let main = raw
        .main
        .filter(|url| !url.trim().is_empty())
        .or_else(|| gallery.first().cloned());
    Images { main, gallery }
}

fn normalize_rating(rating: Option<RawRating>) -> Rating {
    let raw = rating.unwrap_or_default();
    Rating {
        average: non_negative(raw.average.unwrap_or(0.0)),
        count: raw.count.unwrap_or(0),
    }
}

/// `POST /auth` response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthGrant {
    #[serde(alias = "access_token", alias = "accessToken")]
    pub token: String,
    #[serde(
        default,
        rename = "expiresInSeconds",
        alias = "expires_in",
        alias = "expiresIn"
    )]
    pub expires_in_seconds: Option<i64>,
}

/// `GET /search` response: a bare list or a wrapped one.
///
/// Records are kept as JSON until `into_records` so one bad record cannot
/// sink the whole page.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SearchPayload {
    List(Vec<serde_json::Value>),
    Wrapped {
        #[serde(alias = "results", alias = "data", alias = "items")]
        packages: Vec<serde_json::Value>,
    },
}

impl SearchPayload {
    /// Decode each record, dropping the ones that do not fit
    pub fn into_records(self) -> Vec<RawPackage> {
        let values = match self {
            SearchPayload::List(values) => values,
            SearchPayload::Wrapped { packages } => packages,
        };
        values
            .into_iter()
            .enumerate()
            .filter_map(|(index, value)| match serde_json::from_value::<RawPackage>(value) {
                Ok(record) => Some(record),
                Err(e) => {
                    warn!("Dropping provider record #{}: {}", index, e);
                    None
                }
            })
            .collect()
    }
}

/// `GET /packages/{id}` response
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DetailPayload {
    Wrapped { package: RawPackage },
    Bare(RawPackage),
}

impl DetailPayload {
    pub fn into_record(self) -> RawPackage {
        match self {
            DetailPayload::Wrapped { package } => package,
            DetailPayload::Bare(record) => record,
        }
    }
}
