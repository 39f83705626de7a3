//! Admin keyword table: loading, validation and last-good retention

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;
use tourhub_common::Keyword;
use tracing::{debug, warn};

use crate::error::KeywordError;

const UNCATEGORIZED: &str = "uncategorized";

/// A keyword as written by an admin. Every field may be missing or wrong.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeywordRecord {
    #[serde(default)]
    pub term: Option<String>,

    #[serde(default)]
    pub category: Option<String>,

    #[serde(default)]
    pub weight: Option<f64>,

    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl KeywordRecord {
    pub fn new(term: &str, category: &str, weight: f64) -> Self {
        Self {
            term: Some(term.to_string()),
            category: Some(category.to_string()),
            weight: Some(weight),
            active: true,
        }
    }
}

/// A validated keyword table, sorted by `(term, category)`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeywordTable {
    keywords: Vec<Keyword>,
}

impl KeywordTable {
    /// Validate raw records. Malformed entries are reported and left out.
    pub fn from_records(records: &[KeywordRecord]) -> (Self, Vec<KeywordError>) {
        let mut keywords = Vec::with_capacity(records.len());
        let mut errors = Vec::new();
        let mut seen = HashSet::new();

        for (index, record) in records.iter().enumerate() {
            let term = match record.term.as_deref().map(str::trim) {
                Some(term) if !term.is_empty() => term.to_lowercase(),
                _ => {
                    errors.push(KeywordError::MissingTerm { index });
                    continue;
                }
            };
            let weight = match record.weight {
                Some(weight) if weight.is_finite() => weight,
                Some(_) => {
                    errors.push(KeywordError::InvalidWeight { term });
                    continue;
                }
                None => {
                    errors.push(KeywordError::MissingWeight { term });
                    continue;
                }
            };
            let category = record
                .category
                .as_deref()
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .unwrap_or(UNCATEGORIZED)
                .to_lowercase();

            if !seen.insert((term.clone(), category.clone())) {
                errors.push(KeywordError::Duplicate { term, category });
                continue;
            }

            keywords.push(Keyword {
                term,
                category,
                weight,
                active: record.active,
            });
        }

        keywords.sort_by(|a, b| a.term.cmp(&b.term).then_with(|| a.category.cmp(&b.category)));
        (Self { keywords }, errors)
    }

    pub fn keywords(&self) -> &[Keyword] {
        &self.keywords
    }

    pub fn active(&self) -> impl Iterator<Item = &Keyword> {
        self.keywords.iter().filter(|k| k.active)
    }

    pub fn len(&self) -> usize {
        self.keywords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    /// Active keyword count per category
    pub fn distribution(&self) -> BTreeMap<String, usize> {
        let mut distribution = BTreeMap::new();
        for keyword in self.active() {
            *distribution.entry(keyword.category.clone()).or_insert(0) += 1;
        }
        distribution
    }
}

/// Where the keyword table comes from
#[async_trait]
pub trait KeywordSource: Send + Sync {
    async fn load(&self) -> Result<Vec<KeywordRecord>>;

    fn describe(&self) -> String;
}

/// Entries given inline in the engine config
pub struct StaticKeywords {
    records: Vec<KeywordRecord>,
}

impl StaticKeywords {
    pub fn new(records: Vec<KeywordRecord>) -> Self {
        Self { records }
    }
}

#[async_trait]
impl KeywordSource for StaticKeywords {
    async fn load(&self) -> Result<Vec<KeywordRecord>> {
        Ok(self.records.clone())
    }

    fn describe(&self) -> String {
        format!("{} inline entries", self.records.len())
    }
}

/// Entries stay untyped until each one is checked on its own
#[derive(Debug, Default, Deserialize)]
struct KeywordFile {
    #[serde(default)]
    keywords: Vec<toml::Value>,
}

/// A TOML file of `[[keywords]]` tables, edited by admins while the engine runs
pub struct FileKeywords {
    path: PathBuf,
}

impl FileKeywords {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl KeywordSource for FileKeywords {
    async fn load(&self) -> Result<Vec<KeywordRecord>> {
        let content = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read keyword file {:?}", self.path))?;
        let file: KeywordFile = toml::from_str(&content)
            .with_context(|| format!("Failed to parse keyword file {:?}", self.path))?;

        let mut records = Vec::with_capacity(file.keywords.len());
        for (index, value) in file.keywords.into_iter().enumerate() {
            match value.try_into::<KeywordRecord>() {
                Ok(record) => records.push(record),
                Err(e) => {
                    let error = KeywordError::Unreadable {
                        index,
                        reason: e.to_string(),
                    };
                    warn!("Skipping keyword from {}: {}", self.describe(), error);
                }
            }
        }
        Ok(records)
    }

    fn describe(&self) -> String {
        format!("file {:?}", self.path)
    }
}

/// Re-reads the keyword source on demand and keeps the last table that loaded
pub struct KeywordRegistry {
    source: Arc<dyn KeywordSource>,
    last_good: RwLock<Arc<KeywordTable>>,
}

impl KeywordRegistry {
    pub fn new(source: Arc<dyn KeywordSource>) -> Self {
        Self {
            source,
            last_good: RwLock::new(Arc::new(KeywordTable::default())),
        }
    }

    /// The table from the last successful load, without touching the source
    pub async fn cached(&self) -> Arc<KeywordTable> {
        Arc::clone(&*self.last_good.read().await)
    }

    /// Reload the table. Falls back to the last good table (possibly empty)
    /// when the source cannot be read.
    pub async fn current(&self) -> Arc<KeywordTable> {
        match self.source.load().await {
            Ok(records) => {
                let (table, errors) = KeywordTable::from_records(&records);
                for error in &errors {
                    warn!("Skipping keyword from {}: {}", self.source.describe(), error);
                }
                debug!("Loaded {} keywords from {}", table.len(), self.source.describe());

                let table = Arc::new(table);
                *self.last_good.write().await = Arc::clone(&table);
                table
            }
            Err(e) => {
                let table = Arc::clone(&*self.last_good.read().await);
                warn!(
                    "Keyword source {} unavailable ({:#}), using last good table of {} keywords",
                    self.source.describe(),
                    e,
                    table.len()
                );
                table
            }
        }
    }
}
