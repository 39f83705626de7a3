//! Filtering, featured selection and pagination over an in-memory package set

use tourhub_common::{Package, SearchQuery};

use crate::module::ranking::{KeywordTable, rank};

pub const DEFAULT_PAGE_SIZE: usize = 20;
pub const MAX_PAGE_SIZE: usize = 100;

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_lowercase)
}

fn contains(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(needle)
}

/// True when `package` satisfies every filter set in `query`
pub fn matches(package: &Package, query: &SearchQuery) -> bool {
    if let Some(destination) = non_empty(&query.destination) {
        if !contains(&package.destination, &destination) {
            return false;
        }
    }
    if let Some(country) = non_empty(&query.country) {
        if !contains(&package.country, &country) {
            return false;
        }
    }
    if let Some(category) = non_empty(&query.category) {
        if !contains(&package.category, &category) {
            return false;
        }
    }
    if let Some(min) = query.price_min {
        if package.price.amount < min {
            return false;
        }
    }
    if let Some(max) = query.price_max {
        if package.price.amount > max {
            return false;
        }
    }
    if let Some(text) = non_empty(&query.text) {
        let found = contains(&package.title, &text)
            || contains(&package.description, &text)
            || contains(&package.destination, &text);
        if !found {
            return false;
        }
    }
    true
}

/// Matching packages in display order, with the unpaginated count
pub fn filter_and_rank(packages: &[Package], query: &SearchQuery, table: &KeywordTable) -> (Vec<Package>, usize) {
    let mut matched: Vec<Package> = packages.iter().filter(|p| matches(p, query)).cloned().collect();
    rank(&mut matched, table);
    let total = matched.len();
    (paginate(matched, query.limit, query.offset), total)
}

/// Provider-flagged packages, or the best scored ones when nothing is flagged
pub fn select_featured(pool: &[Package], table: &KeywordTable, limit: usize) -> Vec<Package> {
    let flagged: Vec<Package> = pool.iter().filter(|p| p.featured).cloned().collect();
    let mut chosen = if flagged.is_empty() { pool.to_vec() } else { flagged };
    rank(&mut chosen, table);
    chosen.truncate(limit);
    chosen
}

pub fn paginate(items: Vec<Package>, limit: Option<usize>, offset: usize) -> Vec<Package> {
    let limit = limit.unwrap_or(DEFAULT_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE);
    items.into_iter().skip(offset).take(limit).collect()
}
