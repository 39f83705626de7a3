//! Keyword-weighted package ranking

mod keywords;
mod scorer;

pub use keywords::{FileKeywords, KeywordRecord, KeywordRegistry, KeywordSource, KeywordTable, StaticKeywords};
pub use scorer::{compare_ranked, rank, score};
