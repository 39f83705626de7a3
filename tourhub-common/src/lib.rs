//! Shared domain types for the TourHub package engine and its consumers.

pub mod types;

pub use types::{
    ContactInfo, DisplayPackage, Images, Keyword, ListOptions, Package, PackageDetails,
    PackageList, PackageSource, Price, Rating, ResultSource, SearchQuery, SearchResults,
    TripDuration,
};
