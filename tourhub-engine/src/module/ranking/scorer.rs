use std::cmp::Ordering;
use tourhub_common::Package;

use super::keywords::KeywordTable;

/// Sum of the weights of active keywords found in the package's title,
/// category or destination. Each keyword counts once; the result is never
/// negative.
pub fn score(package: &Package, table: &KeywordTable) -> f64 {
    let haystacks = [
        package.title.to_lowercase(),
        package.category.to_lowercase(),
        package.destination.to_lowercase(),
    ];

    let total: f64 = table
        .active()
        .filter(|keyword| haystacks.iter().any(|text| text.contains(&keyword.term)))
        .map(|keyword| keyword.weight)
        .sum();

    total.max(0.0)
}

/// Display order: score, then rating, then price, then id
pub fn compare_ranked(a: &Package, b: &Package) -> Ordering {
    b.priority_score
        .total_cmp(&a.priority_score)
        .then_with(|| b.rating.average.total_cmp(&a.rating.average))
        .then_with(|| a.price.amount.total_cmp(&b.price.amount))
        .then_with(|| a.id.cmp(&b.id))
}

/// Score every package against `table` and sort into display order
pub fn rank(packages: &mut [Package], table: &KeywordTable) {
    for package in packages.iter_mut() {
        package.priority_score = score(package, table);
    }
    packages.sort_by(compare_ranked);
}
