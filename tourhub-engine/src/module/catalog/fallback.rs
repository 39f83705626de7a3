//! Synthetic inventory served while the provider is unreachable

use std::sync::Arc;
use tourhub_common::{Images, Package, PackageSource, Price, Rating, TripDuration};

use crate::clock::Clock;
use crate::config::FallbackConfig;

const ID_PREFIX: &str = "fallback-";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackKind {
    Featured,
    All,
}

struct Template {
    title: &'static str,
    description: &'static str,
    destination: &'static str,
    country: &'static str,
    category: &'static str,
    price: f64,
    days: u32,
    rating: f64,
    reviews: u32,
    features: &'static [&'static str],
}

const TEMPLATES: &[Template] = &[
    Template {
        title: "Barcelona Modernista",
        description: "Gaudí, barrio gótico y tardes de playa en la Barceloneta.",
        destination: "Barcelona, España",
        country: "España",
        category: "ciudad",
        price: 649.0,
        days: 4,
        rating: 4.6,
        reviews: 212,
        features: &["Hotel céntrico", "Desayuno incluido", "Visita guiada"],
    },
    Template {
        title: "Playa del Carmen Todo Incluido",
        description: "Resort frente al mar en la Riviera Maya.",
        destination: "Playa del Carmen",
        country: "México",
        category: "playa",
        price: 1290.0,
        days: 8,
        rating: 4.7,
        reviews: 344,
        features: &["Todo incluido", "Vuelos", "Traslados"],
    },
    Template {
        title: "Andalucía Esencial",
        description: "Sevilla, Córdoba y Granada en un recorrido por el sur.",
        destination: "Sevilla, España",
        country: "España",
        category: "cultural",
        price: 890.0,
        days: 7,
        rating: 4.5,
        reviews: 158,
        features: &["Circuito en bus", "Entradas a la Alhambra"],
    },
    Template {
        title: "Cancún Relax",
        description: "Sol, arena blanca y excursión a Chichén Itzá.",
        destination: "Cancún",
        country: "México",
        category: "playa",
        price: 1150.0,
        days: 7,
        rating: 4.4,
        reviews: 276,
        features: &["Hotel 4 estrellas", "Excursión opcional"],
    },
    Template {
        title: "Mallorca en Familia",
        description: "Calas, pueblos de montaña y hoteles con club infantil.",
        destination: "Palma de Mallorca, España",
        country: "España",
        category: "playa",
        price: 780.0,
        days: 6,
        rating: 4.3,
        reviews: 97,
        features: &["Media pensión", "Club infantil"],
    },
    Template {
        title: "Madrid Escapada",
        description: "Museos del Prado y Reina Sofía con tapas por La Latina.",
        destination: "Madrid, España",
        country: "España",
        category: "ciudad",
        price: 420.0,
        days: 3,
        rating: 4.2,
        reviews: 131,
        features: &["Hotel céntrico", "Entradas a museos"],
    },
    Template {
        title: "Lisboa y Sintra",
        description: "Tranvías, miradores y palacios románticos.",
        destination: "Lisboa",
        country: "Portugal",
        category: "cultural",
        price: 560.0,
        days: 4,
        rating: 4.5,
        reviews: 88,
        features: &["Desayuno incluido", "Excursión a Sintra"],
    },
    Template {
        title: "Tenerife Natural",
        description: "Teide, senderismo y playas volcánicas.",
        destination: "Tenerife, España",
        country: "España",
        category: "naturaleza",
        price: 690.0,
        days: 5,
        rating: 4.4,
        reviews: 120,
        features: &["Coche de alquiler", "Subida al Teide"],
    },
];

/// Deterministic package set keyed `fallback-1..N`
pub struct FallbackGenerator {
    all_count: usize,
    featured_count: usize,
    clock: Arc<dyn Clock>,
}

impl FallbackGenerator {
    pub fn new(config: &FallbackConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            all_count: config.all_count.max(1),
            featured_count: config.featured_count.max(1),
            clock,
        }
    }

    pub fn count(&self, kind: FallbackKind) -> usize {
        match kind {
            FallbackKind::Featured => self.featured_count,
            FallbackKind::All => self.all_count,
        }
    }

    pub fn generate(&self, kind: FallbackKind) -> Vec<Package> {
        (1..=self.count(kind)).map(|n| self.build(n)).collect()
    }

    /// Rebuild one package by id
    pub fn find(&self, id: &str) -> Option<Package> {
        let n: usize = id.strip_prefix(ID_PREFIX)?.parse().ok()?;
        if n == 0 || n > self.all_count.max(self.featured_count) {
            return None;
        }
        Some(self.build(n))
    }

    /// The first `featured_count` packages carry the featured flag in both sets
    fn build(&self, n: usize) -> Package {
        let template = &TEMPLATES[(n - 1) % TEMPLATES.len()];
        let round = (n - 1) / TEMPLATES.len();
        let title = if round == 0 {
            template.title.to_string()
        } else {
            format!("{} ({})", template.title, round + 1)
        };

        let mut package = Package::new(
            format!("{}{}", ID_PREFIX, n),
            title,
            PackageSource::Fallback,
            self.clock.now(),
        );
        package.description = template.description.to_string();
        package.destination = template.destination.to_string();
        package.country = template.country.to_string();
        package.category = template.category.to_string();
        package.price = Price {
            amount: template.price,
            currency: "EUR".to_string(),
        };
        package.duration = TripDuration {
            days: template.days,
            nights: template.days - 1,
        };
        package.images = Images::default();
        package.rating = Rating {
            average: template.rating,
            count: template.reviews,
        };
        package.features = template.features.iter().map(|f| f.to_string()).collect();
        package.featured = n <= self.featured_count;
        package
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ManualClock;

    fn generator(all_count: usize, featured_count: usize) -> FallbackGenerator {
        FallbackGenerator::new(
            &FallbackConfig {
                all_count,
                featured_count,
            },
            Arc::new(ManualClock::default()),
        )
    }

    #[test]
    fn test_generation_is_deterministic() {
        let generator = generator(12, 6);
        let first = generator.generate(FallbackKind::All);
        let second = generator.generate(FallbackKind::All);

        assert_eq!(first, second);
        assert_eq!(first.len(), 12);
        assert_eq!(first[0].id, "fallback-1");
        assert_eq!(first[11].id, "fallback-12");
        assert!(first.iter().all(|p| p.is_fallback()));
        assert_eq!(first[8].title, "Barcelona Modernista (2)");
    }

    #[test]
    fn test_featured_set_is_a_prefix_of_the_full_set() {
        let generator = generator(12, 3);
        let featured = generator.generate(FallbackKind::Featured);
        let all = generator.generate(FallbackKind::All);

        assert_eq!(featured.len(), 3);
        assert!(featured.iter().all(|p| p.featured));
        assert_eq!(featured[..], all[..3]);
        assert!(!all[3].featured);
    }

    #[test]
    fn test_dataset_covers_spain() {
        let packages = generator(12, 6).generate(FallbackKind::All);
        assert!(packages.iter().filter(|p| p.destination.contains("España")).count() >= 3);
    }

    #[test]
    fn test_find_rebuilds_by_id() {
        let generator = generator(12, 6);
        let all = generator.generate(FallbackKind::All);

        assert_eq!(generator.find("fallback-10").as_ref(), Some(&all[9]));
        assert!(generator.find("fallback-2").unwrap().featured);
        assert!(!generator.find("fallback-7").unwrap().featured);
        assert!(generator.find("fallback-0").is_none());
        assert!(generator.find("fallback-13").is_none());
        assert!(generator.find("fallback-x").is_none());
        assert!(generator.find("42").is_none());
    }
}
