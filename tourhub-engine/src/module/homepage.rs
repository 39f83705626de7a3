//! Homepage card formatting

use tourhub_common::{ContactInfo, DisplayPackage, Package, Price, TripDuration};

use crate::config::HomepageConfig;

/// Turns ranked packages into display cards
pub struct HomepageFormatter {
    contact: ContactInfo,
    detail_url_base: String,
}

impl HomepageFormatter {
    pub fn new(config: &HomepageConfig) -> Self {
        Self {
            contact: ContactInfo {
                phone: config.contact_phone.clone(),
                email: config.contact_email.clone(),
                whatsapp: config.contact_whatsapp.clone(),
            },
            detail_url_base: config.detail_url_base.trim_end_matches('/').to_string(),
        }
    }

    pub fn format(&self, package: &Package) -> DisplayPackage {
        DisplayPackage {
            id: package.id.clone(),
            title: package.title.clone(),
            destination: package.destination.clone(),
            country: package.country.clone(),
            category: package.category.clone(),
            image: package.images.main.clone(),
            price_label: price_label(&package.price),
            duration_label: duration_label(&package.duration),
            rating: package.rating,
            features: package.features.clone(),
            contact: self.contact.clone(),
            detail_url: format!("{}/{}", self.detail_url_base, urlencoding::encode(&package.id)),
            source: package.source(),
        }
    }

    pub fn format_all(&self, packages: &[Package]) -> Vec<DisplayPackage> {
        packages.iter().map(|p| self.format(p)).collect()
    }
}

fn currency_symbol(code: &str) -> &str {
    match code {
        "EUR" => "€",
        "USD" => "US$",
        "MXN" => "MX$",
        "GBP" => "£",
        other => other,
    }
}

/// `1.290 €`, `899,50 €`; zero means the price is on request
pub fn price_label(price: &Price) -> String {
    if price.amount <= 0.0 {
        return "Precio a consultar".to_string();
    }

    let cents = (price.amount * 100.0).round() as u64;
    let whole = group_thousands(cents / 100);
    let fraction = cents % 100;
    let symbol = currency_symbol(&price.currency);

    if fraction == 0 {
        format!("{} {}", whole, symbol)
    } else {
        format!("{},{:02} {}", whole, fraction, symbol)
    }
}

fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }
    grouped
}

/// `8 días / 7 noches`
pub fn duration_label(duration: &TripDuration) -> String {
    let days = match duration.days {
        0 => return "Duración a consultar".to_string(),
        1 => "1 día".to_string(),
        n => format!("{} días", n),
    };
    match duration.nights {
        0 => days,
        1 => format!("{} / 1 noche", days),
        n => format!("{} / {} noches", days, n),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tourhub_common::PackageSource;

    fn price(amount: f64, currency: &str) -> Price {
        Price {
            amount,
            currency: currency.into(),
        }
    }

    #[test]
    fn test_price_label() {
        assert_eq!(price_label(&price(1290.0, "EUR")), "1.290 €");
        assert_eq!(price_label(&price(899.5, "EUR")), "899,50 €");
        assert_eq!(price_label(&price(1234567.0, "USD")), "1.234.567 US$");
        assert_eq!(price_label(&price(45.0, "CHF")), "45 CHF");
        assert_eq!(price_label(&price(0.0, "EUR")), "Precio a consultar");
    }

    #[test]
    fn test_duration_label() {
        assert_eq!(duration_label(&TripDuration { days: 8, nights: 7 }), "8 días / 7 noches");
        assert_eq!(duration_label(&TripDuration { days: 2, nights: 1 }), "2 días / 1 noche");
        assert_eq!(duration_label(&TripDuration { days: 1, nights: 0 }), "1 día");
        assert_eq!(duration_label(&TripDuration { days: 0, nights: 0 }), "Duración a consultar");
    }

    #[test]
    fn test_card_carries_contact_and_detail_url() {
        let config = HomepageConfig {
            detail_url_base: "/paquetes/".into(),
            contact_phone: "+34 900 000 000".into(),
            contact_whatsapp: "+34 600 000 000".into(),
            ..Default::default()
        };
        let formatter = HomepageFormatter::new(&config);

        let mut package = Package::new("fallback-3", "Andalucía Esencial", PackageSource::Fallback, Utc::now());
        package.price = price(890.0, "EUR");
        package.duration = TripDuration { days: 7, nights: 6 };

        let card = formatter.format(&package);
        assert_eq!(card.detail_url, "/paquetes/fallback-3");
        assert_eq!(card.price_label, "890 €");
        assert_eq!(card.duration_label, "7 días / 6 noches");
        assert_eq!(card.contact.phone, "+34 900 000 000");
        assert_eq!(card.source, PackageSource::Fallback);
    }
}
