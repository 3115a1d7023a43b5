//! Catalog products and category filtering.
//!
//! The catalog owns product data. Carts hold only product IDs and look the
//! product up again whenever they need a name or a price.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::ProductId;

/// A product offered by the shop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    /// Unit price in the shop currency.
    pub price: Decimal,
    pub category: String,
    #[serde(default)]
    pub description: String,
    /// Sizes a buyer must choose from. Empty for one-size products.
    #[serde(default)]
    pub sizes: Vec<String>,
}

impl Product {
    /// Whether a size must be chosen before the product can be added to a cart.
    #[must_use]
    pub fn requires_size(&self) -> bool {
        !self.sizes.is_empty()
    }

    /// Whether the product is offered in the given size.
    #[must_use]
    pub fn offers_size(&self, size: &str) -> bool {
        self.sizes.iter().any(|s| s == size)
    }
}

/// Read access to products by ID.
pub trait ProductCatalog {
    /// Look up a product by its ID.
    fn product(&self, id: ProductId) -> Option<&Product>;
}

impl ProductCatalog for HashMap<ProductId, Product> {
    fn product(&self, id: ProductId) -> Option<&Product> {
        self.get(&id)
    }
}

impl ProductCatalog for [Product] {
    fn product(&self, id: ProductId) -> Option<&Product> {
        self.iter().find(|p| p.id == id)
    }
}

impl ProductCatalog for Vec<Product> {
    fn product(&self, id: ProductId) -> Option<&Product> {
        self.as_slice().product(id)
    }
}

/// Shop category filter.
///
/// Provider products carry no category field, so categories are matched by
/// keywords in the product name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CategoryFilter {
    #[default]
    All,
    GayPride,
    LesbianPride,
    BisexualPride,
}

impl CategoryFilter {
    /// Every filter, in display order.
    pub const ALL: [Self; 4] = [
        Self::All,
        Self::GayPride,
        Self::LesbianPride,
        Self::BisexualPride,
    ];

    /// Resolve a URL slug. Unknown or missing slugs fall back to [`Self::All`].
    #[must_use]
    pub fn from_slug(slug: Option<&str>) -> Self {
        match slug.map(str::trim) {
            Some("gay-pride") => Self::GayPride,
            Some("lesbian-pride") => Self::LesbianPride,
            Some("bisexual-pride") => Self::BisexualPride,
            _ => Self::All,
        }
    }

    /// URL slug for this filter.
    #[must_use]
    pub const fn slug(self) -> &'static str {
        match self {
            Self::All => "all",
            Self::GayPride => "gay-pride",
            Self::LesbianPride => "lesbian-pride",
            Self::BisexualPride => "bisexual-pride",
        }
    }

    /// Human-readable name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::All => "All",
            Self::GayPride => "Gay Pride",
            Self::LesbianPride => "Lesbian Pride",
            Self::BisexualPride => "Bisexual Pride",
        }
    }

    /// Lower-case keywords matched against product names.
    #[must_use]
    pub const fn keywords(self) -> &'static [&'static str] {
        match self {
            Self::All => &[],
            Self::GayPride => &["gay", "rainbow", "pride"],
            Self::LesbianPride => &["lesbian", "sapphic"],
            Self::BisexualPride => &["bisexual", "bi pride", "bi-pride"],
        }
    }

    /// Whether a product name belongs in this category.
    #[must_use]
    pub fn matches(self, product_name: &str) -> bool {
        if self == Self::All {
            return true;
        }
        let name = product_name.to_lowercase();
        self.keywords().iter().any(|keyword| name.contains(keyword))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tee(id: i64, name: &str, sizes: &[&str]) -> Product {
        Product {
            id: ProductId::new(id),
            name: name.to_string(),
            price: Decimal::new(35, 0),
            category: "T-Shirts".to_string(),
            description: String::new(),
            sizes: sizes.iter().map(ToString::to_string).collect(),
        }
    }

    #[test]
    fn test_slice_lookup() {
        let products = vec![tee(1, "Rainbow Pride Tee", &[]), tee(2, "Bi Pride Tee", &[])];
        assert_eq!(
            products.product(ProductId::new(2)).map(|p| p.name.as_str()),
            Some("Bi Pride Tee")
        );
        assert!(products.product(ProductId::new(3)).is_none());
    }

    #[test]
    fn test_sizes() {
        let sized = tee(1, "Rainbow Pride Tee", &["S", "M"]);
        assert!(sized.requires_size());
        assert!(sized.offers_size("M"));
        assert!(!sized.offers_size("XL"));

        assert!(!tee(2, "Sticker", &[]).requires_size());
    }

    #[test]
    fn test_from_slug_falls_back_to_all() {
        assert_eq!(
            CategoryFilter::from_slug(Some("lesbian-pride")),
            CategoryFilter::LesbianPride
        );
        assert_eq!(CategoryFilter::from_slug(Some("nope")), CategoryFilter::All);
        assert_eq!(CategoryFilter::from_slug(None), CategoryFilter::All);
    }

    #[test]
    fn test_slug_roundtrip() {
        for filter in CategoryFilter::ALL {
            assert_eq!(CategoryFilter::from_slug(Some(filter.slug())), filter);
        }
    }

    #[test]
    fn test_matches_keywords_case_insensitively() {
        assert!(CategoryFilter::GayPride.matches("RAINBOW Hoodie"));
        assert!(CategoryFilter::LesbianPride.matches("Sapphic Sunset Tee"));
        assert!(CategoryFilter::BisexualPride.matches("Bi-Pride Cap"));
        assert!(!CategoryFilter::BisexualPride.matches("Lesbian Pride Tee"));
        assert!(CategoryFilter::All.matches("anything"));
    }
}
