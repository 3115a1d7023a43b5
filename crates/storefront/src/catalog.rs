//! The shop's own product catalog.
//!
//! Carts are priced against this catalog. Provider sync products are served
//! separately through the Printful client.

use rust_decimal::Decimal;

use prism_core::{CategoryFilter, Product, ProductCatalog, ProductId};

const TEE_SIZES: [&str; 6] = ["XS", "S", "M", "L", "XL", "2XL"];

/// Products available for the cart, in display order.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    products: Vec<Product>,
}

impl Catalog {
    #[must_use]
    pub const fn new(products: Vec<Product>) -> Self {
        Self { products }
    }

    /// The launch collection.
    #[must_use]
    pub fn seeded() -> Self {
        let tee = |id: i64, name: &str, price: i64, description: &str| Product {
            id: ProductId::new(id),
            name: name.to_string(),
            price: Decimal::new(price, 0),
            category: "T-Shirts".to_string(),
            description: description.to_string(),
            sizes: TEE_SIZES.iter().map(ToString::to_string).collect(),
        };

        Self::new(vec![
            tee(
                1,
                "Rainbow Pride Tee",
                35,
                "Classic black t-shirt featuring rainbow pride design. Made from 100% organic cotton for ultimate comfort.",
            ),
            tee(
                2,
                "Love is Love Tee",
                32,
                "Bold statement black tee celebrating love in all forms. Soft cotton blend with modern fit.",
            ),
            tee(
                3,
                "Bi Pride Tee",
                35,
                "Represent bisexual pride with this sleek black tee. Premium quality fabric that lasts.",
            ),
            tee(
                4,
                "Lesbian Pride Tee",
                35,
                "Celebrate sapphic love with our signature black tee. Comfortable everyday wear.",
            ),
            tee(
                5,
                "Pride Heart Tee",
                30,
                "Minimalist pride heart design on classic black. Perfect for subtle everyday pride.",
            ),
            tee(
                6,
                "Born This Way Tee",
                38,
                "Express your authentic self with this iconic message tee. Premium heavyweight cotton.",
            ),
        ])
    }

    #[must_use]
    pub fn products(&self) -> &[Product] {
        &self.products
    }

    /// Products whose name matches `category`.
    pub fn filtered(&self, category: CategoryFilter) -> impl Iterator<Item = &Product> {
        self.products
            .iter()
            .filter(move |product| category.matches(&product.name))
    }
}

impl ProductCatalog for Catalog {
    fn product(&self, id: ProductId) -> Option<&Product> {
        self.products.product(id)
    }
}
