//! In-memory cart store.
//!
//! A [`Cart`] holds one line per product ID. Lines reference catalog products
//! by ID only; names and prices are read from a [`ProductCatalog`] each time
//! totals are computed, so catalog price changes reach carts that have not
//! been checked out yet.
//!
//! # Line identity
//!
//! Lines are keyed by product ID alone. Adding a product that is already in
//! the cart increments the existing line, even when a different size is
//! passed; the size chosen on the first add is kept. Changing size means
//! removing the line and adding it again.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::catalog::{Product, ProductCatalog};
use crate::types::ProductId;

/// Errors returned by cart mutations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CartError {
    /// Quantities added to a cart must be at least one.
    #[error("quantity must be at least 1")]
    InvalidQuantity,
}

/// A single cart row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    /// Always at least 1.
    pub quantity: u32,
    /// Size chosen when the line was created.
    pub size: Option<String>,
}

/// A cart line joined with its live catalog product.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PricedLine<'a> {
    pub line: &'a CartLine,
    pub product: &'a Product,
}

impl PricedLine<'_> {
    /// `price * quantity` at the current catalog price.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.product.price * Decimal::from(self.line.quantity)
    }
}

/// Session-scoped shopping cart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cart {
    lines: Vec<CartLine>,
}

impl Cart {
    /// Create an empty cart.
    #[must_use]
    pub const fn new() -> Self {
        Self { lines: Vec::new() }
    }

    /// Add `quantity` of a product.
    ///
    /// Increments the existing line for `product.id` if there is one (its size
    /// is left unchanged), otherwise appends a new line with `size`.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::InvalidQuantity`] if `quantity` is zero.
    pub fn add(
        &mut self,
        product: &Product,
        quantity: u32,
        size: Option<String>,
    ) -> Result<(), CartError> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity);
        }

        match self.line_mut(product.id) {
            Some(line) => line.quantity = line.quantity.saturating_add(quantity),
            None => self.lines.push(CartLine {
                product_id: product.id,
                quantity,
                size,
            }),
        }

        Ok(())
    }

    /// Set the quantity of a line.
    ///
    /// A quantity of zero or less removes the line. Unknown product IDs are
    /// ignored.
    pub fn update_quantity(&mut self, product_id: ProductId, quantity: i64) {
        if quantity <= 0 {
            self.remove(product_id);
            return;
        }

        if let Some(line) = self.line_mut(product_id) {
            line.quantity = u32::try_from(quantity).unwrap_or(u32::MAX);
        }
    }

    /// Remove the line for a product. Removing an absent product is a no-op.
    pub fn remove(&mut self, product_id: ProductId) {
        self.lines.retain(|line| line.product_id != product_id);
    }

    /// Remove every line.
    pub fn clear(&mut self) {
        self.lines.clear();
    }

    /// Current lines, in insertion order.
    #[must_use]
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    /// The line for a product, if present.
    #[must_use]
    pub fn line(&self, product_id: ProductId) -> Option<&CartLine> {
        self.lines.iter().find(|line| line.product_id == product_id)
    }

    fn line_mut(&mut self, product_id: ProductId) -> Option<&mut CartLine> {
        self.lines
            .iter_mut()
            .find(|line| line.product_id == product_id)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Sum of quantities over all lines.
    #[must_use]
    pub fn total_items(&self) -> u32 {
        self.lines
            .iter()
            .fold(0_u32, |total, line| total.saturating_add(line.quantity))
    }

    /// Lines joined with their catalog products.
    ///
    /// Lines whose product is no longer in the catalog are skipped.
    pub fn priced_lines<'a, C>(&'a self, catalog: &'a C) -> impl Iterator<Item = PricedLine<'a>>
    where
        C: ProductCatalog + ?Sized,
    {
        self.lines.iter().filter_map(move |line| {
            catalog
                .product(line.product_id)
                .map(|product| PricedLine { line, product })
        })
    }

    /// Sum of quantities over lines the catalog can still price.
    ///
    /// Agrees with [`Cart::priced_lines`] and [`Cart::subtotal`], unlike
    /// [`Cart::total_items`] which counts every stored line.
    #[must_use]
    pub fn priced_items<C>(&self, catalog: &C) -> u32
    where
        C: ProductCatalog + ?Sized,
    {
        self.priced_lines(catalog)
            .fold(0_u32, |total, priced| total.saturating_add(priced.line.quantity))
    }

    /// Sum of `price * quantity` at current catalog prices.
    #[must_use]
    pub fn subtotal<C>(&self, catalog: &C) -> Decimal
    where
        C: ProductCatalog + ?Sized,
    {
        self.priced_lines(catalog)
            .map(|priced| priced.line_total())
            .sum()
    }
}
