//! Product route handlers.
//!
//! Two sources: the local catalog that carts price against, and the
//! fulfillment provider's sync products for the live shop pages.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use prism_core::{CategoryFilter, Product, ProductCatalog, ProductId, SyncProductId};

use crate::error::{AppError, Result};
use crate::printful::{SyncProductDetail, SyncProductSummary};
use crate::state::AppState;

/// Query parameters for product listings.
#[derive(Debug, Default, Deserialize)]
pub struct CategoryQuery {
    pub category: Option<String>,
}

impl CategoryQuery {
    fn filter(&self) -> CategoryFilter {
        CategoryFilter::from_slug(self.category.as_deref())
    }
}

/// Local catalog listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogListing {
    pub category: CategoryFilter,
    pub products: Vec<Product>,
}

/// Provider product listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncProductListing {
    pub category: CategoryFilter,
    pub products: Vec<SyncProductSummary>,
}

/// List local catalog products.
#[instrument(skip(state))]
pub async fn catalog_index(
    State(state): State<AppState>,
    Query(query): Query<CategoryQuery>,
) -> Json<CatalogListing> {
    let category = query.filter();
    let products = state.catalog().filtered(category).cloned().collect();

    Json(CatalogListing { category, products })
}

/// Show one local catalog product.
#[instrument(skip(state))]
pub async fn catalog_show(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<Product>> {
    state
        .catalog()
        .product(id)
        .cloned()
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))
}

/// List provider sync products.
#[instrument(skip(state))]
pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<CategoryQuery>,
) -> Result<Json<SyncProductListing>> {
    let category = query.filter();
    let products = state.printful().sync_products(category).await?;

    tracing::debug!(count = products.len(), category = category.slug(), "Listed sync products");
    Ok(Json(SyncProductListing { category, products }))
}

/// Show one provider sync product with its variants.
#[instrument(skip(state))]
pub async fn show(
    State(state): State<AppState>,
    Path(id): Path<SyncProductId>,
) -> Result<Json<SyncProductDetail>> {
    Ok(Json(state.printful().sync_product(id).await?))
}
