//! Cart route handlers.
//!
//! The cart lives in the visitor's session. Every mutation loads it, applies
//! the change, and writes it back; concurrent tabs resolve last write wins.
//! Names and prices are read from the catalog on every response.

use axum::{Json, extract::State};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use prism_core::{Cart, CurrencyCode, Price, ProductCatalog, ProductId};

use super::ApiJson;
use crate::error::{AppError, Result, add_breadcrumb};
use crate::models::session_keys;
use crate::state::AppState;

/// One priced cart line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItemView {
    pub product_id: ProductId,
    pub name: String,
    pub size: Option<String>,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub line_total: Decimal,
}

/// Cart response body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartView {
    pub items: Vec<CartItemView>,
    pub subtotal: Decimal,
    /// Subtotal formatted for display, e.g. `$70.00`.
    pub subtotal_display: String,
    /// Quantity over `items`; lines whose product left the catalog are not counted.
    pub total_items: u32,
}

impl CartView {
    fn new<C: ProductCatalog + ?Sized>(cart: &Cart, catalog: &C) -> Self {
        let items = cart
            .priced_lines(catalog)
            .map(|priced| CartItemView {
                product_id: priced.line.product_id,
                name: priced.product.name.clone(),
                size: priced.line.size.clone(),
                quantity: priced.line.quantity,
                unit_price: priced.product.price,
                line_total: priced.line_total(),
            })
            .collect();
        let subtotal = cart.subtotal(catalog);

        Self {
            items,
            subtotal,
            subtotal_display: Price::new(subtotal, CurrencyCode::USD).display(),
            total_items: cart.priced_items(catalog),
        }
    }
}

/// Cart count badge body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartCount {
    pub count: u32,
}

#[derive(Debug, Deserialize)]
pub struct AddToCartRequest {
    pub product_id: ProductId,
    pub quantity: Option<u32>,
    pub size: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateCartRequest {
    pub product_id: ProductId,
    pub quantity: i64,
}

#[derive(Debug, Deserialize)]
pub struct RemoveFromCartRequest {
    pub product_id: ProductId,
}

// =============================================================================
// Session Helpers
// =============================================================================

async fn load_cart(session: &Session) -> Result<Cart> {
    Ok(session
        .get::<Cart>(session_keys::CART)
        .await?
        .unwrap_or_default())
}

async fn save_cart(session: &Session, cart: &Cart) -> Result<()> {
    session.insert(session_keys::CART, cart).await?;
    Ok(())
}

// =============================================================================
// Handlers
// =============================================================================

/// Display the cart.
#[instrument(skip(state, session))]
pub async fn show(State(state): State<AppState>, session: Session) -> Result<Json<CartView>> {
    let cart = load_cart(&session).await?;
    Ok(Json(CartView::new(&cart, state.catalog())))
}

/// Add a product to the cart.
///
/// Quantity defaults to 1. Sized products need a size they are offered in.
#[instrument(skip(state, session))]
pub async fn add(
    State(state): State<AppState>,
    session: Session,
    ApiJson(request): ApiJson<AddToCartRequest>,
) -> Result<Json<CartView>> {
    let catalog = state.catalog();
    let product = catalog
        .product(request.product_id)
        .ok_or_else(|| AppError::NotFound("Product not found".to_string()))?;

    let size = if product.requires_size() {
        match request.size {
            Some(size) if product.offers_size(&size) => Some(size),
            _ => return Err(AppError::BadRequest("Please select a size".to_string())),
        }
    } else {
        None
    };

    let mut cart = load_cart(&session).await?;
    cart.add(product, request.quantity.unwrap_or(1), size)?;
    save_cart(&session, &cart).await?;

    let product_id = product.id.to_string();
    add_breadcrumb(
        "cart",
        "Added to cart",
        Some(&[("product_id", product_id.as_str())]),
    );
    tracing::info!(
        product_id = %product.id,
        total_items = cart.priced_items(catalog),
        "Added to cart"
    );

    Ok(Json(CartView::new(&cart, catalog)))
}

/// Set the quantity of a cart line. Zero or less removes it.
#[instrument(skip(state, session))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    ApiJson(request): ApiJson<UpdateCartRequest>,
) -> Result<Json<CartView>> {
    let mut cart = load_cart(&session).await?;
    cart.update_quantity(request.product_id, request.quantity);
    save_cart(&session, &cart).await?;

    Ok(Json(CartView::new(&cart, state.catalog())))
}

/// Remove a line from the cart.
#[instrument(skip(state, session))]
pub async fn remove(
    State(state): State<AppState>,
    session: Session,
    ApiJson(request): ApiJson<RemoveFromCartRequest>,
) -> Result<Json<CartView>> {
    let mut cart = load_cart(&session).await?;
    cart.remove(request.product_id);
    save_cart(&session, &cart).await?;

    Ok(Json(CartView::new(&cart, state.catalog())))
}

/// Get the cart item count, matching `total_items` in the cart view.
#[instrument(skip(state, session))]
pub async fn count(State(state): State<AppState>, session: Session) -> Result<Json<CartCount>> {
    let cart = load_cart(&session).await?;
    Ok(Json(CartCount {
        count: cart.priced_items(state.catalog()),
    }))
}
