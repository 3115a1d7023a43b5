//! HTTP route handlers for the storefront.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                         - Liveness
//! GET  /health/ready                   - Readiness (subscriber store ping)
//!
//! # Catalog
//! GET  /api/catalog                    - Local catalog (?category=)
//! GET  /api/catalog/{id}               - Local catalog product
//! GET  /api/products                   - Provider sync products (?category=)
//! GET  /api/products/{id}              - Provider sync product with variants
//!
//! # Cart (session)
//! GET  /cart                           - Cart contents and totals
//! POST /cart/add                       - Add a product
//! POST /cart/update                    - Set a line's quantity
//! POST /cart/remove                    - Remove a line
//! GET  /cart/count                     - Item count badge
//!
//! # Newsletter (rate limited)
//! POST /api/newsletter/send-otp        - Issue a verification code
//! POST /api/newsletter/resend-otp      - Issue a replacement code
//! POST /api/newsletter/verify-otp      - Verify a code
//!
//! # Fulfillment proxy
//! POST /api/printful                   - Forward a whitelisted action
//! ```

pub mod cart;
pub mod health;
pub mod newsletter;
pub mod printful;
pub mod products;

use axum::{
    Router,
    extract::FromRequest,
    routing::{get, post},
};

use crate::error::AppError;
use crate::middleware::RateLimiterLayer;
use crate::state::AppState;

/// JSON body extractor whose rejections render as `{ "error": ... }`.
#[derive(Debug, FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Create the health routes router.
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(health::live))
        .route("/ready", get(health::ready))
}

/// Create the catalog routes router.
pub fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::catalog_index))
        .route("/{id}", get(products::catalog_show))
}

/// Create the provider product routes router.
pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(products::index))
        .route("/{id}", get(products::show))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(cart::show))
        .route("/add", post(cart::add))
        .route("/update", post(cart::update))
        .route("/remove", post(cart::remove))
        .route("/count", get(cart::count))
}

/// Create the newsletter routes router.
pub fn newsletter_routes() -> Router<AppState> {
    Router::new()
        .route("/send-otp", post(newsletter::send_otp))
        .route("/resend-otp", post(newsletter::resend_otp))
        .route("/verify-otp", post(newsletter::verify_otp))
}

/// Create all routes for the storefront.
///
/// `otp_limiter` is applied to the newsletter routes only.
pub fn routes(otp_limiter: Option<RateLimiterLayer>) -> Router<AppState> {
    let newsletter = match otp_limiter {
        Some(limiter) => newsletter_routes().layer(limiter),
        None => newsletter_routes(),
    };

    Router::new()
        .nest("/health", health_routes())
        .nest("/api/catalog", catalog_routes())
        .nest("/api/products", product_routes())
        .nest("/cart", cart_routes())
        .nest("/api/newsletter", newsletter)
        .route("/api/printful", post(printful::proxy))
}
