//! Prism Storefront library.
//!
//! Session carts priced against the shop catalog, newsletter signup with
//! emailed one-time codes, and a whitelisting proxy in front of the Printful
//! API. The binary in `main.rs` wires these to `PostgreSQL`, SMTP and Sentry;
//! tests build the same router over in-memory stores.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod printful;
pub mod routes;
pub mod services;
pub mod state;

#[cfg(test)]
mod test_support;

use axum::{
    Router,
    body::Body,
    http::{Request, header::InvalidHeaderValue},
};
use tower_http::trace::TraceLayer;
use tower_sessions::{SessionManagerLayer, SessionStore};

use crate::middleware::{RateLimiterLayer, cors_layer, request_id_middleware};
use crate::state::AppState;

/// Build the storefront router with its middleware stack.
///
/// `otp_limiter` guards the newsletter routes; pass `None` to disable it.
///
/// # Errors
///
/// Returns an error if the configured CORS origins are not valid header values.
pub fn app<S>(
    state: AppState,
    sessions: SessionManagerLayer<S>,
    otp_limiter: Option<RateLimiterLayer>,
) -> Result<Router, InvalidHeaderValue>
where
    S: SessionStore + Clone,
{
    let cors = cors_layer(state.config())?;

    let trace = TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
        tracing::info_span!(
            "request",
            method = %request.method(),
            uri = %request.uri(),
            request_id = tracing::field::Empty,
        )
    });

    Ok(routes::routes(otp_limiter)
        .layer(sessions)
        .layer(axum::middleware::from_fn(request_id_middleware))
        .layer(trace)
        .layer(cors)
        .with_state(state)
        // Sentry layers (outermost for full request coverage)
        .layer(sentry_tower::NewSentryLayer::new_from_top())
        .layer(sentry_tower::SentryHttpLayer::new().enable_transaction()))
}
