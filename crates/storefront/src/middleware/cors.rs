//! CORS policy for browser clients on other origins.

use axum::http::{HeaderName, HeaderValue, Method, header};
use axum::http::header::InvalidHeaderValue;
use tower_http::cors::{AllowOrigin, CorsLayer};

use crate::config::StorefrontConfig;

/// Request headers browser clients may send.
pub const ALLOWED_HEADERS: [HeaderName; 4] = [
    header::AUTHORIZATION,
    HeaderName::from_static("x-client-info"),
    HeaderName::from_static("apikey"),
    header::CONTENT_TYPE,
];

/// Build the CORS layer from `CORS_ALLOW_ORIGIN`.
///
/// `*` allows any origin; otherwise the value is a comma-separated list of
/// exact origins.
///
/// # Errors
///
/// Returns an error if an origin is not a valid header value.
pub fn cors_layer(config: &StorefrontConfig) -> Result<CorsLayer, InvalidHeaderValue> {
    let raw = config.cors_allow_origin.trim();
    let origin = if raw == "*" {
        AllowOrigin::any()
    } else {
        let origins = raw
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(HeaderValue::from_str)
            .collect::<Result<Vec<_>, _>>()?;
        AllowOrigin::list(origins)
    };

    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(ALLOWED_HEADERS))
}
