//! HTTP middleware stack for the storefront.
//!
//! # Middleware Order (outermost first)
//!
//! 1. Sentry layers (capture errors, transactions)
//! 2. CORS (answers preflight requests before routing)
//! 3. `TraceLayer` (request tracing)
//! 4. Request ID (add unique ID to each request)
//! 5. Session layer (tower-sessions, carts)
//! 6. Rate limiting on the newsletter routes (governor)

pub mod cors;
pub mod rate_limit;
pub mod request_id;
pub mod session;

pub use cors::cors_layer;
pub use rate_limit::{RateLimiterLayer, otp_rate_limiter};
pub use request_id::request_id_middleware;
pub use session::create_session_layer;
