//! Domain models for storefront.

pub mod session;
pub mod subscriber;

pub use session::keys as session_keys;
pub use subscriber::Subscriber;
