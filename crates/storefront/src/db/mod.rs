//! Persistence for storefront data.
//!
//! # Database: `prism_storefront`
//!
//! The fulfillment provider is the source of truth for products and orders;
//! the local database only stores what the shop owns:
//!
//! ## Tables
//!
//! - `storefront.newsletter_subscriber` - Newsletter members and outstanding codes
//! - `tower_sessions.session` - Session storage (carts)
//!
//! # Migrations
//!
//! Migrations are stored in `crates/storefront/migrations/` and run via:
//! ```bash
//! cargo run -p prism-cli -- migrate storefront
//! ```
//!
//! # Stores
//!
//! [`SubscriberStore`] is the seam the OTP service talks to. The `PostgreSQL`
//! implementation backs production; [`MemorySubscriberStore`] serves tests.

pub mod memory;
pub mod subscribers;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

use prism_core::{Email, OtpCode};

use crate::models::Subscriber;

pub use memory::MemorySubscriberStore;
pub use subscribers::PgSubscriberStore;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),
}

/// Storage for newsletter subscriber records, keyed by email.
///
/// Every write is a single atomic operation so concurrent requests for the
/// same email never lose an update.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait SubscriberStore: Send + Sync {
    /// Fetch the record for an email.
    async fn find(&self, email: &Email) -> Result<Option<Subscriber>, RepositoryError>;

    /// Insert or overwrite the outstanding code for an email.
    ///
    /// Sets `otp_code` and `otp_expires_at` and resets `verified` to false.
    /// Concurrent calls resolve last-write-wins.
    async fn upsert_code(
        &self,
        email: &Email,
        code: &OtpCode,
        expires_at: DateTime<Utc>,
    ) -> Result<Subscriber, RepositoryError>;

    /// Mark an email verified if, and only if, it is still unverified and its
    /// outstanding code is `code`.
    ///
    /// Clears the code and expiry in the same write. Returns `None` when the
    /// condition did not hold (the code was replaced or already consumed).
    async fn mark_verified(
        &self,
        email: &Email,
        code: &OtpCode,
        verified_at: DateTime<Utc>,
    ) -> Result<Option<Subscriber>, RepositoryError>;

    /// Check that the store is reachable.
    async fn ping(&self) -> Result<(), RepositoryError>;
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
