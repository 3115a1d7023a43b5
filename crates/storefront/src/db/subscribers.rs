//! Subscriber repository for `PostgreSQL`.
//!
//! Each operation is one statement; the upsert relies on the primary key on
//! `email` and verification is a conditional `UPDATE`, so no read-then-write
//! window exists.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;

use prism_core::{Email, OtpCode};

use super::{RepositoryError, SubscriberStore};
use crate::models::Subscriber;

const SELECT_COLUMNS: &str =
    "email, otp_code, otp_expires_at, verified, verified_at, created_at, updated_at";

/// Raw row from `storefront.newsletter_subscriber`.
#[derive(Debug, sqlx::FromRow)]
struct SubscriberRow {
    email: String,
    otp_code: Option<String>,
    otp_expires_at: Option<DateTime<Utc>>,
    verified: bool,
    verified_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SubscriberRow> for Subscriber {
    type Error = RepositoryError;

    fn try_from(row: SubscriberRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;
        let otp_code = row
            .otp_code
            .as_deref()
            .map(OtpCode::parse)
            .transpose()
            .map_err(|e| {
                RepositoryError::DataCorruption(format!("invalid otp code in database: {e}"))
            })?;

        Ok(Self {
            email,
            otp_code,
            otp_expires_at: row.otp_expires_at,
            verified: row.verified,
            verified_at: row.verified_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// `PostgreSQL`-backed subscriber store.
#[derive(Debug, Clone)]
pub struct PgSubscriberStore {
    pool: PgPool,
}

impl PgSubscriberStore {
    /// Create a new subscriber store.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SubscriberStore for PgSubscriberStore {
    async fn find(&self, email: &Email) -> Result<Option<Subscriber>, RepositoryError> {
        let row = sqlx::query_as::<_, SubscriberRow>(&format!(
            "SELECT {SELECT_COLUMNS} FROM storefront.newsletter_subscriber WHERE email = $1"
        ))
        .bind(email.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Subscriber::try_from).transpose()
    }

    async fn upsert_code(
        &self,
        email: &Email,
        code: &OtpCode,
        expires_at: DateTime<Utc>,
    ) -> Result<Subscriber, RepositoryError> {
        let row = sqlx::query_as::<_, SubscriberRow>(&format!(
            r"
            INSERT INTO storefront.newsletter_subscriber (email, otp_code, otp_expires_at, verified)
            VALUES ($1, $2, $3, FALSE)
            ON CONFLICT (email) DO UPDATE
               SET otp_code = EXCLUDED.otp_code,
                   otp_expires_at = EXCLUDED.otp_expires_at,
                   verified = FALSE,
                   updated_at = NOW()
            RETURNING {SELECT_COLUMNS}
            "
        ))
        .bind(email.as_str())
        .bind(code.as_str())
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await?;

        Subscriber::try_from(row)
    }

    async fn mark_verified(
        &self,
        email: &Email,
        code: &OtpCode,
        verified_at: DateTime<Utc>,
    ) -> Result<Option<Subscriber>, RepositoryError> {
        let row = sqlx::query_as::<_, SubscriberRow>(&format!(
            r"
            UPDATE storefront.newsletter_subscriber
               SET verified = TRUE,
                   verified_at = $3,
                   otp_code = NULL,
                   otp_expires_at = NULL,
                   updated_at = NOW()
             WHERE email = $1
               AND verified = FALSE
               AND otp_code = $2
            RETURNING {SELECT_COLUMNS}
            "
        ))
        .bind(email.as_str())
        .bind(code.as_str())
        .bind(verified_at)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Subscriber::try_from).transpose()
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::path::Path;

    use chrono::{SubsecRound, TimeDelta};
    use sqlx::migrate::Migrator;

    use super::*;

    /// Connect to `STOREFRONT_DATABASE_URL` and bring the schema up to date.
    async fn migrated_store() -> PgSubscriberStore {
        let url = std::env::var("STOREFRONT_DATABASE_URL")
            .expect("STOREFRONT_DATABASE_URL must point at a scratch database");
        let pool = PgPool::connect(&url).await.unwrap();
        Migrator::new(Path::new(concat!(env!("CARGO_MANIFEST_DIR"), "/migrations")))
            .await
            .unwrap()
            .run(&pool)
            .await
            .unwrap();
        PgSubscriberStore::new(pool)
    }

    async fn fresh_email(store: &PgSubscriberStore, address: &str) -> Email {
        let email = Email::parse(address).unwrap();
        sqlx::query("DELETE FROM storefront.newsletter_subscriber WHERE email = $1")
            .bind(email.as_str())
            .execute(&store.pool)
            .await
            .unwrap();
        email
    }

    fn code(digits: &str) -> OtpCode {
        OtpCode::parse(digits).unwrap()
    }

    #[tokio::test]
    #[ignore = "Requires PostgreSQL at STOREFRONT_DATABASE_URL"]
    async fn test_upsert_overwrites_code_and_resets_verified() {
        let store = migrated_store().await;
        let email = fresh_email(&store, "upsert@prism.test").await;
        // Postgres keeps microseconds.
        let now = Utc::now().trunc_subsecs(6);

        let first = store
            .upsert_code(&email, &code("111111"), now + TimeDelta::minutes(10))
            .await
            .unwrap();
        assert!(!first.verified);
        assert_eq!(first.otp_code, Some(code("111111")));

        store
            .mark_verified(&email, &code("111111"), now)
            .await
            .unwrap()
            .unwrap();

        let second = store
            .upsert_code(&email, &code("222222"), now + TimeDelta::minutes(20))
            .await
            .unwrap();
        assert!(!second.verified);
        assert_eq!(second.otp_code, Some(code("222222")));
        assert_eq!(second.otp_expires_at, Some(now + TimeDelta::minutes(20)));
        assert_eq!(second.created_at, first.created_at);

        let stored = store.find(&email).await.unwrap().unwrap();
        assert_eq!(stored.otp_code, Some(code("222222")));
        assert!(!stored.verified);
    }

    #[tokio::test]
    #[ignore = "Requires PostgreSQL at STOREFRONT_DATABASE_URL"]
    async fn test_mark_verified_commits_once() {
        let store = migrated_store().await;
        let email = fresh_email(&store, "verify-once@prism.test").await;
        let now = Utc::now().trunc_subsecs(6);
        store
            .upsert_code(&email, &code("482913"), now + TimeDelta::minutes(10))
            .await
            .unwrap();

        let verified = store
            .mark_verified(&email, &code("482913"), now)
            .await
            .unwrap()
            .expect("first verify commits");
        assert!(verified.verified);
        assert_eq!(verified.verified_at, Some(now));
        assert_eq!(verified.otp_code, None);
        assert_eq!(verified.otp_expires_at, None);

        let replay = store
            .mark_verified(&email, &code("482913"), now)
            .await
            .unwrap();
        assert!(replay.is_none());
    }

    #[tokio::test]
    #[ignore = "Requires PostgreSQL at STOREFRONT_DATABASE_URL"]
    async fn test_mark_verified_rejects_superseded_code() {
        let store = migrated_store().await;
        let email = fresh_email(&store, "superseded@prism.test").await;
        let now = Utc::now().trunc_subsecs(6);
        store
            .upsert_code(&email, &code("111111"), now + TimeDelta::minutes(10))
            .await
            .unwrap();
        store
            .upsert_code(&email, &code("222222"), now + TimeDelta::minutes(10))
            .await
            .unwrap();

        let stale = store
            .mark_verified(&email, &code("111111"), now)
            .await
            .unwrap();
        assert!(stale.is_none());

        let unknown = Email::parse("nobody@prism.test").unwrap();
        let missing = store.mark_verified(&unknown, &code("111111"), now).await.unwrap();
        assert!(missing.is_none());

        let stored = store.find(&email).await.unwrap().unwrap();
        assert!(!stored.verified);
        assert_eq!(stored.otp_code, Some(code("222222")));
    }
}
