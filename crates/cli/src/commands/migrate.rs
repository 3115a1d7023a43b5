//! Database migration commands.
//!
//! # Environment Variables
//!
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string for storefront
//!   (falls back to `DATABASE_URL`)
//!
//! # Migration Files
//!
//! Storefront migrations: `crates/storefront/migrations/`
//!
//! ```text
//! migrations/
//! ├── 20260601000001_create_newsletter_subscribers.sql
//! └── 20260601000002_create_sessions.sql
//! ```

use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use sqlx::PgPool;
use sqlx::migrate::Migrator;
use thiserror::Error;

/// Storefront migrations shipped with the workspace.
const STOREFRONT_MIGRATIONS: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/../storefront/migrations");

/// Errors that can occur while migrating.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Run storefront database migrations.
///
/// # Errors
///
/// Returns an error if the database URL is missing, the connection fails, or
/// a migration fails to apply.
pub async fn storefront(dir: Option<PathBuf>) -> Result<(), MigrationError> {
    dotenvy::dotenv().ok();

    let database_url = database_url(|key| std::env::var(key).ok())?;
    let dir = dir.unwrap_or_else(|| PathBuf::from(STOREFRONT_MIGRATIONS));

    tracing::info!("Connecting to storefront database...");
    let pool = PgPool::connect(database_url.expose_secret()).await?;

    run(&pool, &dir).await?;

    tracing::info!("Storefront migrations complete!");
    Ok(())
}

async fn run(pool: &PgPool, dir: &Path) -> Result<(), MigrationError> {
    let migrator = Migrator::new(dir).await?;
    tracing::info!(
        dir = %dir.display(),
        count = migrator.iter().count(),
        "Running storefront migrations..."
    );
    migrator.run(pool).await?;
    Ok(())
}

fn database_url<F>(lookup: F) -> Result<SecretString, MigrationError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup("STOREFRONT_DATABASE_URL")
        .or_else(|| lookup("DATABASE_URL"))
        .filter(|url| !url.is_empty())
        .map(SecretString::from)
        .ok_or(MigrationError::MissingEnvVar("STOREFRONT_DATABASE_URL"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_database_url_prefers_storefront_var() {
        let url = database_url(|key| match key {
            "STOREFRONT_DATABASE_URL" => Some("postgres://a".to_string()),
            "DATABASE_URL" => Some("postgres://b".to_string()),
            _ => None,
        })
        .unwrap();
        assert_eq!(url.expose_secret(), "postgres://a");
    }

    #[test]
    fn test_database_url_falls_back() {
        let url = database_url(|key| (key == "DATABASE_URL").then(|| "postgres://b".to_string()))
            .unwrap();
        assert_eq!(url.expose_secret(), "postgres://b");
    }

    #[test]
    fn test_database_url_missing() {
        let err = database_url(|_| None).unwrap_err();
        assert!(matches!(err, MigrationError::MissingEnvVar("STOREFRONT_DATABASE_URL")));
    }

    #[tokio::test]
    async fn test_bundled_migrations_resolve() {
        let migrator = Migrator::new(Path::new(STOREFRONT_MIGRATIONS)).await.unwrap();
        assert_eq!(migrator.iter().count(), 2);
    }
}
