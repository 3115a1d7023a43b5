//! Storefront configuration loaded from environment variables.
//!
//! # Environment Variables
//!
//! ## Required
//! - `STOREFRONT_DATABASE_URL` - `PostgreSQL` connection string (falls back to `DATABASE_URL`)
//! - `PRINTFUL_API_KEY` - Printful private token (placeholder and entropy checked)
//!
//! ## Optional
//! - `STOREFRONT_HOST` - Bind address (default: 127.0.0.1)
//! - `STOREFRONT_PORT` - Listen port (default: 3000)
//! - `STOREFRONT_BASE_URL` - Public URL (default: `http://localhost:3000`)
//! - `CORS_ALLOW_ORIGIN` - Allowed browser origin (default: `*`)
//! - `PRINTFUL_API_URL` - Provider base URL (default: `https://api.printful.com`)
//! - `PRINTFUL_TIMEOUT_SECS` - Provider request timeout (default: 15)
//! - `PRINTFUL_STORE_ID_TTL_SECS` - Re-resolve the store ID after this long (default: never)
//! - `OTP_TTL_MINUTES` - Verification code lifetime (default: 10)
//! - `SMTP_HOST`, `SMTP_PORT` (587), `SMTP_USERNAME`, `SMTP_PASSWORD`, `EMAIL_FROM` -
//!   outgoing mail. When `SMTP_HOST` is unset, mail is logged instead of sent.
//! - `SMTP_TIMEOUT_SECS` - SMTP command timeout (default: 10)
//! - `SENTRY_DSN`, `SENTRY_ENVIRONMENT`, `SENTRY_SAMPLE_RATE`, `SENTRY_TRACES_SAMPLE_RATE`

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;
use url::Url;

const MIN_ENTROPY_BITS_PER_CHAR: f64 = 3.3;

const DEFAULT_PRINTFUL_API_URL: &str = "https://api.printful.com";

/// Blocklist of common placeholder patterns (case-insensitive)
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "your-",
    "changeme",
    "replace",
    "placeholder",
    "example",
    "secret",
    "password",
    "xxx",
    "todo",
    "fixme",
    "insert",
    "enter-",
    "put-your",
    "add-your",
];

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("Insecure secret in {0}: {1}")]
    InsecureSecret(String, String),
}

/// Storefront application configuration.
#[derive(Debug, Clone)]
pub struct StorefrontConfig {
    /// `PostgreSQL` database connection URL (contains password)
    pub database_url: SecretString,
    /// IP address to bind the server to
    pub host: IpAddr,
    /// Port to listen on
    pub port: u16,
    /// Public base URL for the storefront
    pub base_url: String,
    /// Value of `Access-Control-Allow-Origin` (`*` for any)
    pub cors_allow_origin: String,
    /// Fulfillment provider configuration
    pub printful: PrintfulConfig,
    /// Verification code settings
    pub otp: OtpConfig,
    /// Outgoing mail. `None` logs messages instead of sending them.
    pub email: Option<EmailConfig>,
    /// Sentry DSN for error tracking
    pub sentry_dsn: Option<String>,
    /// Sentry environment tag (e.g. production, staging)
    pub sentry_environment: Option<String>,
    /// Fraction of error events sent to Sentry
    pub sentry_sample_rate: f32,
    /// Fraction of transactions traced in Sentry
    pub sentry_traces_sample_rate: f32,
}

/// Printful API configuration.
#[derive(Debug, Clone)]
pub struct PrintfulConfig {
    /// Private API token
    pub api_key: SecretString,
    /// API base URL, without trailing slash
    pub api_url: Url,
    /// Per-request timeout
    pub timeout: Duration,
    /// How long a resolved store ID is reused. `None` keeps it for the process lifetime.
    pub store_id_ttl: Option<Duration>,
}

/// Verification code settings.
#[derive(Debug, Clone, Copy)]
pub struct OtpConfig {
    /// How long an issued code stays valid
    pub ttl: chrono::TimeDelta,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            ttl: chrono::TimeDelta::minutes(10),
        }
    }
}

/// SMTP configuration.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: SecretString,
    /// Sender mailbox, e.g. `Newsletter <hello@example.org>`
    pub from_address: String,
    pub timeout: Duration,
}

impl StorefrontConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if required variables are missing, invalid, or
    /// if secrets fail validation (placeholder detection, entropy check).
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// Same as [`Self::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = Env(lookup);

        let database_url = env
            .optional("STOREFRONT_DATABASE_URL")
            .or_else(|| env.optional("DATABASE_URL"))
            .map(SecretString::from)
            .ok_or_else(|| ConfigError::MissingEnvVar("STOREFRONT_DATABASE_URL".to_string()))?;

        Ok(Self {
            database_url,
            host: env.parse_or("STOREFRONT_HOST", IpAddr::from([127, 0, 0, 1]))?,
            port: env.parse_or("STOREFRONT_PORT", 3000)?,
            base_url: env.or_default("STOREFRONT_BASE_URL", "http://localhost:3000"),
            cors_allow_origin: env.or_default("CORS_ALLOW_ORIGIN", "*"),
            printful: PrintfulConfig::from_env(&env)?,
            otp: OtpConfig::from_env(&env)?,
            email: EmailConfig::from_env(&env)?,
            sentry_dsn: env.optional("SENTRY_DSN"),
            sentry_environment: env.optional("SENTRY_ENVIRONMENT"),
            sentry_sample_rate: env.parse_or("SENTRY_SAMPLE_RATE", 1.0)?,
            sentry_traces_sample_rate: env.parse_or("SENTRY_TRACES_SAMPLE_RATE", 0.1)?,
        })
    }

    /// Returns the socket address for binding the server.
    #[must_use]
    pub const fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    /// Whether cookies should carry the `Secure` attribute.
    #[must_use]
    pub fn is_https(&self) -> bool {
        self.base_url.starts_with("https://")
    }
}

impl PrintfulConfig {
    fn from_env<F: Fn(&str) -> Option<String>>(env: &Env<F>) -> Result<Self, ConfigError> {
        let raw_url = env.or_default("PRINTFUL_API_URL", DEFAULT_PRINTFUL_API_URL);
        let api_url = Url::parse(raw_url.trim_end_matches('/'))
            .map_err(|e| ConfigError::InvalidEnvVar("PRINTFUL_API_URL".to_string(), e.to_string()))?;

        let store_id_ttl = env
            .optional("PRINTFUL_STORE_ID_TTL_SECS")
            .map(|raw| {
                raw.parse::<u64>().map_err(|e| {
                    ConfigError::InvalidEnvVar(
                        "PRINTFUL_STORE_ID_TTL_SECS".to_string(),
                        e.to_string(),
                    )
                })
            })
            .transpose()?
            .map(Duration::from_secs);

        Ok(Self {
            api_key: env.validated_secret("PRINTFUL_API_KEY")?,
            api_url,
            timeout: Duration::from_secs(env.parse_or("PRINTFUL_TIMEOUT_SECS", 15)?),
            store_id_ttl,
        })
    }
}

impl OtpConfig {
    fn from_env<F: Fn(&str) -> Option<String>>(env: &Env<F>) -> Result<Self, ConfigError> {
        let minutes: u32 = env.parse_or("OTP_TTL_MINUTES", 10)?;
        if minutes == 0 {
            return Err(ConfigError::InvalidEnvVar(
                "OTP_TTL_MINUTES".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            ttl: chrono::TimeDelta::minutes(i64::from(minutes)),
        })
    }
}

impl EmailConfig {
    fn from_env<F: Fn(&str) -> Option<String>>(env: &Env<F>) -> Result<Option<Self>, ConfigError> {
        let Some(smtp_host) = env.optional("SMTP_HOST") else {
            return Ok(None);
        };

        Ok(Some(Self {
            smtp_host,
            smtp_port: env.parse_or("SMTP_PORT", 587)?,
            smtp_username: env.required("SMTP_USERNAME")?,
            smtp_password: SecretString::from(env.required("SMTP_PASSWORD")?),
            from_address: env.required("EMAIL_FROM")?,
            timeout: Duration::from_secs(env.parse_or("SMTP_TIMEOUT_SECS", 10)?),
        }))
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Variable source with typed accessors.
struct Env<F>(F);

impl<F: Fn(&str) -> Option<String>> Env<F> {
    /// Get an optional variable. Empty values count as unset.
    fn optional(&self, key: &str) -> Option<String> {
        (self.0)(key).filter(|value| !value.trim().is_empty())
    }

    /// Get a required variable.
    fn required(&self, key: &str) -> Result<String, ConfigError> {
        self.optional(key)
            .ok_or_else(|| ConfigError::MissingEnvVar(key.to_string()))
    }

    /// Get a variable with a default value.
    fn or_default(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    /// Parse a variable, falling back to `default` when unset.
    fn parse_or<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        self.optional(key).map_or(Ok(default), |raw| {
            raw.trim()
                .parse()
                .map_err(|e: T::Err| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))
        })
    }

    /// Load and validate a secret.
    fn validated_secret(&self, key: &str) -> Result<SecretString, ConfigError> {
        let value = self.required(key)?;
        validate_secret_strength(&value, key)?;
        Ok(SecretString::from(value))
    }
}

/// Calculate Shannon entropy in bits per character.
fn shannon_entropy(s: &str) -> f64 {
    if s.is_empty() {
        return 0.0;
    }

    let mut freq: HashMap<char, usize> = HashMap::new();
    for c in s.chars() {
        *freq.entry(c).or_insert(0) += 1;
    }

    #[allow(clippy::cast_precision_loss)] // String length will never exceed f64 precision
    let len = s.chars().count() as f64;
    freq.values()
        .map(|&count| {
            #[allow(clippy::cast_precision_loss)] // Character count will never exceed f64 precision
            let p = count as f64 / len;
            -p * p.log2()
        })
        .sum()
}

/// Validate that a secret is not a placeholder and has sufficient entropy.
fn validate_secret_strength(secret: &str, var_name: &str) -> Result<(), ConfigError> {
    let lower = secret.to_lowercase();

    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(pattern) {
            return Err(ConfigError::InsecureSecret(
                var_name.to_string(),
                format!("appears to be a placeholder (contains '{pattern}')"),
            ));
        }
    }

    let entropy = shannon_entropy(secret);
    if entropy < MIN_ENTROPY_BITS_PER_CHAR {
        return Err(ConfigError::InsecureSecret(
            var_name.to_string(),
            format!(
                "entropy too low ({entropy:.2} bits/char, need >= {MIN_ENTROPY_BITS_PER_CHAR:.1}). Use a randomly generated secret."
            ),
        ));
    }

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use secrecy::ExposeSecret;

    use super::*;

    const API_KEY: &str = "aB3xY9mK2nL5pQ7rT0uW4zC6";

    fn load(vars: &[(&str, &str)]) -> Result<StorefrontConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        StorefrontConfig::from_lookup(|key| vars.get(key).cloned())
    }

    fn minimal() -> Vec<(&'static str, &'static str)> {
        vec![
            ("STOREFRONT_DATABASE_URL", "postgres://localhost/prism"),
            ("PRINTFUL_API_KEY", API_KEY),
        ]
    }

    #[test]
    fn test_shannon_entropy_empty() {
        assert!((shannon_entropy("") - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_shannon_entropy_two_chars() {
        let entropy = shannon_entropy("ab");
        assert!((entropy - 1.0).abs() < 0.01);
    }

    #[test]
    fn test_validate_secret_strength() {
        assert!(validate_secret_strength("your-api-key-here", "TEST_VAR").is_err());
        assert!(validate_secret_strength("aaaaaaaaaaaaaaaaaaaaaaaa", "TEST_VAR").is_err());
        assert!(validate_secret_strength(API_KEY, "TEST_VAR").is_ok());
    }

    #[test]
    fn test_defaults() {
        let config = load(&minimal()).unwrap();

        assert_eq!(config.socket_addr().to_string(), "127.0.0.1:3000");
        assert_eq!(config.cors_allow_origin, "*");
        assert_eq!(config.printful.api_url.as_str(), "https://api.printful.com/");
        assert_eq!(config.printful.timeout, Duration::from_secs(15));
        assert!(config.printful.store_id_ttl.is_none());
        assert_eq!(config.otp.ttl, chrono::TimeDelta::minutes(10));
        assert!(config.email.is_none());
        assert!(!config.is_https());
    }

    #[test]
    fn test_database_url_fallback() {
        let config = load(&[
            ("DATABASE_URL", "postgres://fly/prism"),
            ("PRINTFUL_API_KEY", API_KEY),
        ])
        .unwrap();
        assert_eq!(config.database_url.expose_secret(), "postgres://fly/prism");
    }

    #[test]
    fn test_missing_api_key() {
        let err = load(&[("STOREFRONT_DATABASE_URL", "postgres://localhost/prism")]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(key) if key == "PRINTFUL_API_KEY"));
    }

    #[test]
    fn test_placeholder_api_key_rejected() {
        let err = load(&[
            ("STOREFRONT_DATABASE_URL", "postgres://localhost/prism"),
            ("PRINTFUL_API_KEY", "changeme-changeme"),
        ])
        .unwrap_err();
        assert!(matches!(err, ConfigError::InsecureSecret(_, _)));
    }

    #[test]
    fn test_invalid_port() {
        let mut vars = minimal();
        vars.push(("STOREFRONT_PORT", "not-a-port"));
        assert!(matches!(
            load(&vars).unwrap_err(),
            ConfigError::InvalidEnvVar(key, _) if key == "STOREFRONT_PORT"
        ));
    }

    #[test]
    fn test_zero_otp_ttl_rejected() {
        let mut vars = minimal();
        vars.push(("OTP_TTL_MINUTES", "0"));
        assert!(load(&vars).is_err());
    }

    #[test]
    fn test_store_id_ttl() {
        let mut vars = minimal();
        vars.push(("PRINTFUL_STORE_ID_TTL_SECS", "3600"));
        let config = load(&vars).unwrap();
        assert_eq!(
            config.printful.store_id_ttl,
            Some(Duration::from_secs(3600))
        );
    }

    #[test]
    fn test_email_config_is_all_or_nothing() {
        let mut vars = minimal();
        vars.push(("SMTP_HOST", "smtp.example.org"));
        assert!(matches!(
            load(&vars).unwrap_err(),
            ConfigError::MissingEnvVar(key) if key == "SMTP_USERNAME"
        ));

        vars.push(("SMTP_USERNAME", "mailer"));
        vars.push(("SMTP_PASSWORD", "hunter2hunter2"));
        vars.push(("EMAIL_FROM", "Newsletter <hello@example.org>"));
        let email = load(&vars).unwrap().email.unwrap();
        assert_eq!(email.smtp_port, 587);
        assert_eq!(email.timeout, Duration::from_secs(10));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let mut vars = minimal();
        vars.push(("SMTP_HOST", "smtp.example.org"));
        vars.push(("SMTP_USERNAME", "mailer"));
        vars.push(("SMTP_PASSWORD", "hunter2hunter2"));
        vars.push(("EMAIL_FROM", "hello@example.org"));
        let debug_output = format!("{:?}", load(&vars).unwrap());

        assert!(debug_output.contains("smtp.example.org"));
        assert!(!debug_output.contains(API_KEY));
        assert!(!debug_output.contains("hunter2hunter2"));
        assert!(!debug_output.contains("postgres://localhost/prism"));
    }
}
