//! Newsletter email verification by one-time code.
//!
//! Per email the flow moves `NoRecord -> CodeIssued -> Verified`. Issuing a
//! code always lands in `CodeIssued`, including for an email that was
//! already verified: the new code must be confirmed before the address
//! counts as verified again.
//!
//! Persistence commits before the email is sent. A failed send is reported
//! to the caller but the stored code stays valid.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, TimeDelta, Utc};
use thiserror::Error;
use tracing::instrument;

use prism_core::{Email, OtpCode, SubscriptionStatus};

use super::email::{MailError, Mailer};
use crate::db::{RepositoryError, SubscriberStore};
use crate::models::Subscriber;

/// Errors from the verification flow.
///
/// Display strings are shown to end users.
#[derive(Debug, Error)]
pub enum OtpError {
    /// Email missing or malformed.
    #[error("Invalid email address")]
    InvalidInput,

    /// No record for this email.
    #[error("Subscription not found")]
    NotFound,

    #[error("Email already verified")]
    AlreadyVerified,

    /// Submitted code does not equal the outstanding code.
    #[error("Invalid OTP code")]
    InvalidCode,

    #[error("OTP has expired. Please request a new one.")]
    Expired,

    /// The code was stored but could not be emailed.
    #[error("Failed to send verification email")]
    Notification(#[source] MailError),

    /// Persistence failure.
    #[error("Failed to process subscription")]
    Internal(#[from] RepositoryError),
}

/// Source of the current time.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    millis: AtomicI64,
}

impl ManualClock {
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            millis: AtomicI64::new(start.timestamp_millis()),
        }
    }

    /// Move the clock forward by `delta`.
    pub fn advance(&self, delta: TimeDelta) {
        self.millis
            .fetch_add(delta.num_milliseconds(), Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.millis.load(Ordering::SeqCst))
            .unwrap_or_default()
    }
}

/// Issues and verifies newsletter codes.
#[derive(Clone)]
pub struct OtpService {
    store: Arc<dyn SubscriberStore>,
    mailer: Arc<dyn Mailer>,
    clock: Arc<dyn Clock>,
    ttl: TimeDelta,
}

impl OtpService {
    /// Create a service using the wall clock.
    #[must_use]
    pub fn new(store: Arc<dyn SubscriberStore>, mailer: Arc<dyn Mailer>, ttl: TimeDelta) -> Self {
        Self::with_clock(store, mailer, Arc::new(SystemClock), ttl)
    }

    #[must_use]
    pub fn with_clock(
        store: Arc<dyn SubscriberStore>,
        mailer: Arc<dyn Mailer>,
        clock: Arc<dyn Clock>,
        ttl: TimeDelta,
    ) -> Self {
        Self {
            store,
            mailer,
            clock,
            ttl,
        }
    }

    /// How long an issued code stays valid.
    #[must_use]
    pub const fn ttl(&self) -> TimeDelta {
        self.ttl
    }

    /// Generate, store and email a fresh code for `email`.
    ///
    /// Replaces any outstanding code and resets the record to unverified.
    ///
    /// # Errors
    ///
    /// - [`OtpError::InvalidInput`] if `email` is not an address
    /// - [`OtpError::Internal`] if the record could not be written
    /// - [`OtpError::Notification`] if the email could not be sent (the code
    ///   is still stored)
    #[instrument(skip(self))]
    pub async fn issue_code(&self, email: &str) -> Result<(), OtpError> {
        let email = Email::parse(email).map_err(|_| OtpError::InvalidInput)?;
        let code = OtpCode::generate();
        let expires_at = self.clock.now() + self.ttl;

        let record = self.store.upsert_code(&email, &code, expires_at).await?;

        self.mailer
            .send_otp(&email, &code, self.ttl.num_minutes())
            .await
            .map_err(|e| {
                tracing::error!(email = %email, error = %e, "Failed to send verification email");
                OtpError::Notification(e)
            })?;

        tracing::info!(email = %email, status = %record.status(), "Verification code issued");
        Ok(())
    }

    /// Issue a replacement code. Same contract as [`Self::issue_code`].
    ///
    /// # Errors
    ///
    /// See [`Self::issue_code`].
    pub async fn resend_code(&self, email: &str) -> Result<(), OtpError> {
        self.issue_code(email).await
    }

    /// Check `submitted` against the outstanding code for `email` and mark
    /// the address verified.
    ///
    /// Checks run in order: record exists, not yet verified, code matches,
    /// code not expired. The welcome email is best effort.
    ///
    /// # Errors
    ///
    /// [`OtpError::NotFound`], [`OtpError::AlreadyVerified`],
    /// [`OtpError::InvalidCode`], [`OtpError::Expired`] for the failed check,
    /// or [`OtpError::Internal`] on persistence failure.
    #[instrument(skip(self, submitted))]
    pub async fn verify_code(&self, email: &str, submitted: &str) -> Result<Subscriber, OtpError> {
        let Ok(email) = Email::parse(email) else {
            return Err(OtpError::NotFound);
        };

        let record = self
            .store
            .find(&email)
            .await?
            .ok_or(OtpError::NotFound)?;

        if record.verified {
            return Err(OtpError::AlreadyVerified);
        }

        let code = match &record.otp_code {
            Some(code) if code.matches(submitted) => code.clone(),
            _ => return Err(OtpError::InvalidCode),
        };

        let now = self.clock.now();
        if record.is_expired(now) {
            return Err(OtpError::Expired);
        }

        // A concurrent resend or verify may have replaced the code since the read.
        let Some(verified) = self.store.mark_verified(&email, &code, now).await? else {
            return Err(self.lost_commit_error(&email).await?);
        };

        tracing::info!(email = %email, "Email verified");

        if let Err(e) = self.mailer.send_welcome(&email).await {
            tracing::warn!(email = %email, error = %e, "Failed to send welcome email");
        }

        Ok(verified)
    }

    /// Why a verify that passed its checks then failed to commit.
    ///
    /// A concurrent verify of the same code reads back as already verified;
    /// anything else means the code was replaced.
    async fn lost_commit_error(&self, email: &Email) -> Result<OtpError, OtpError> {
        let current = self.store.find(email).await?;
        Ok(match current {
            Some(record) if record.verified => OtpError::AlreadyVerified,
            Some(_) => OtpError::InvalidCode,
            None => OtpError::NotFound,
        })
    }

    /// Current state of `email` in the verification flow.
    ///
    /// # Errors
    ///
    /// Returns [`OtpError::InvalidInput`] for a malformed address or
    /// [`OtpError::Internal`] on persistence failure.
    pub async fn status(&self, email: &str) -> Result<SubscriptionStatus, OtpError> {
        let email = Email::parse(email).map_err(|_| OtpError::InvalidInput)?;
        Ok(self
            .store
            .find(&email)
            .await?
            .map_or(SubscriptionStatus::NoRecord, |record| record.status()))
    }
}
