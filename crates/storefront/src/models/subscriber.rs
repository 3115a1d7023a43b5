//! Newsletter subscriber domain type.

use chrono::{DateTime, Utc};
use serde::Serialize;

use prism_core::{Email, OtpCode, SubscriptionStatus};

/// A newsletter subscriber record.
///
/// One record per email. The record is created or overwritten each time a
/// code is issued and kept afterwards as the durable membership record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Subscriber {
    pub email: Email,
    /// Outstanding code. `None` once verified.
    #[serde(skip_serializing)]
    pub otp_code: Option<OtpCode>,
    pub otp_expires_at: Option<DateTime<Utc>>,
    pub verified: bool,
    pub verified_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Subscriber {
    /// Where this record sits in the subscription state machine.
    #[must_use]
    pub const fn status(&self) -> SubscriptionStatus {
        if self.verified {
            SubscriptionStatus::Verified
        } else {
            SubscriptionStatus::CodeIssued
        }
    }

    /// Whether the outstanding code has expired at `now`.
    ///
    /// A record without an expiry has nothing left to verify and counts as expired.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.otp_expires_at.is_none_or(|expires_at| now >= expires_at)
    }
}
