//! In-process subscriber store.
//!
//! Backs unit and integration tests. A single async mutex serializes every
//! operation, matching the atomicity of the single-statement `PostgreSQL`
//! queries.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;

use prism_core::{Email, OtpCode};

use super::{RepositoryError, SubscriberStore};
use crate::models::Subscriber;

/// Subscriber records held in memory.
#[derive(Debug, Default)]
pub struct MemorySubscriberStore {
    records: Mutex<HashMap<Email, Subscriber>>,
}

impl MemorySubscriberStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub async fn len(&self) -> usize {
        self.records.lock().await.len()
    }

    /// Whether no records are stored.
    pub async fn is_empty(&self) -> bool {
        self.records.lock().await.is_empty()
    }
}

#[async_trait]
impl SubscriberStore for MemorySubscriberStore {
    async fn find(&self, email: &Email) -> Result<Option<Subscriber>, RepositoryError> {
        Ok(self.records.lock().await.get(email).cloned())
    }

    async fn upsert_code(
        &self,
        email: &Email,
        code: &OtpCode,
        expires_at: DateTime<Utc>,
    ) -> Result<Subscriber, RepositoryError> {
        let now = Utc::now();
        let mut records = self.records.lock().await;

        let record = records
            .entry(email.clone())
            .and_modify(|existing| {
                existing.otp_code = Some(code.clone());
                existing.otp_expires_at = Some(expires_at);
                existing.verified = false;
                existing.updated_at = now;
            })
            .or_insert_with(|| Subscriber {
                email: email.clone(),
                otp_code: Some(code.clone()),
                otp_expires_at: Some(expires_at),
                verified: false,
                verified_at: None,
                created_at: now,
                updated_at: now,
            });

        Ok(record.clone())
    }

    async fn mark_verified(
        &self,
        email: &Email,
        code: &OtpCode,
        verified_at: DateTime<Utc>,
    ) -> Result<Option<Subscriber>, RepositoryError> {
        let mut records = self.records.lock().await;

        let Some(record) = records.get_mut(email) else {
            return Ok(None);
        };
        if record.verified || record.otp_code.as_ref() != Some(code) {
            return Ok(None);
        }

        record.verified = true;
        record.verified_at = Some(verified_at);
        record.otp_code = None;
        record.otp_expires_at = None;
        record.updated_at = Utc::now();

        Ok(Some(record.clone()))
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeDelta;

    use super::*;

    fn email(value: &str) -> Email {
        Email::parse(value).unwrap()
    }

    fn code(value: &str) -> OtpCode {
        OtpCode::parse(value).unwrap()
    }

    #[tokio::test]
    async fn test_upsert_creates_then_overwrites() {
        let store = MemorySubscriberStore::new();
        let addr = email("a@b.com");
        let expires = Utc::now() + TimeDelta::minutes(10);

        let first = store.upsert_code(&addr, &code("111111"), expires).await.unwrap();
        let second = store.upsert_code(&addr, &code("222222"), expires).await.unwrap();

        assert_eq!(store.len().await, 1);
        assert_eq!(second.otp_code, Some(code("222222")));
        assert_eq!(second.created_at, first.created_at);
    }

    #[tokio::test]
    async fn test_upsert_resets_verified() {
        let store = MemorySubscriberStore::new();
        let addr = email("a@b.com");
        let expires = Utc::now() + TimeDelta::minutes(10);

        store.upsert_code(&addr, &code("111111"), expires).await.unwrap();
        store
            .mark_verified(&addr, &code("111111"), Utc::now())
            .await
            .unwrap()
            .unwrap();

        let reissued = store.upsert_code(&addr, &code("333333"), expires).await.unwrap();
        assert!(!reissued.verified);
    }

    #[tokio::test]
    async fn test_mark_verified_is_conditional() {
        let store = MemorySubscriberStore::new();
        let addr = email("a@b.com");
        let expires = Utc::now() + TimeDelta::minutes(10);
        store.upsert_code(&addr, &code("111111"), expires).await.unwrap();

        let wrong = store
            .mark_verified(&addr, &code("999999"), Utc::now())
            .await
            .unwrap();
        assert!(wrong.is_none());

        let verified = store
            .mark_verified(&addr, &code("111111"), Utc::now())
            .await
            .unwrap()
            .unwrap();
        assert!(verified.verified);
        assert!(verified.otp_code.is_none());
        assert!(verified.otp_expires_at.is_none());

        let again = store
            .mark_verified(&addr, &code("111111"), Utc::now())
            .await
            .unwrap();
        assert!(again.is_none());
    }

    #[tokio::test]
    async fn test_mark_verified_unknown_email() {
        let store = MemorySubscriberStore::new();
        let result = store
            .mark_verified(&email("nobody@b.com"), &code("111111"), Utc::now())
            .await
            .unwrap();
        assert!(result.is_none());
        assert!(store.is_empty().await);
    }
}
