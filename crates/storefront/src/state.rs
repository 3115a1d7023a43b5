//! Application state shared across handlers.

use std::sync::Arc;

use crate::catalog::Catalog;
use crate::config::StorefrontConfig;
use crate::db::SubscriberStore;
use crate::printful::{PrintfulClient, PrintfulError};
use crate::services::{Clock, Mailer, OtpService, SystemClock};

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like the subscriber store and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    subscribers: Arc<dyn SubscriberStore>,
    otp: OtpService,
    printful: PrintfulClient,
    catalog: Catalog,
}

impl AppState {
    /// Create a new application state with the seeded catalog.
    ///
    /// # Errors
    ///
    /// Returns an error if the Printful HTTP client cannot be built.
    pub fn new(
        config: StorefrontConfig,
        subscribers: Arc<dyn SubscriberStore>,
        mailer: Arc<dyn Mailer>,
    ) -> Result<Self, PrintfulError> {
        Self::with_clock(config, subscribers, mailer, Arc::new(SystemClock))
    }

    /// Same as [`Self::new`] with an explicit clock for code expiry.
    ///
    /// # Errors
    ///
    /// Returns an error if the Printful HTTP client cannot be built.
    pub fn with_clock(
        config: StorefrontConfig,
        subscribers: Arc<dyn SubscriberStore>,
        mailer: Arc<dyn Mailer>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, PrintfulError> {
        let printful = PrintfulClient::new(&config.printful)?;
        let otp = OtpService::with_clock(subscribers.clone(), mailer, clock, config.otp.ttl);

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                subscribers,
                otp,
                printful,
                catalog: Catalog::seeded(),
            }),
        })
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Subscriber store, for readiness checks.
    #[must_use]
    pub fn subscribers(&self) -> &dyn SubscriberStore {
        self.inner.subscribers.as_ref()
    }

    #[must_use]
    pub fn otp(&self) -> &OtpService {
        &self.inner.otp
    }

    /// Get a reference to the Printful API client.
    #[must_use]
    pub fn printful(&self) -> &PrintfulClient {
        &self.inner.printful
    }

    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.inner.catalog
    }
}
