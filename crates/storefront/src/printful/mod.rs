//! Printful REST API client.
//!
//! Forwards whitelisted actions to the provider with bearer authentication
//! and the `X-PF-Store-Id` header. The store ID is looked up from
//! `GET /stores` on first use and memoized with `moka`.
//!
//! Every call is a single attempt bounded by the configured client timeout.

mod cache;
pub mod types;

use std::sync::Arc;

use reqwest::Method;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;
use tracing::instrument;
use url::Url;

use prism_core::{CategoryFilter, StoreId, SyncProductId};

use crate::config::PrintfulConfig;

pub use cache::Memo;
pub use types::{
    Envelope, OrderDraft, OrderItem, ProxyEnvelope, ProxyRequest, Recipient, Store,
    SyncProductDetail, SyncProductSummary, SyncVariant, VariantProduct,
};

/// Errors that can occur when talking to Printful.
#[derive(Debug, Error)]
pub enum PrintfulError {
    /// Request could not be sent or timed out.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Provider returned a non-success status.
    #[error("{message}")]
    Api { status: u16, message: String },

    /// The API key has no stores.
    #[error("No Printful store found. Please ensure your API key has access to at least one store.")]
    NoStore,

    /// Provider body was not the expected JSON.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Store lookup failed; shared between callers waiting on the same lookup.
    #[error("{0}")]
    StoreLookup(Arc<PrintfulError>),

    /// Client sent an action or payload the proxy does not accept.
    #[error("{0}")]
    InvalidRequest(String),
}

/// Client for the Printful API.
#[derive(Clone)]
pub struct PrintfulClient {
    inner: Arc<PrintfulClientInner>,
}

struct PrintfulClientInner {
    client: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    store_id: Memo<StoreId>,
}

impl PrintfulClient {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &PrintfulConfig) -> Result<Self, PrintfulError> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            inner: Arc::new(PrintfulClientInner {
                client,
                base_url: base_url(&config.api_url),
                api_key: config.api_key.clone(),
                store_id: Memo::new(config.store_id_ttl),
            }),
        })
    }

    /// Forward a proxy request and return the provider's JSON unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if the store lookup fails, the request fails, or the
    /// provider answers with a non-success status.
    #[instrument(skip(self, request), fields(action = request.action()))]
    pub async fn execute(&self, request: &ProxyRequest) -> Result<Value, PrintfulError> {
        let store_id = self.store_id().await?;
        let (method, path) = request.endpoint();

        tracing::debug!(store_id = %store_id, method = %method, path = %path, "Calling Printful API");

        let value = self
            .send(method, &path, Some(store_id), request.body())
            .await?;

        tracing::info!(action = request.action(), "Printful API success");
        Ok(value)
    }

    /// Store ID for the `X-PF-Store-Id` header.
    ///
    /// # Errors
    ///
    /// Returns [`PrintfulError::StoreLookup`] if the lookup failed.
    pub async fn store_id(&self) -> Result<StoreId, PrintfulError> {
        self.inner
            .store_id
            .get_or_try_init(self.fetch_store_id())
            .await
            .map_err(PrintfulError::StoreLookup)
    }

    /// Sync products, optionally narrowed to a category.
    ///
    /// # Errors
    ///
    /// Same as [`Self::execute`].
    pub async fn sync_products(
        &self,
        category: CategoryFilter,
    ) -> Result<Vec<SyncProductSummary>, PrintfulError> {
        let value = self.execute(&ProxyRequest::GetProducts).await?;
        let products: Envelope<Vec<SyncProductSummary>> = decode(value)?;

        Ok(products
            .result
            .into_iter()
            .filter(|product| category.matches(&product.name))
            .collect())
    }

    /// One sync product with its variants.
    ///
    /// # Errors
    ///
    /// Same as [`Self::execute`]; a missing product is a provider 404.
    pub async fn sync_product(&self, id: SyncProductId) -> Result<SyncProductDetail, PrintfulError> {
        let value = self.execute(&ProxyRequest::GetSyncProduct { id }).await?;
        let detail: Envelope<SyncProductDetail> = decode(value)?;
        Ok(detail.result)
    }

    async fn fetch_store_id(&self) -> Result<StoreId, PrintfulError> {
        let value = self.send(Method::GET, "/stores", None, None).await?;
        let stores: Envelope<Vec<Store>> = decode(value)?;

        let store = stores.result.first().ok_or(PrintfulError::NoStore)?;
        tracing::info!(store_id = %store.id, "Resolved Printful store");
        Ok(store.id)
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        store_id: Option<StoreId>,
        body: Option<&OrderDraft>,
    ) -> Result<Value, PrintfulError> {
        let url = format!("{}{path}", self.inner.base_url);

        let mut request = self
            .inner
            .client
            .request(method, &url)
            .bearer_auth(self.inner.api_key.expose_secret());
        if let Some(store_id) = store_id {
            request = request.header("X-PF-Store-Id", store_id.to_string());
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        let value: Value = serde_json::from_str(&text).map_err(|e| {
            tracing::error!(
                status = %status,
                body = %text.chars().take(500).collect::<String>(),
                "Failed to parse Printful response"
            );
            PrintfulError::Parse(e)
        })?;

        if !status.is_success() {
            let message = error_message(&value);
            tracing::error!(status = %status, message = %message, "Printful API error");
            return Err(PrintfulError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(value)
    }
}

fn base_url(url: &Url) -> String {
    url.as_str().trim_end_matches('/').to_string()
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, PrintfulError> {
    Ok(serde_json::from_value(value)?)
}

/// `error.message`, else the JSON of `error`, else a generic message.
fn error_message(body: &Value) -> String {
    match body.get("error") {
        Some(Value::Object(error)) => error
            .get("message")
            .and_then(Value::as_str)
            .map_or_else(|| Value::Object(error.clone()).to_string(), str::to_string),
        Some(Value::String(message)) => message.clone(),
        Some(other) if !other.is_null() => other.to_string(),
        _ => "Printful API error".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_error_message_prefers_nested_message() {
        let body = json!({"code": 404, "error": {"reason": "NotFound", "message": "Not found"}});
        assert_eq!(error_message(&body), "Not found");
    }

    #[test]
    fn test_error_message_falls_back_to_error_json() {
        let body = json!({"code": 400, "error": {"reason": "BadRequest"}});
        assert_eq!(error_message(&body), r#"{"reason":"BadRequest"}"#);
    }

    #[test]
    fn test_error_message_generic() {
        assert_eq!(error_message(&json!({"code": 500})), "Printful API error");
    }

    #[test]
    fn test_no_store_message() {
        let err = PrintfulError::StoreLookup(Arc::new(PrintfulError::NoStore));
        assert_eq!(
            err.to_string(),
            "No Printful store found. Please ensure your API key has access to at least one store."
        );
    }

    #[test]
    fn test_base_url_trims_trailing_slash() {
        let url = Url::parse("http://127.0.0.1:4000/").ok();
        assert_eq!(url.map(|u| base_url(&u)).as_deref(), Some("http://127.0.0.1:4000"));
    }
}
