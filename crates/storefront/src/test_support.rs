//! Router harness for handler tests.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
    response::Response,
};
use chrono::Utc;
use serde_json::Value;
use tower::ServiceExt;
use tower_sessions::MemoryStore;

use crate::config::StorefrontConfig;
use crate::db::MemorySubscriberStore;
use crate::middleware::create_session_layer;
use crate::services::{ManualClock, OutboxMailer};
use crate::state::AppState;

/// Nothing listens here; provider calls fail fast.
const UNREACHABLE_PROVIDER: &str = "http://127.0.0.1:9";

pub struct TestApp {
    router: Router,
    pub subscribers: Arc<MemorySubscriberStore>,
    pub outbox: Arc<OutboxMailer>,
    pub clock: Arc<ManualClock>,
}

pub fn test_config(printful_url: &str) -> StorefrontConfig {
    let vars: HashMap<&str, &str> = HashMap::from([
        ("STOREFRONT_DATABASE_URL", "postgres://localhost/prism_test"),
        ("PRINTFUL_API_KEY", "aB3xY9mK2nL5pQ7rT0uW4zC6"),
        ("PRINTFUL_API_URL", printful_url),
        ("PRINTFUL_TIMEOUT_SECS", "2"),
    ]);
    #[allow(clippy::unwrap_used)]
    StorefrontConfig::from_lookup(|key| vars.get(key).map(ToString::to_string)).unwrap()
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_printful_url(UNREACHABLE_PROVIDER)
    }

    #[allow(clippy::unwrap_used)]
    pub fn with_printful_url(printful_url: &str) -> Self {
        let config = test_config(printful_url);
        let subscribers = Arc::new(MemorySubscriberStore::new());
        let outbox = Arc::new(OutboxMailer::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));

        let sessions = create_session_layer(MemoryStore::default(), &config);
        let state =
            AppState::with_clock(config, subscribers.clone(), outbox.clone(), clock.clone())
                .unwrap();
        let router = crate::app(state, sessions, None).unwrap();

        Self {
            router,
            subscribers,
            outbox,
            clock,
        }
    }

    #[allow(clippy::unwrap_used)]
    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        #[allow(clippy::unwrap_used)]
        let response = self.send(builder.body(Body::empty()).unwrap()).await;
        let (status, body, _) = read(response).await;
        (status, body)
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        let (status, body, _) = self.post_with_cookie(uri, body, None).await;
        (status, body)
    }

    /// POST JSON and return the session cookie the response set, if any.
    pub async fn post_with_cookie(
        &self,
        uri: &str,
        body: Value,
        cookie: Option<&str>,
    ) -> (StatusCode, Value, Option<String>) {
        let mut builder = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        #[allow(clippy::unwrap_used)]
        let response = self
            .send(builder.body(Body::from(body.to_string())).unwrap())
            .await;
        read(response).await
    }
}

async fn read(response: Response) -> (StatusCode, Value, Option<String>) {
    let status = response.status();
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(ToString::to_string);

    #[allow(clippy::unwrap_used)]
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()));

    (status, body, cookie)
}
