//! Integration tests for Prism.
//!
//! Each test binds the real storefront router to an ephemeral port and talks
//! to it over HTTP with `reqwest`. Subscribers live in memory, verification
//! email lands in an outbox, and the fulfillment provider is a local axum
//! server ([`FakePrintful`]) that records what it receives.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p prism-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `storefront_cart` - Session carts over cookies
//! - `storefront_newsletter` - OTP signup, expiry and rate limiting
//! - `storefront_printful` - Proxy forwarding and provider failures

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tower_sessions::MemoryStore;

use prism_storefront::config::StorefrontConfig;
use prism_storefront::db::MemorySubscriberStore;
use prism_storefront::middleware::{create_session_layer, otp_rate_limiter};
use prism_storefront::services::{ManualClock, OutboxMailer};
use prism_storefront::state::AppState;

/// API key every test server is configured with.
pub const TEST_API_KEY: &str = "aB3xY9mK2nL5pQ7rT0uW4zC6";

/// Store ID the fake provider reports.
pub const FAKE_STORE_ID: i64 = 12_345;

/// Sync product the fake provider knows about.
pub const FAKE_PRODUCT_ID: i64 = 301_001;

async fn serve(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("Failed to bind test listener");
    let addr = listener.local_addr().expect("Listener has no address");

    tokio::spawn(async move {
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .expect("Test server failed");
    });

    addr
}

// =============================================================================
// Fake fulfillment provider
// =============================================================================

/// A request the fake provider received.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub authorization: Option<String>,
    pub store_id: Option<String>,
    pub body: Option<Value>,
}

#[derive(Clone, Default)]
struct FakeState {
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    has_store: bool,
}

impl FakeState {
    fn record(&self, method: Method, path: String, headers: &HeaderMap, body: Option<Value>) {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(ToString::to_string)
        };
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(RecordedRequest {
                method,
                path,
                authorization: header("authorization"),
                store_id: header("x-pf-store-id"),
                body,
            });
    }
}

/// Local stand-in for the Printful REST API.
pub struct FakePrintful {
    pub url: String,
    state: FakeState,
}

impl FakePrintful {
    /// Start a provider whose API key has one store.
    pub async fn start() -> Self {
        Self::start_with(true).await
    }

    /// Start a provider whose API key has no stores.
    pub async fn start_without_store() -> Self {
        Self::start_with(false).await
    }

    async fn start_with(has_store: bool) -> Self {
        let state = FakeState {
            has_store,
            ..FakeState::default()
        };

        let router = Router::new()
            .route("/stores", get(stores))
            .route("/sync/products", get(sync_products))
            .route("/sync/products/{id}", get(sync_product))
            .route("/orders/estimate-costs", post(estimate_costs))
            .route("/orders", post(create_order))
            .with_state(state.clone());

        let addr = serve(router).await;
        Self {
            url: format!("http://{addr}"),
            state,
        }
    }

    /// Requests received so far, oldest first.
    #[must_use]
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state
            .requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Requests received for one path.
    #[must_use]
    pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.path == path)
            .collect()
    }
}

async fn stores(State(state): State<FakeState>, headers: HeaderMap) -> Json<Value> {
    state.record(Method::GET, "/stores".to_string(), &headers, None);
    let result = if state.has_store {
        json!([{"id": FAKE_STORE_ID, "name": "Prism Test Shop", "type": "native"}])
    } else {
        json!([])
    };
    Json(json!({"code": 200, "result": result}))
}

async fn sync_products(State(state): State<FakeState>, headers: HeaderMap) -> Json<Value> {
    state.record(Method::GET, "/sync/products".to_string(), &headers, None);
    Json(json!({
        "code": 200,
        "result": [
            {"id": FAKE_PRODUCT_ID, "external_id": "ext-1", "name": "Rainbow Pride Tee", "variants": 6, "synced": 6},
            {"id": 301_002, "external_id": "ext-2", "name": "Lesbian Pride Tee", "variants": 6, "synced": 6},
            {"id": 301_003, "external_id": "ext-3", "name": "Bi Pride Hoodie", "variants": 5, "synced": 5}
        ],
        "paging": {"total": 3, "offset": 0, "limit": 20}
    }))
}

async fn sync_product(
    State(state): State<FakeState>,
    Path(id): Path<i64>,
    headers: HeaderMap,
) -> impl IntoResponse {
    state.record(Method::GET, format!("/sync/products/{id}"), &headers, None);
    if id != FAKE_PRODUCT_ID {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"code": 404, "result": "Not found", "error": {"reason": "NotFound", "message": "Not found"}})),
        );
    }
    (
        StatusCode::OK,
        Json(json!({
            "code": 200,
            "result": {
                "sync_product": {"id": FAKE_PRODUCT_ID, "external_id": "ext-1", "name": "Rainbow Pride Tee", "variants": 1, "synced": 1},
                "sync_variants": [{
                    "id": 401_001,
                    "external_id": "ext-1-m",
                    "sync_product_id": FAKE_PRODUCT_ID,
                    "name": "Rainbow Pride Tee / M",
                    "synced": true,
                    "variant_id": 4012,
                    "retail_price": "35.00",
                    "currency": "USD",
                    "product": {"variant_id": 4012, "product_id": 71, "name": "Bella + Canvas 3001 (M)"}
                }]
            }
        })),
    )
}

async fn estimate_costs(
    State(state): State<FakeState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Json<Value> {
    state.record(
        Method::POST,
        "/orders/estimate-costs".to_string(),
        &headers,
        Some(body),
    );
    Json(json!({
        "code": 200,
        "result": {
            "costs": {"currency": "USD", "subtotal": 12.5, "shipping": 4.75, "tax": 0, "total": 17.25},
            "retail_costs": {"currency": "USD", "subtotal": 35, "total": 39.75}
        }
    }))
}

async fn create_order(
    State(state): State<FakeState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    state.record(Method::POST, "/orders".to_string(), &headers, Some(body.clone()));

    let zip = body["recipient"]["zip"].as_str().unwrap_or_default();
    if zip.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"code": 400, "result": "Recipient: zip is required", "error": {"reason": "BadRequest", "message": "Recipient: zip is required"}})),
        );
    }

    (
        StatusCode::OK,
        Json(json!({
            "code": 200,
            "result": {"id": 13, "external_id": body.get("external_id"), "status": "draft", "recipient": body["recipient"]}
        })),
    )
}

// =============================================================================
// Storefront under test
// =============================================================================

/// A running storefront plus handles to its in-memory collaborators.
pub struct TestContext {
    pub base_url: String,
    pub client: reqwest::Client,
    pub outbox: Arc<OutboxMailer>,
    pub subscribers: Arc<MemorySubscriberStore>,
    pub clock: Arc<ManualClock>,
}

/// Options for [`TestContext::start_with`].
#[derive(Debug, Clone, Default)]
pub struct TestOptions {
    /// Apply the production OTP rate limiter.
    pub rate_limit: bool,
    /// Extra environment variables for the config.
    pub env: HashMap<String, String>,
}

impl TestContext {
    /// Start a storefront pointed at `printful`.
    pub async fn start(printful: &FakePrintful) -> Self {
        Self::start_with(printful, TestOptions::default()).await
    }

    /// Start a storefront with explicit options.
    pub async fn start_with(printful: &FakePrintful, options: TestOptions) -> Self {
        let mut env: HashMap<String, String> = HashMap::from([
            (
                "STOREFRONT_DATABASE_URL".to_string(),
                "postgres://localhost/prism_test".to_string(),
            ),
            ("PRINTFUL_API_KEY".to_string(), TEST_API_KEY.to_string()),
            ("PRINTFUL_API_URL".to_string(), printful.url.clone()),
            ("PRINTFUL_TIMEOUT_SECS".to_string(), "5".to_string()),
        ]);
        env.extend(options.env);

        let config = StorefrontConfig::from_lookup(|key| env.get(key).cloned())
            .expect("Test configuration is valid");

        let subscribers = Arc::new(MemorySubscriberStore::new());
        let outbox = Arc::new(OutboxMailer::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));

        let sessions = create_session_layer(MemoryStore::default(), &config);
        let state =
            AppState::with_clock(config, subscribers.clone(), outbox.clone(), clock.clone())
                .expect("Failed to build state");
        let limiter = options.rate_limit.then(otp_rate_limiter);
        let app = prism_storefront::app(state, sessions, limiter).expect("Failed to build app");

        let addr = serve(app).await;

        Self {
            base_url: format!("http://{addr}"),
            client: Self::client(),
            outbox,
            subscribers,
            clock,
        }
    }

    /// A fresh client with its own cookie jar.
    #[must_use]
    pub fn client() -> reqwest::Client {
        reqwest::Client::builder()
            .cookie_store(true)
            .build()
            .expect("Failed to create HTTP client")
    }

    #[must_use]
    pub fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    /// GET with the shared client; returns status and JSON body.
    pub async fn get(&self, path: &str) -> (reqwest::StatusCode, Value) {
        let resp = self
            .client
            .get(self.url(path))
            .send()
            .await
            .expect("GET failed");
        let status = resp.status();
        (status, resp.json().await.unwrap_or(Value::Null))
    }

    /// POST JSON with the shared client; returns status and JSON body.
    pub async fn post(&self, path: &str, body: &Value) -> (reqwest::StatusCode, Value) {
        let resp = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .expect("POST failed");
        let status = resp.status();
        (status, resp.json().await.unwrap_or(Value::Null))
    }
}
