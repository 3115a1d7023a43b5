//! Fulfillment proxy route handler.
//!
//! Browsers never see the provider API key. They post an action name and its
//! data here; only whitelisted actions are forwarded.

use axum::{Json, body::Bytes, extract::State};
use serde_json::Value;
use tracing::instrument;

use crate::error::{AppError, Result, add_breadcrumb};
use crate::printful::{ProxyEnvelope, ProxyRequest};
use crate::state::AppState;

/// Forward a proxy action and return the provider's response body.
///
/// The body is parsed by hand so a malformed envelope renders as the same
/// `{ "error": ... }` shape as every other client error.
#[instrument(skip(state, body))]
pub async fn proxy(State(state): State<AppState>, body: Bytes) -> Result<Json<Value>> {
    let envelope: ProxyEnvelope = serde_json::from_slice(&body)
        .map_err(|e| AppError::BadRequest(format!("Invalid request body: {e}")))?;
    let request = ProxyRequest::try_from(envelope)?;

    if matches!(request, ProxyRequest::CreateOrder { .. }) {
        add_breadcrumb("printful", "Creating order", None);
    }

    Ok(Json(state.printful().execute(&request).await?))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::StatusCode;
    use serde_json::json;

    use crate::test_support::TestApp;

    #[tokio::test]
    async fn test_unknown_action_is_rejected_before_forwarding() {
        let app = TestApp::new();

        let (status, body) = app
            .post("/api/printful", json!({"action": "delete-store"}))
            .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Unknown action: delete-store");
    }

    #[tokio::test]
    async fn test_missing_data_is_rejected() {
        let app = TestApp::new();

        let (status, body) = app
            .post("/api/printful", json!({"action": "get-product"}))
            .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Missing data for action: get-product");
    }

    #[tokio::test]
    async fn test_malformed_envelope() {
        let app = TestApp::new();

        let (status, body) = app.post("/api/printful", json!({"data": {}})).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(
            body["error"]
                .as_str()
                .unwrap()
                .starts_with("Invalid request body")
        );
    }

    #[tokio::test]
    async fn test_provider_failure_is_server_error() {
        let app = TestApp::new();

        let (status, body) = app
            .post("/api/printful", json!({"action": "get-products"}))
            .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].is_string());
    }
}
