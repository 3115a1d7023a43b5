//! Newsletter subscription route handlers.
//!
//! Signup is two steps: request a code by email, then submit it. Codes only
//! travel by email; no response ever contains one.

use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::ApiJson;
use crate::error::{AppError, Result};
use crate::services::OtpError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SendOtpRequest {
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VerifyOtpRequest {
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub otp: Option<String>,
}

/// Success body shared by the newsletter endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsletterResponse {
    pub success: bool,
    pub message: String,
}

impl NewsletterResponse {
    fn ok(message: &str) -> Json<Self> {
        Json(Self {
            success: true,
            message: message.to_string(),
        })
    }
}

/// Issue a verification code.
#[instrument(skip(state, request))]
pub async fn send_otp(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<SendOtpRequest>,
) -> Result<Json<NewsletterResponse>> {
    let email = request.email.ok_or(OtpError::InvalidInput)?;
    state.otp().issue_code(&email).await?;
    Ok(NewsletterResponse::ok("OTP sent successfully"))
}

/// Issue a replacement verification code.
#[instrument(skip(state, request))]
pub async fn resend_otp(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<SendOtpRequest>,
) -> Result<Json<NewsletterResponse>> {
    let email = request.email.ok_or(OtpError::InvalidInput)?;
    state.otp().resend_code(&email).await?;
    Ok(NewsletterResponse::ok("OTP sent successfully"))
}

/// Verify a submitted code.
#[instrument(skip(state, request))]
pub async fn verify_otp(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<VerifyOtpRequest>,
) -> Result<Json<NewsletterResponse>> {
    let (Some(email), Some(otp)) = (
        request.email.filter(|e| !e.trim().is_empty()),
        request.otp.filter(|o| !o.is_empty()),
    ) else {
        return Err(AppError::BadRequest(
            "Email and OTP are required".to_string(),
        ));
    };

    state.otp().verify_code(&email, &otp).await?;
    Ok(NewsletterResponse::ok("Email verified successfully"))
}
