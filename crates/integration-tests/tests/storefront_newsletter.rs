//! Integration tests for newsletter signup.
//!
//! Run with: cargo test -p prism-integration-tests

use chrono::TimeDelta;
use prism_core::{Email, SubscriptionStatus};
use prism_integration_tests::{FakePrintful, TestContext, TestOptions};
use prism_storefront::db::SubscriberStore;
use reqwest::StatusCode;
use serde_json::json;

fn email(value: &str) -> Email {
    Email::parse(value).unwrap()
}

#[tokio::test]
async fn test_signup_flow() {
    let printful = FakePrintful::start().await;
    let ctx = TestContext::start(&printful).await;

    let (status, body) = ctx
        .post("/api/newsletter/send-otp", &json!({"email": "Sam@Example.org"}))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let messages = ctx.outbox.messages().await;
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0].subject(), "Verify your email - Your OTP Code");

    let code = ctx
        .outbox
        .latest_code(&email("sam@example.org"))
        .await
        .unwrap();

    let (status, body) = ctx
        .post(
            "/api/newsletter/verify-otp",
            &json!({"email": "sam@example.org", "otp": code.as_str()}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Email verified successfully");

    let record = ctx
        .subscribers
        .find(&email("sam@example.org"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status(), SubscriptionStatus::Verified);
    assert!(record.otp_code.is_none());

    let messages = ctx.outbox.messages().await;
    assert_eq!(messages.last().unwrap().subject(), "Welcome to Our Community!");
}

#[tokio::test]
async fn test_resend_invalidates_previous_code() {
    let printful = FakePrintful::start().await;
    let ctx = TestContext::start(&printful).await;
    let address = email("river@example.org");

    ctx.post("/api/newsletter/send-otp", &json!({"email": "river@example.org"}))
        .await;
    let first = ctx.outbox.latest_code(&address).await.unwrap();

    // Resend until the code differs; codes are random
    let mut second = first.clone();
    for _ in 0..5 {
        ctx.post("/api/newsletter/resend-otp", &json!({"email": "river@example.org"}))
            .await;
        second = ctx.outbox.latest_code(&address).await.unwrap();
        if second != first {
            break;
        }
    }
    assert_ne!(first, second);

    let (status, body) = ctx
        .post(
            "/api/newsletter/verify-otp",
            &json!({"email": "river@example.org", "otp": first.as_str()}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid OTP code");

    let (status, _) = ctx
        .post(
            "/api/newsletter/verify-otp",
            &json!({"email": "river@example.org", "otp": second.as_str()}),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_code_expires_after_ttl() {
    let printful = FakePrintful::start().await;
    let ctx = TestContext::start_with(
        &printful,
        TestOptions {
            env: [("OTP_TTL_MINUTES".to_string(), "2".to_string())].into(),
            ..TestOptions::default()
        },
    )
    .await;

    ctx.post("/api/newsletter/send-otp", &json!({"email": "kai@example.org"}))
        .await;
    let code = ctx
        .outbox
        .latest_code(&email("kai@example.org"))
        .await
        .unwrap();

    ctx.clock.advance(TimeDelta::minutes(3));

    let (status, body) = ctx
        .post(
            "/api/newsletter/verify-otp",
            &json!({"email": "kai@example.org", "otp": code.as_str()}),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "OTP has expired. Please request a new one.");
}

#[tokio::test]
async fn test_otp_endpoints_are_rate_limited() {
    let printful = FakePrintful::start().await;
    let ctx = TestContext::start_with(
        &printful,
        TestOptions {
            rate_limit: true,
            ..TestOptions::default()
        },
    )
    .await;

    let mut statuses = Vec::new();
    for i in 0..8 {
        let (status, _) = ctx
            .post(
                "/api/newsletter/send-otp",
                &json!({"email": format!("burst{i}@example.org")}),
            )
            .await;
        statuses.push(status);
    }

    assert!(statuses.iter().take(5).all(|s| *s == StatusCode::OK));
    assert!(statuses.contains(&StatusCode::TOO_MANY_REQUESTS));

    // Other routes are not limited
    let (status, _) = ctx.get("/cart/count").await;
    assert_eq!(status, StatusCode::OK);
}
