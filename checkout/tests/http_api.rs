//! HTTP API integration tests.
//!
//! Exercises the router end to end with `axum-test`: session header,
//! request validation, status codes, error bodies and signed webhooks.
//!
//! Run with: `cargo test --test http_api`

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

mod common;

use axum::body::Bytes;
use axum::http::{HeaderName, HeaderValue, StatusCode};
use axum_test::TestServer;
use common::{Harness, WEBHOOK_SECRET, payment_captured, payment_failed};
use marketplace_checkout::build_router;
use marketplace_core::GatewayError;
use marketplace_core::types::{Currency, UserId};
use marketplace_razorpay::{EVENT_ID_HEADER, SIGNATURE_HEADER, signature_for};
use marketplace_testing::fixtures;
use marketplace_web::CORRELATION_ID_HEADER;
use serde_json::{Value, json};

fn server(harness: &Harness) -> TestServer {
    TestServer::new(build_router(harness.state.clone())).unwrap()
}

fn user_header(user_id: UserId) -> (HeaderName, HeaderValue) {
    (
        HeaderName::from_static("x-user-id"),
        HeaderValue::from_str(&user_id.to_string()).unwrap(),
    )
}

async fn post_webhook(
    server: &TestServer,
    event_id: &str,
    body: Vec<u8>,
) -> axum_test::TestResponse {
    let signature = signature_for(WEBHOOK_SECRET, &body);
    server
        .post("/webhooks/razorpay")
        .add_header(
            HeaderName::from_static(SIGNATURE_HEADER),
            HeaderValue::from_str(&signature).unwrap(),
        )
        .add_header(
            HeaderName::from_static(EVENT_ID_HEADER),
            HeaderValue::from_str(event_id).unwrap(),
        )
        .bytes(Bytes::from(body))
        .await
}

#[tokio::test]
async fn test_health_and_readiness() {
    let harness = Harness::new();
    let server = server(&harness);

    server.get("/health").await.assert_status_ok();
    server.get("/ready").await.assert_status_ok();

    harness.store.set_unavailable(true);
    let response = server.get("/ready").await;
    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_purchase_returns_checkout_payload() {
    let harness = Harness::new();
    let tier = harness.ticket_tier(50, 2_500);
    let server = server(&harness);
    let (name, value) = user_header(UserId::new());

    let response = server
        .post("/api/purchases")
        .add_header(name, value)
        .json(&json!({"resourceId": tier.resource_id, "quantity": 2}))
        .await;

    response.assert_status(StatusCode::CREATED);
    let body: Value = response.json();
    assert_eq!(body["orderId"], "order_mock_1");
    assert_eq!(body["amount"], 5_000);
    assert_eq!(body["currency"], "INR");
    assert_eq!(body["checkoutKey"], "rzp_test_mock");
    assert_eq!(body["reservationKind"], "ticket_order");
    assert_eq!(body["checkoutMode"], "gateway");
    assert_eq!(body["status"], "pending");
    assert!(body["internalReservationId"].is_string());
}

#[tokio::test]
async fn test_client_amount_is_ignored() {
    let harness = Harness::new();
    let tier = harness.ticket_tier(50, 2_500);
    let server = server(&harness);
    let (name, value) = user_header(UserId::new());

    let response = server
        .post("/api/purchases")
        .add_header(name, value)
        .json(&json!({"resourceId": tier.resource_id, "quantity": 1, "amount": 1}))
        .await;

    response.assert_status(StatusCode::CREATED);
    assert_eq!(response.json::<Value>()["amount"], 2_500);
}

#[tokio::test]
async fn test_purchase_without_session_is_unauthorized() {
    let harness = Harness::new();
    let tier = harness.ticket_tier(50, 2_500);
    let server = server(&harness);

    let response = server
        .post("/api/purchases")
        .json(&json!({"resourceId": tier.resource_id, "quantity": 1}))
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(response.json::<Value>()["code"], "UNAUTHORIZED");
    assert_eq!(harness.gateway.call_count(), 0);
}

#[tokio::test]
async fn test_purchase_error_statuses() {
    let harness = Harness::new();
    let lead = harness.publish(fixtures::lead(1, 10_000, &Currency::inr()));
    let server = server(&harness);
    let (name, value) = user_header(UserId::new());

    // Malformed JSON
    let response = server
        .post("/api/purchases")
        .add_header(name.clone(), value.clone())
        .content_type("application/json")
        .bytes(Bytes::from_static(b"{not json"))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);

    // Missing quantity
    let response = server
        .post("/api/purchases")
        .add_header(name.clone(), value.clone())
        .json(&json!({"resourceId": lead.resource_id}))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["code"], "BAD_REQUEST");

    // Unknown resource
    let response = server
        .post("/api/purchases")
        .add_header(name.clone(), value.clone())
        .json(&json!({"resourceId": uuid::Uuid::new_v4(), "quantity": 1}))
        .await;
    response.assert_status(StatusCode::NOT_FOUND);

    // Sold out
    server
        .post("/api/purchases")
        .add_header(name.clone(), value.clone())
        .json(&json!({"resourceId": lead.resource_id, "quantity": 1}))
        .await
        .assert_status(StatusCode::CREATED);
    let response = server
        .post("/api/purchases")
        .add_header(name.clone(), value.clone())
        .json(&json!({"resourceId": lead.resource_id, "quantity": 1}))
        .await;
    response.assert_status(StatusCode::CONFLICT);
    assert_eq!(response.json::<Value>()["code"], "CAPACITY_EXCEEDED");

    // Gateway down
    let tier = harness.ticket_tier(5, 1_000);
    harness
        .gateway
        .fail_with(GatewayError::Unavailable("timeout".into()));
    let response = server
        .post("/api/purchases")
        .add_header(name, value)
        .json(&json!({"resourceId": tier.resource_id, "quantity": 1}))
        .await;
    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(response.json::<Value>()["code"], "PAYMENT_GATEWAY_ERROR");
}

#[tokio::test]
async fn test_reservation_lifecycle_over_http() {
    let harness = Harness::new();
    let tier = harness.ticket_tier(10, 1_000);
    let server = server(&harness);
    let owner = UserId::new();
    let (name, value) = user_header(owner);

    let created: Value = server
        .post("/api/purchases")
        .add_header(name.clone(), value.clone())
        .json(&json!({"items": [{"resourceId": tier.resource_id, "quantity": 2}]}))
        .await
        .json();
    let reservation_id = created["internalReservationId"].as_str().unwrap().to_string();
    let order_id = created["orderId"].as_str().unwrap().to_string();
    let path = format!("/api/reservations/{reservation_id}");

    let pending: Value = server
        .get(&path)
        .add_header(name.clone(), value.clone())
        .await
        .json();
    assert_eq!(pending["status"], "pending");
    assert_eq!(pending["payment"]["status"], "pending");
    assert_eq!(pending["tickets"].as_array().unwrap().len(), 0);

    let response = post_webhook(&server, "evt_1", payment_captured(&order_id, "pay_1")).await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["status"], "processed");

    let response = post_webhook(&server, "evt_1", payment_captured(&order_id, "pay_1")).await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["status"], "duplicate");

    let confirmed: Value = server
        .get(&path)
        .add_header(name, value)
        .await
        .json();
    assert_eq!(confirmed["status"], "confirmed");
    assert_eq!(confirmed["payment"]["status"], "captured");
    assert_eq!(confirmed["payment"]["providerPaymentId"], "pay_1");
    assert_eq!(confirmed["tickets"].as_array().unwrap().len(), 2);
    assert_eq!(confirmed["total"]["amount"], 2_000);

    // Someone else cannot see it.
    let (name, value) = user_header(UserId::new());
    server
        .get(&path)
        .add_header(name, value)
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_malformed_reservation_id_is_bad_request() {
    let harness = Harness::new();
    let server = server(&harness);
    let (name, value) = user_header(UserId::new());

    server
        .get("/api/reservations/not-a-uuid")
        .add_header(name, value)
        .await
        .assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_webhook_signature_is_required() {
    let harness = Harness::new();
    let tier = harness.ticket_tier(10, 1_000);
    let server = server(&harness);
    let (name, value) = user_header(UserId::new());
    let created: Value = server
        .post("/api/purchases")
        .add_header(name, value)
        .json(&json!({"resourceId": tier.resource_id, "quantity": 1}))
        .await
        .json();
    let order_id = created["orderId"].as_str().unwrap();

    let response = server
        .post("/webhooks/razorpay")
        .add_header(
            HeaderName::from_static(SIGNATURE_HEADER),
            HeaderValue::from_static("deadbeef"),
        )
        .bytes(Bytes::from(payment_failed(order_id)))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(response.json::<Value>()["code"], "SIGNATURE_INVALID");
    assert_eq!(harness.store.webhook_event_count(), 0);
    assert_eq!(harness.store.payments()[0].status.as_str(), "pending");
}

#[tokio::test]
async fn test_webhook_storage_failure_is_recovered_by_replay() {
    let harness = Harness::new();
    let tier = harness.ticket_tier(10, 1_000);
    let server = server(&harness);
    let (name, value) = user_header(UserId::new());
    let created: Value = server
        .post("/api/purchases")
        .add_header(name, value)
        .json(&json!({"resourceId": tier.resource_id, "quantity": 1}))
        .await
        .json();
    let order_id = created["orderId"].as_str().unwrap().to_string();

    harness.store.fail_next_transition();
    let response = post_webhook(&server, "evt_1", payment_captured(&order_id, "pay_1")).await;
    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);

    // A redelivery of the recorded id short-circuits; replay recovers it.
    let response = post_webhook(&server, "evt_1", payment_captured(&order_id, "pay_1")).await;
    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["status"], "duplicate");
    assert_eq!(harness.store.payments()[0].status.as_str(), "pending");

    let report = harness.reconciler().replay_unprocessed(10).await.unwrap();
    assert_eq!(report.processed, 1);
    assert_eq!(harness.store.payments()[0].status.as_str(), "captured");
}

#[tokio::test]
async fn test_correlation_id_is_echoed() {
    let harness = Harness::new();
    let server = server(&harness);

    let response = server
        .get("/health")
        .add_header(
            HeaderName::from_static("x-correlation-id"),
            HeaderValue::from_static("0b4c1c2e-5d0f-4d7a-9a59-3f0c4b2d6e11"),
        )
        .await;

    assert_eq!(
        response.header(CORRELATION_ID_HEADER),
        "0b4c1c2e-5d0f-4d7a-9a59-3f0c4b2d6e11"
    );
}
