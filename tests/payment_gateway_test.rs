//! HTTP gateway client against a mock session endpoint.

use std::time::Duration;

use assert_matches::assert_matches;
use checkout_api::services::payment_gateway::{
    CorrelationPayload, GatewayError, GatewayLineItem, HttpPaymentGateway, PaymentGateway,
    SessionRequest,
};
use serde_json::json;
use uuid::Uuid;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const SECRET_KEY: &str = "sk_test_checkout";

fn session_request(order_id: Uuid) -> SessionRequest {
    SessionRequest {
        line_items: vec![
            GatewayLineItem {
                name: "Alpha".into(),
                unit_amount: 50_000,
                quantity: 2,
            },
            GatewayLineItem {
                name: "Beta".into(),
                unit_amount: 25_000,
                quantity: 1,
            },
        ],
        currency: "usd".into(),
        success_url: "https://shop.example/order-placed".into(),
        cancel_url: "https://shop.example/cart".into(),
        correlation: CorrelationPayload::new(order_id, "user_1"),
        idempotency_key: SessionRequest::idempotency_key_for(order_id),
    }
}

fn gateway(server: &MockServer) -> HttpPaymentGateway {
    HttpPaymentGateway::new(server.uri(), Some(SECRET_KEY.into()), Duration::from_secs(5))
        .expect("gateway client")
}

#[tokio::test]
async fn creates_session_with_form_encoded_lines() {
    let server = MockServer::start().await;
    let order_id = Uuid::new_v4();

    Mock::given(method("POST"))
        .and(path("/v1/checkout/sessions"))
        .and(header("authorization", format!("Bearer {SECRET_KEY}").as_str()))
        .and(header(
            "idempotency-key",
            format!("checkout-session-{order_id}").as_str(),
        ))
        .and(body_string_contains("mode=payment"))
        .and(body_string_contains(
            "line_items%5B0%5D%5Bprice_data%5D%5Bunit_amount%5D=50000",
        ))
        .and(body_string_contains(
            "line_items%5B1%5D%5Bprice_data%5D%5Bproduct_data%5D%5Bname%5D=Beta",
        ))
        .and(body_string_contains("line_items%5B0%5D%5Bquantity%5D=2"))
        .and(body_string_contains(format!(
            "metadata%5Border_id%5D={order_id}"
        )))
        .and(body_string_contains("metadata%5Buser_id%5D=user_1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": "cs_test_123",
            "url": "https://checkout.stripe.com/c/pay/cs_test_123"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let session = gateway(&server)
        .create_session(&session_request(order_id))
        .await
        .expect("session created");

    assert_eq!(session.id, "cs_test_123");
    assert_eq!(session.url, "https://checkout.stripe.com/c/pay/cs_test_123");
}

#[tokio::test]
async fn non_success_status_is_rejected() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/checkout/sessions"))
        .respond_with(
            ResponseTemplate::new(402).set_body_json(json!({"error": {"message": "card declined"}})),
        )
        .mount(&server)
        .await;

    let result = gateway(&server)
        .create_session(&session_request(Uuid::new_v4()))
        .await;

    assert_matches!(result, Err(GatewayError::Rejected { status: 402, body }) if body.contains("card declined"));
}

#[tokio::test]
async fn session_without_url_is_unusable() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/checkout/sessions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": "cs_test_1" })))
        .mount(&server)
        .await;

    let result = gateway(&server)
        .create_session(&session_request(Uuid::new_v4()))
        .await;

    assert_matches!(result, Err(GatewayError::InvalidResponse(_)));
}

#[tokio::test]
async fn missing_secret_key_fails_before_any_request() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let client = HttpPaymentGateway::new(server.uri(), None, Duration::from_secs(5))
        .expect("gateway client");
    let result = client.create_session(&session_request(Uuid::new_v4())).await;

    assert_matches!(result, Err(GatewayError::NotConfigured(_)));
}

#[tokio::test]
async fn unreachable_gateway_is_a_transport_error() {
    let client = HttpPaymentGateway::new(
        "http://127.0.0.1:9",
        Some(SECRET_KEY.into()),
        Duration::from_millis(500),
    )
    .expect("gateway client");

    let result = client.create_session(&session_request(Uuid::new_v4())).await;
    assert_matches!(result, Err(GatewayError::Transport(_)));
}
