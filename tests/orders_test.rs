mod common;

use axum::http::{Method, StatusCode};
use common::{response_json, TestApp};
use serde_json::json;

async fn checkout(app: &TestApp, token: &str, quantity: i64) {
    let response = app
        .request(
            Method::POST,
            "/api/v1/checkout",
            Some(json!({
                "address": { "line1": "1 Main St" },
                "items": [{ "product": "B", "quantity": quantity }]
            })),
            Some(token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn order_history_is_scoped_to_the_caller() {
    let app = TestApp::new().await;
    let alice = app.token_for("alice");
    let bob = app.token_for("bob");

    checkout(&app, &alice, 1).await;
    checkout(&app, &alice, 2).await;
    checkout(&app, &bob, 4).await;

    let response = app
        .request(Method::GET, "/api/v1/orders", None, Some(&alice))
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = response_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["total"], 2);
    assert_eq!(body["data"]["page"], 1);

    let orders = body["data"]["orders"].as_array().expect("orders array");
    assert_eq!(orders.len(), 2);
    let mut amounts: Vec<i64> = orders
        .iter()
        .map(|o| o["amount"].as_i64().expect("amount"))
        .collect();
    amounts.sort_unstable();
    // 250 + 5 and 500 + 10
    assert_eq!(amounts, vec![255, 510]);
    assert!(orders.iter().all(|o| o["payment_status"] == "pending"));
}

#[tokio::test]
async fn order_detail_hides_other_owners() {
    let app = TestApp::new().await;
    let alice = app.token_for("alice");
    let bob = app.token_for("bob");

    checkout(&app, &alice, 1).await;
    let order_id = app.orders_in_db().await[0].id;

    let own = app
        .request(
            Method::GET,
            &format!("/api/v1/orders/{order_id}"),
            None,
            Some(&alice),
        )
        .await;
    assert_eq!(own.status(), StatusCode::OK);
    let body = response_json(own).await;
    assert_eq!(body["data"]["id"], order_id.to_string());
    assert_eq!(body["data"]["items"], json!([{ "product": "B", "quantity": 1 }]));

    let foreign = app
        .request(
            Method::GET,
            &format!("/api/v1/orders/{order_id}"),
            None,
            Some(&bob),
        )
        .await;
    assert_eq!(foreign.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn page_zero_is_rejected() {
    let app = TestApp::new().await;
    let token = app.token_for("alice");

    let response = app
        .request(Method::GET, "/api/v1/orders?page=0", None, Some(&token))
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn order_history_requires_authentication() {
    let app = TestApp::new().await;

    let response = app.request(Method::GET, "/api/v1/orders", None, None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn health_and_openapi_are_public() {
    let app = TestApp::new().await;

    let health = app.request(Method::GET, "/health", None, None).await;
    assert_eq!(health.status(), StatusCode::OK);
    let body = response_json(health).await;
    assert_eq!(body["status"], "up");
    assert_eq!(body["database"]["status"], "up");

    let docs = app
        .request(Method::GET, "/api-docs/openapi.json", None, None)
        .await;
    assert_eq!(docs.status(), StatusCode::OK);
    let doc = response_json(docs).await;
    assert!(doc["paths"]["/api/v1/checkout"].is_object());
}
