//! Full order lifecycle exercised through the HTTP router: catalog setup,
//! cart merge, checkout, processor webhooks, and history reads.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use storefront_api::config::AppConfig;
use storefront_api::payments::mock::MockPaymentProcessor;
use storefront_api::store::memory::MemoryStore;
use storefront_api::{app_router, AppServices, AppState};

const USER_HEADER: &str = "x-authenticated-user";

fn test_app() -> (Router, Arc<MockPaymentProcessor>) {
    let store = Arc::new(MemoryStore::new());
    let processor = Arc::new(MockPaymentProcessor::new());
    let config = Arc::new(AppConfig::default());
    let services = Arc::new(AppServices::new(
        store.clone(),
        store,
        processor.clone(),
        &config,
    ));
    (app_router(AppState { config, services }), processor)
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    user: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(user) = user {
        builder = builder.header(USER_HEADER, user);
    }
    let request = match body {
        Some(value) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(value.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::String(
            String::from_utf8_lossy(&bytes).into_owned(),
        ))
    };
    (status, value)
}

async fn seed_product(app: &Router, id: &str, price: f64) {
    let (status, _) = send(
        app,
        Method::POST,
        "/api/v1/products",
        None,
        Some(json!({ "id": id, "name": format!("Product {id}"), "category": "misc", "price": price })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
}

fn webhook(kind: &str, intent_id: &str, user: &str) -> Value {
    json!({
        "type": kind,
        "data": { "object": { "id": intent_id, "metadata": { "user": user } } }
    })
}

#[tokio::test]
async fn cart_checkout_and_payment_lifecycle() {
    let (app, processor) = test_app();
    seed_product(&app, "p1", 100.0).await;
    seed_product(&app, "p2", 200.0).await;

    // merge a device cart into the account cart
    let (status, cart) = send(
        &app,
        Method::POST,
        "/api/v1/cart/merge",
        Some("alice"),
        Some(json!({ "items": [
            { "productId": "p1", "count": 1 },
            { "productId": "p2", "count": 2 }
        ]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cart["orders"].as_array().unwrap().len(), 2);
    assert_eq!(cart["status"], "IN CART");
    assert_eq!(cart["intent"], "cart");

    // checkout opens a payment intent for the derived total
    let (status, receipt) = send(
        &app,
        Method::POST,
        "/api/v1/checkout",
        Some("alice"),
        Some(json!({ "address": "1 Main St", "country": "US" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(receipt["amount"], json!(500.0));
    assert!(receipt["clientSecret"].as_str().unwrap().ends_with("_secret"));
    let calls = processor.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].amount_minor, 50000);

    // the processor confirms intent creation; the cart becomes an order
    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/payments/webhook",
        None,
        Some(webhook("payment_intent.created", "pi_mock_1", "alice")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, page) = send(
        &app,
        Method::GET,
        "/api/v1/orders?filter=requested",
        Some("alice"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let orders = page["orders"].as_array().unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0]["intent"], "pi_mock_1");
    assert_eq!(orders[0]["status"], "PAYMENT CREATED");
    assert_eq!(orders[0]["location"]["country"], "US");

    // the cart key is free again
    let (status, cart) = send(&app, Method::GET, "/api/v1/cart", Some("alice"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(cart["orders"].as_array().unwrap().is_empty());

    // payment settles
    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/payments/webhook",
        None,
        Some(webhook("payment_intent.succeeded", "pi_mock_1", "alice")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, page) = send(
        &app,
        Method::GET,
        "/api/v1/orders?filter=succeeded",
        Some("alice"),
        None,
    )
    .await;
    let orders = page["orders"].as_array().unwrap();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0]["status"], "PAYMENT SUCCEEDED");
    assert_eq!(orders[0]["amount"], json!(500.0));

    let (_, order) = send(
        &app,
        Method::GET,
        "/api/v1/orders/pi_mock_1",
        Some("alice"),
        None,
    )
    .await;
    assert_eq!(order["logs"], "-");
}

#[tokio::test]
async fn cart_endpoints_require_authentication() {
    let (app, _) = test_app();
    for (method, uri) in [
        (Method::GET, "/api/v1/cart"),
        (Method::GET, "/api/v1/orders"),
        (Method::POST, "/api/v1/checkout"),
    ] {
        let (status, body) = send(&app, method, uri, None, Some(json!({}))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
        assert_eq!(body["error"], "Unauthorized");
    }
}

#[tokio::test]
async fn checkout_with_empty_cart_is_rejected() {
    let (app, processor) = test_app();

    // merging nothing persists an empty cart row
    let (status, _) = send(
        &app,
        Method::POST,
        "/api/v1/cart/merge",
        Some("alice"),
        Some(json!({ "items": [] })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/checkout",
        Some("alice"),
        Some(json!({ "address": "1 Main St", "country": "US" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "no order");
    assert!(processor.calls().is_empty());
}

#[tokio::test]
async fn unknown_webhook_kinds_are_acknowledged_without_effect() {
    let (app, _) = test_app();
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/payments/webhook",
        None,
        Some(webhook("charge.refund.updated", "re_1", "alice")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("ok".into()));
}

#[tokio::test]
async fn invalid_history_cursor_is_a_bad_request() {
    let (app, _) = test_app();
    let (status, body) = send(
        &app,
        Method::GET,
        "/api/v1/orders?cursor=not-json",
        Some("alice"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "invalid cursor");
}

#[tokio::test]
async fn health_endpoint_is_open() {
    let (app, _) = test_app();
    let (status, body) = send(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, Value::String("ok".into()));
}
