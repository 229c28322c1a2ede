//! REST API tests through the full router (no network)

use axum::body::{Body, to_bytes};
use http::{Request, StatusCode};
use order_hub::{Config, ServerState, api::build_app};
use rust_decimal::Decimal;
use serde_json::{Value, json};
use shared::message::{CreateOrderRequest, NewLineItem};
use shared::order::CustomerSnapshot;
use shared::{Order, OrderStatus};
use tower::ServiceExt;

fn state() -> ServerState {
    let mut config = Config::with_overrides(0);
    config.live_access_token = Some("desk-token".into());
    config.default_list_limit = 50;
    config.max_list_limit = 200;
    ServerState::new(config)
}

fn place(state: &ServerState, name: &str) -> Order {
    state
        .orders
        .create(CreateOrderRequest {
            customer: CustomerSnapshot {
                name: name.into(),
                ..Default::default()
            },
            items: vec![NewLineItem::new("p-1", 1, Decimal::new(1999, 2))],
            ..Default::default()
        })
        .unwrap()
}

async fn call(state: &ServerState, request: Request<Body>) -> (StatusCode, Value) {
    let response = build_app(state.clone()).oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_list_orders_envelope() {
    let state = state();
    place(&state, "First");
    place(&state, "Second");

    let (status, body) = call(&state, get("/api/orders")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let (_, body) = call(&state, get("/api/orders?limit=1")).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (_, body) = call(&state, get("/api/orders?status=shipped")).await;
    assert!(body["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_get_by_id_and_number() {
    let state = state();
    let order = place(&state, "Lookup");
    let number = order.order_number.clone().unwrap();

    let (status, body) = call(&state, get(&format!("/api/orders/{}", order.id))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], order.id.as_str());

    let (status, body) = call(&state, get(&format!("/api/orders/number/{}", number))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["id"], order.id.as_str());

    let (status, body) = call(&state, get("/api/orders/000000000000000000000000")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert!(body["error"].as_str().unwrap().contains("not found"));
}

#[tokio::test]
async fn test_patch_status_legal() {
    let state = state();
    let order = place(&state, "Patch");

    let (status, body) = call(
        &state,
        json_request(
            "PATCH",
            &format!("/api/orders/{}/status", order.id),
            json!({ "status": "confirmed", "note": "called customer" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "confirmed");
    let history = body["data"]["statusHistory"].as_array().unwrap();
    assert_eq!(history.last().unwrap()["note"], "called customer");

    assert_eq!(state.orders.get(&order.id).unwrap().status, OrderStatus::Confirmed);
}

#[tokio::test]
async fn test_patch_status_illegal_is_422() {
    let state = state();
    let order = place(&state, "Skip");

    let (status, body) = call(
        &state,
        json_request(
            "PATCH",
            &format!("/api/orders/{}/status", order.id),
            json!({ "status": "delivered" }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Cannot move order from pending to delivered");
    assert_eq!(state.orders.get(&order.id).unwrap().status, OrderStatus::Pending);
}

#[tokio::test]
async fn test_create_order() {
    let state = state();
    let mut live = state.live.subscribe();

    let (status, body) = call(
        &state,
        json_request(
            "POST",
            "/api/orders",
            json!({
                "customer": { "name": "Meera" },
                "items": [
                    { "product": "p-9", "productName": "Lamp", "quantity": 3, "unitPrice": 10.0 }
                ],
                "paymentMethod": "upi",
                "shipping": 5.0
            }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "pending");
    assert_eq!(body["data"]["pricing"]["finalAmount"].as_f64(), Some(35.0));

    let frame = live.recv().await.unwrap();
    assert_eq!(frame.event_name(), "order:created");
}

#[tokio::test]
async fn test_create_order_rejects_empty_items() {
    let state = state();
    let (status, body) = call(
        &state,
        json_request(
            "POST",
            "/api/orders",
            json!({ "customer": { "name": "Nobody" }, "items": [] }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
    assert!(state.orders.repository().is_empty());
}

#[tokio::test]
async fn test_live_requires_token() {
    let state = state();

    let (status, body) = call(&state, get("/api/live")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);

    let (status, _) = call(&state, get("/api/live?token=wrong")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_health() {
    let state = state();
    place(&state, "Counted");

    let (status, body) = call(&state, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["orders"], 1);
}
