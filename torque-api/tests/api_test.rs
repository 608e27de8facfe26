use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use torque_api::state::{AppState, AuthConfig};
use torque_api::{app, auth::issue_token};
use torque_core::repository::UserRepository;
use torque_core::user::User;
use torque_order::OrderService;
use torque_storage::SimulatedImageStore;
use torque_store::MemoryStore;

const SECRET: &str = "test-secret";

async fn test_app() -> (Router, MemoryStore) {
    let store = MemoryStore::new();
    let orders = Arc::new(OrderService::new(
        Arc::new(store.clone()),
        Arc::new(store.clone()),
        Arc::new(SimulatedImageStore::new("maintenance-images", "us-east-1")),
    ));
    let state = AppState {
        categories: Arc::new(store.clone()),
        items: Arc::new(store.clone()),
        users: Arc::new(store.clone()),
        orders,
        auth: AuthConfig {
            secret: SECRET.to_string(),
            expiration: 3600,
        },
    };
    (app(state), store)
}

async fn token_for(store: &MemoryStore, is_admin: bool) -> String {
    let user = User {
        id: Uuid::new_v4(),
        email: format!("user-{}@example.com", Uuid::new_v4().simple()),
        hashed_password: "x".to_string(),
        is_admin,
        is_active: true,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };
    store
        .create_user(torque_core::user::NewUser {
            email: user.email.clone(),
            hashed_password: user.hashed_password.clone(),
            is_admin,
        })
        .await
        .unwrap();
    let stored = store
        .get_user_by_email(&user.email)
        .await
        .unwrap()
        .unwrap();
    issue_token(SECRET, 3600, &stored).unwrap()
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn seed_item(app: &Router, token: &str, sku: &str, price: &str, stock: i32) -> Uuid {
    let (status, body) = send(
        app,
        Method::POST,
        "/items",
        Some(token),
        Some(json!({
            "name": format!("Part {}", sku),
            "sku": sku,
            "price": price,
            "stock": stock,
            "category_id": null,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_str().unwrap().parse().unwrap()
}

#[tokio::test]
async fn health_is_public() {
    let (app, _) = test_app().await;
    let (status, body) = send(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn register_login_me_flow() {
    let (app, _) = test_app().await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/auth/register",
        None,
        Some(json!({"email": "tech@example.com", "password": "wrenches123"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["email"], "tech@example.com");
    assert_eq!(body["is_admin"], false);
    assert!(body.get("hashed_password").is_none());

    let (status, body) = send(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({"email": "tech@example.com", "password": "wrenches123"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["access_token"].as_str().unwrap().to_string();
    assert_eq!(body["token_type"], "bearer");

    let (status, body) = send(&app, Method::GET, "/auth/me", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], "tech@example.com");
}

#[tokio::test]
async fn login_rejects_bad_password() {
    let (app, _) = test_app().await;

    send(
        &app,
        Method::POST,
        "/auth/register",
        None,
        Some(json!({"email": "tech@example.com", "password": "wrenches123"})),
    )
    .await;

    let (status, _) = send(
        &app,
        Method::POST,
        "/auth/login",
        None,
        Some(json!({"email": "tech@example.com", "password": "wrong-password"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn protected_routes_require_a_token() {
    let (app, _) = test_app().await;

    let (status, _) = send(&app, Method::GET, "/items", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, Method::GET, "/orders", Some("not-a-jwt"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn catalog_crud_flow() {
    let (app, store) = test_app().await;
    let token = token_for(&store, false).await;

    let (status, category) = send(
        &app,
        Method::POST,
        "/categories",
        Some(&token),
        Some(json!({"name": "Filters", "description": "Oil and air filters"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let category_id = category["id"].as_str().unwrap();

    let (status, item) = send(
        &app,
        Method::POST,
        "/items",
        Some(&token),
        Some(json!({
            "name": "Oil filter",
            "sku": "FIL-001",
            "price": "8.99",
            "stock": 5,
            "category_id": category_id,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let item_id = item["id"].as_str().unwrap().to_string();

    let (status, fetched) = send(&app, Method::GET, "/items/sku/FIL-001", Some(&token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["id"].as_str().unwrap(), item_id);
    assert_eq!(fetched["category"]["name"], "Filters");

    let (status, patched) = send(
        &app,
        Method::PATCH,
        &format!("/items/{}", item_id),
        Some(&token),
        Some(json!({"stock": 12})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(patched["stock"], 12);

    // Duplicate SKU is a conflict
    let (status, _) = send(
        &app,
        Method::POST,
        "/items",
        Some(&token),
        Some(json!({
            "name": "Another filter",
            "sku": "FIL-001",
            "price": "9.99",
            "stock": 1,
            "category_id": null,
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn deletes_require_admin() {
    let (app, store) = test_app().await;
    let token = token_for(&store, false).await;
    let admin = token_for(&store, true).await;
    let item_id = seed_item(&app, &token, "PMP-100", "49.99", 3).await;

    let (status, _) = send(
        &app,
        Method::DELETE,
        &format!("/items/{}", item_id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = send(
        &app,
        Method::DELETE,
        &format!("/items/{}", item_id),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

fn order_body(request_id: &str, item_id: Uuid, quantity: i32) -> Value {
    json!({
        "request_id": request_id,
        "technical_report": {
            "title": "Hydraulic pump failure",
            "description": "Pump seal worn, pressure dropping under load",
            "diagnosis": "Seal kit replacement required",
        },
        "items": [{"item_id": item_id, "quantity": quantity}],
    })
}

#[tokio::test]
async fn order_creation_is_idempotent_over_http() {
    let (app, store) = test_app().await;
    let token = token_for(&store, false).await;
    let item_id = seed_item(&app, &token, "PMP-100", "49.99", 10).await;

    let (status, first) = send(
        &app,
        Method::POST,
        "/orders",
        Some(&token),
        Some(order_body("REQ-1", item_id, 3)),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(first["status"], "pending");
    assert_eq!(first["total_amount"], "149.97");

    let (status, second) = send(
        &app,
        Method::POST,
        "/orders",
        Some(&token),
        Some(order_body("REQ-1", item_id, 3)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(second["id"], first["id"]);

    // Stock decremented only once
    let (_, item) = send(
        &app,
        Method::GET,
        &format!("/items/{}", item_id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(item["stock"], 7);
}

#[tokio::test]
async fn order_with_image_stores_a_url() {
    let (app, store) = test_app().await;
    let token = token_for(&store, false).await;
    let item_id = seed_item(&app, &token, "PMP-100", "49.99", 10).await;

    let mut body = order_body("REQ-IMG", item_id, 1);
    body["image"] = json!({
        "data": STANDARD.encode(b"photo bytes"),
        "content_type": "image/png",
    });

    let (status, order) = send(&app, Method::POST, "/orders", Some(&token), Some(body)).await;
    assert_eq!(status, StatusCode::CREATED);
    let url = order["image_url"].as_str().unwrap();
    assert!(url.contains("maintenance-images/REQ-IMG/"));
}

#[tokio::test]
async fn insufficient_stock_is_unprocessable() {
    let (app, store) = test_app().await;
    let token = token_for(&store, false).await;
    let item_id = seed_item(&app, &token, "FIL-001", "8.99", 2).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/orders",
        Some(&token),
        Some(order_body("REQ-2", item_id, 3)),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().contains("insufficient stock"));
}

#[tokio::test]
async fn status_lifecycle_over_http() {
    let (app, store) = test_app().await;
    let token = token_for(&store, false).await;
    let item_id = seed_item(&app, &token, "BRG-300", "7.50", 10).await;

    let (_, order) = send(
        &app,
        Method::POST,
        "/orders",
        Some(&token),
        Some(order_body("REQ-3", item_id, 4)),
    )
    .await;
    let order_id = order["id"].as_str().unwrap().to_string();

    // pending -> completed is rejected
    let (status, _) = send(
        &app,
        Method::PATCH,
        &format!("/orders/{}/status", order_id),
        Some(&token),
        Some(json!({"status": "completed"})),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, updated) = send(
        &app,
        Method::PATCH,
        &format!("/orders/{}/status", order_id),
        Some(&token),
        Some(json!({"status": "cancelled"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["status"], "cancelled");

    // Cancellation restored stock
    let (_, item) = send(
        &app,
        Method::GET,
        &format!("/items/{}", item_id),
        Some(&token),
        None,
    )
    .await;
    assert_eq!(item["stock"], 10);
}

#[tokio::test]
async fn order_accepts_free_text_report() {
    let (app, store) = test_app().await;
    let token = token_for(&store, false).await;
    let item_id = seed_item(&app, &token, "CMP-400", "120.00", 5).await;

    let (status, order) = send(
        &app,
        Method::POST,
        "/orders",
        Some(&token),
        Some(json!({
            "request_id": "REQ-TEXT",
            "technical_report": "Compressor rattling at idle, mounts loose",
            "items": [{"item_id": item_id, "quantity": 1}],
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(
        order["technical_report"]["description"],
        "Compressor rattling at idle, mounts loose"
    );
}

#[tokio::test]
async fn orders_can_be_fetched_by_request_id() {
    let (app, store) = test_app().await;
    let token = token_for(&store, false).await;
    let item_id = seed_item(&app, &token, "PMP-100", "49.99", 10).await;

    send(
        &app,
        Method::POST,
        "/orders",
        Some(&token),
        Some(order_body("REQ-LOOKUP", item_id, 1)),
    )
    .await;

    let (status, order) = send(
        &app,
        Method::GET,
        "/orders/request/REQ-LOOKUP",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(order["request_id"], "REQ-LOOKUP");

    let (status, _) = send(
        &app,
        Method::GET,
        "/orders/request/REQ-MISSING",
        Some(&token),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
