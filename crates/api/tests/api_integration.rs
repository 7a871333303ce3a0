//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use metrics_exporter_prometheus::PrometheusHandle;
use tower::ServiceExt;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn setup() -> (axum::Router, Arc<api::routes::orders::AppState>, api::DefaultServices) {
    let (state, services) = api::create_default_state();
    let app = api::create_app(state.clone(), get_metrics_handle());
    (app, state, services)
}

fn order_body() -> Body {
    Body::from(
        serde_json::to_string(&serde_json::json!({
            "customer_id": "CUST-1",
            "restaurant_id": "REST-1",
            "items": [{
                "name": "Margherita",
                "quantity": 2,
                "unit_price_cents": 1200
            }]
        }))
        .unwrap(),
    )
}

fn place_order_request() -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/orders")
        .header("content-type", "application/json")
        .body(order_body())
        .unwrap()
}

async fn response_json(response: axum::response::Response) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let (app, _, _) = setup();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = response_json(response).await;
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_place_order_success() {
    let (app, _, services) = setup();

    let response = app.oneshot(place_order_request()).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = response_json(response).await;
    assert_eq!(json["success"], true);
    assert_eq!(
        json["completed_steps"],
        serde_json::json!(["validate", "create", "pay", "notify"])
    );
    assert!(json["execution_id"].as_str().is_some());

    assert_eq!(services.orders.order_count(), 1);
    assert_eq!(services.payments.payment_count(), 1);
}

#[tokio::test]
async fn test_get_execution_after_placing_order() {
    let (app, _, _) = setup();

    let place_response = app.clone().oneshot(place_order_request()).await.unwrap();
    let placed = response_json(place_response).await;
    let execution_id = placed["execution_id"].as_str().unwrap().to_string();

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/executions/{execution_id}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = response_json(response).await;
    assert_eq!(json["saga_name"], "place_order");
    assert_eq!(json["status"], "completed");
}

#[tokio::test]
async fn test_list_executions_by_saga() {
    let (app, _, _) = setup();

    app.clone().oneshot(place_order_request()).await.unwrap();
    app.clone().oneshot(place_order_request()).await.unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/executions?saga=place_order")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = response_json(response).await;
    assert_eq!(json.as_array().unwrap().len(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_failed_saga_returns_unwind_details() {
    let (app, _, services) = setup();
    services.payments.set_fail_on_capture(true);

    let response = app.oneshot(place_order_request()).await.unwrap();

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let json = response_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("payment"));
    assert_eq!(
        json["compensated_steps"],
        serde_json::json!(["create", "validate"])
    );
    assert_eq!(
        json["details"]["completed_steps"],
        serde_json::json!(["validate", "create"])
    );

    // Compensation already ran by the time the response is built.
    assert_eq!(services.orders.order_count(), 0);
    assert_eq!(services.payments.payment_count(), 0);
}

#[tokio::test]
async fn test_unknown_execution_is_not_found() {
    let (app, _, _) = setup();

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/executions/{}", uuid::Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_invalid_execution_id_is_bad_request() {
    let (app, _, _) = setup();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/executions/not-a-uuid")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_metrics_endpoint_renders() {
    let (app, _, _) = setup();

    // Run one saga so orchestrator metrics exist.
    app.clone().oneshot(place_order_request()).await.unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/metrics")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("saga_executions_total"));
}