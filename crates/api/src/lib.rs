//! HTTP API server with observability for the saga orchestration
//! system.
//!
//! Exposes the orchestrator's programmatic boundary over REST, with
//! structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use metrics_exporter_prometheus::PrometheusHandle;
use saga::place_order::{self, PlaceOrderServices};
use saga::services::{
    InMemoryNotificationService, InMemoryOrderStore, InMemoryPaymentService,
    InMemoryRestaurantService, ResilientPaymentService,
};
use saga::{InMemoryEventPublisher, SagaOrchestrator};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::orders::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app(state: Arc<AppState>, metrics_handle: PrometheusHandle) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::render))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/orders", post(routes::orders::place))
        .route("/executions", get(routes::orders::list_executions))
        .route("/executions/{id}", get(routes::orders::get_execution))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Handles on the in-memory collaborator services behind the default
/// state, for tests and local failure injection.
#[derive(Clone)]
pub struct DefaultServices {
    pub restaurant: InMemoryRestaurantService,
    pub orders: InMemoryOrderStore,
    pub payments: InMemoryPaymentService,
    pub notifications: InMemoryNotificationService,
    pub publisher: InMemoryEventPublisher,
}

/// Creates the default application state: an orchestrator with the
/// place_order saga registered over in-memory services, the payment
/// provider guarded by its circuit breaker.
pub fn create_default_state() -> (Arc<AppState>, DefaultServices) {
    let services = DefaultServices {
        restaurant: InMemoryRestaurantService::new(),
        orders: InMemoryOrderStore::new(),
        payments: InMemoryPaymentService::new(),
        notifications: InMemoryNotificationService::new(),
        publisher: InMemoryEventPublisher::new(),
    };

    let orchestrator = SagaOrchestrator::new();
    orchestrator
        .register(place_order::definition(PlaceOrderServices {
            restaurant: Arc::new(services.restaurant.clone()),
            orders: Arc::new(services.orders.clone()),
            payments: Arc::new(ResilientPaymentService::new(services.payments.clone())),
            notifications: Arc::new(services.notifications.clone()),
            publisher: Arc::new(services.publisher.clone()),
        }))
        .expect("place_order definition has steps");

    let state = Arc::new(AppState {
        orchestrator: Arc::new(orchestrator),
    });

    (state, services)
}
