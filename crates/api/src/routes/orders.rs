//! Order placement and saga execution endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use saga::place_order::{self, OrderRequest};
use saga::{SagaExecution, SagaOrchestrator, SagaResult};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState {
    pub orchestrator: Arc<SagaOrchestrator<OrderRequest>>,
}

#[derive(Debug, Deserialize)]
pub struct ExecutionsQuery {
    pub saga: String,
}

/// Failure body returned when a saga did not complete: the caller sees
/// exactly how much was unwound.
#[derive(Serialize)]
pub struct SagaFailureResponse {
    pub error: String,
    pub details: SagaFailureDetails,
    pub compensated_steps: Vec<String>,
}

#[derive(Serialize)]
pub struct SagaFailureDetails {
    pub execution_id: String,
    pub completed_steps: Vec<String>,
    pub compensation_failures: Vec<saga::CompensationFailure>,
}

/// POST /orders — runs the place_order saga with the request as its
/// context. A failed saga maps to 422 after compensation has run.
#[tracing::instrument(skip(state, request))]
pub async fn place(
    State(state): State<Arc<AppState>>,
    Json(request): Json<OrderRequest>,
) -> Result<Response, ApiError> {
    let result = state
        .orchestrator
        .execute(place_order::SAGA_NAME, request)
        .await?;

    Ok(saga_result_response(result))
}

/// GET /executions/{id} — returns one execution snapshot.
#[tracing::instrument(skip(state))]
pub async fn get_execution(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<SagaExecution>, ApiError> {
    let uuid = uuid::Uuid::parse_str(&id)
        .map_err(|e| ApiError::BadRequest(format!("invalid execution id: {e}")))?;

    let execution = state
        .orchestrator
        .get_execution(common::ExecutionId::from_uuid(uuid))
        .await
        .ok_or_else(|| ApiError::NotFound(format!("execution {id} not found")))?;

    Ok(Json(execution))
}

/// GET /executions?saga=name — lists executions of one saga.
#[tracing::instrument(skip(state))]
pub async fn list_executions(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ExecutionsQuery>,
) -> Json<Vec<SagaExecution>> {
    Json(state.orchestrator.get_executions(&query.saga).await)
}

fn saga_result_response(result: SagaResult) -> Response {
    if result.success {
        return (StatusCode::OK, Json(result)).into_response();
    }

    let body = SagaFailureResponse {
        error: result.error.unwrap_or_else(|| "saga failed".to_string()),
        details: SagaFailureDetails {
            execution_id: result.execution_id.to_string(),
            completed_steps: result.completed_steps,
            compensation_failures: result.compensation_failures,
        },
        compensated_steps: result.compensated_steps,
    };
    (StatusCode::UNPROCESSABLE_ENTITY, Json(body)).into_response()
}
