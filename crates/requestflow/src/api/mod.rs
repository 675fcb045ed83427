use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::api::models::ExecutionListItem;
use crate::events::{EventBus, RequestCreated};
use crate::executions::store::ExecutionStore;

pub mod models;

#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<dyn ExecutionStore>,
    pub bus: Arc<EventBus>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        // Read-only query surface
        .route("/executions", get(list_executions))
        .route("/executions/:id", get(get_execution))
        .route("/requests/:request_id/execution", get(get_by_request))
        // Ops-facing event injection (local bus deployments)
        .route("/events/request-created", post(inject_request_created))
        // Health
        .route("/health", get(health))
        .with_state(state)
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

fn internal_err(e: anyhow::Error) -> (StatusCode, String) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        format!("internal error: {e}"),
    )
}

#[derive(Debug, Deserialize)]
pub struct ListExecutionsQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub cursor_created_at: Option<DateTime<Utc>>,
    pub cursor_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct ListExecutionsResponse {
    pub items: Vec<ExecutionListItem>,
    pub next_cursor_created_at: Option<DateTime<Utc>>,
    pub next_cursor_id: Option<Uuid>,
}

pub async fn list_executions(
    State(state): State<ApiState>,
    Query(q): Query<ListExecutionsQuery>,
) -> Result<Json<ListExecutionsResponse>, (StatusCode, String)> {
    let cursor = match (q.cursor_created_at, q.cursor_id) {
        (Some(ca), Some(cid)) => Some((ca, cid)),
        _ => None,
    };

    let rows = state
        .store
        .list(q.status.as_deref(), q.limit.unwrap_or(100), cursor)
        .await
        .map_err(internal_err)?;

    let (next_cursor_created_at, next_cursor_id) = rows
        .last()
        .map(|x| (Some(x.created_at), Some(x.id)))
        .unwrap_or((None, None));

    Ok(Json(ListExecutionsResponse {
        items: rows.into_iter().map(ExecutionListItem::from).collect(),
        next_cursor_created_at,
        next_cursor_id,
    }))
}

pub async fn get_execution(
    Path(id): Path<Uuid>,
    State(state): State<ApiState>,
) -> impl IntoResponse {
    match state.store.get(id).await {
        Ok(Some(job)) => (StatusCode::OK, Json(job)).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ErrorBody {
                error: "execution not found".into(),
            }),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorBody {
                error: format!("internal error: {e}"),
            }),
        )
            .into_response(),
    }
}

pub async fn get_by_request(
    Path(request_id): Path<Uuid>,
    State(state): State<ApiState>,
) -> impl IntoResponse {
    match state.store.get_by_request(request_id).await {
        Ok(Some(job)) => (StatusCode::OK, Json(job)).into_response(),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ErrorBody {
                error: "no execution for request".into(),
            }),
        )
            .into_response(),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorBody {
                error: format!("internal error: {e}"),
            }),
        )
            .into_response(),
    }
}

#[derive(Debug, Serialize)]
pub struct InjectResponse {
    pub accepted: bool,
    pub request_id: Uuid,
}

pub async fn inject_request_created(
    State(state): State<ApiState>,
    Json(event): Json<RequestCreated>,
) -> (StatusCode, Json<InjectResponse>) {
    let request_id = event.request_id;
    state.bus.publish_request_created(event);
    (
        StatusCode::ACCEPTED,
        Json(InjectResponse {
            accepted: true,
            request_id,
        }),
    )
}

pub async fn health(State(state): State<ApiState>) -> impl IntoResponse {
    match state.store.ping().await {
        Ok(()) => (StatusCode::OK, "ok").into_response(),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            format!("store unreachable: {e}"),
        )
            .into_response(),
    }
}
