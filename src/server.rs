//! Synchronous HTTP surface for external invocation.
//!
//! Two routes drive the pipeline for one event id, authenticated by a
//! shared-secret `x-api-key` header. Outcomes map onto the error
//! taxonomy: 401 for a credential mismatch, 404 for a missing event, 400
//! for a malformed event id, and 500 with a redacted message for
//! everything else (the full error is logged server-side).

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info};

use crate::error::PipelineError;
use crate::models::EventUpdate;
use crate::pipeline::{PipelineDeps, run_research, run_update_check};

const API_KEY_HEADER: &str = "x-api-key";

#[derive(Clone)]
pub struct AppState {
    deps: Arc<PipelineDeps>,
    shared_secret: Arc<String>,
}

impl AppState {
    pub fn new(deps: Arc<PipelineDeps>, shared_secret: String) -> Self {
        Self { deps, shared_secret: Arc::new(shared_secret) }
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/events/{id}/research", post(research))
        .route("/api/events/{id}/updates", post(updates))
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

#[derive(Debug, Serialize)]
struct UpdateResponse {
    update: Option<EventUpdate>,
}

async fn health() -> &'static str {
    "ok"
}

async fn research(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if let Err(denied) = authorize(&state, &headers) {
        return denied;
    }
    info!(%event_id, "Research requested");
    match run_research(&state.deps, &event_id).await {
        Ok(summary) => (StatusCode::OK, Json(summary)).into_response(),
        Err(e) => error_response(&event_id, e),
    }
}

async fn updates(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    if let Err(denied) = authorize(&state, &headers) {
        return denied;
    }
    info!(%event_id, "Update check requested");
    match run_update_check(&state.deps, &event_id).await {
        Ok(update) => (StatusCode::OK, Json(UpdateResponse { update })).into_response(),
        Err(e) => error_response(&event_id, e),
    }
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), Response> {
    let presented = headers
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if presented == state.shared_secret.as_str() && !presented.is_empty() {
        Ok(())
    } else {
        Err((
            StatusCode::UNAUTHORIZED,
            Json(ErrorBody {
                error: "unauthorized",
                message: "missing or invalid api key".to_string(),
            }),
        )
            .into_response())
    }
}

fn error_response(event_id: &str, e: PipelineError) -> Response {
    let status = match &e {
        PipelineError::EventNotFound(_) => StatusCode::NOT_FOUND,
        PipelineError::InvalidEventId(_) => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    // Internal failure detail stays in the logs, not the response.
    let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!(%event_id, error = %e, kind = e.kind(), "Pipeline run failed");
        "pipeline run failed".to_string()
    } else {
        e.to_string()
    };
    (status, Json(ErrorBody { error: e.kind(), message })).into_response()
}
