use crate::infra::{AppState, BackendError, InMemoryBackend};
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};
use processo_seletivo::workflows::inscricao::{
    CreateDraftRequest, InscricaoId, PositionId, ProcessId, SaveAnswersRequest,
};
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
pub(crate) struct DraftQuery {
    pub(crate) vaga: String,
}

/// Process backend endpoints consumed by the form engine.
pub(crate) fn backend_router(backend: InMemoryBackend) -> Router {
    Router::new()
        .route("/processo/:process_id", get(process_handler))
        .route(
            "/processo/:process_id/inscricao/me",
            get(find_draft_handler).post(create_draft_handler),
        )
        .route(
            "/processo/:process_id/inscricao/:inscricao_id/respostas",
            post(save_answers_handler),
        )
        .route(
            "/processo/:process_id/inscricao/:inscricao_id/enviar",
            post(submit_handler),
        )
        .with_state(backend)
}

pub(crate) fn with_backend_routes(backend: InMemoryBackend) -> Router {
    backend_router(backend)
        .route("/health", get(healthcheck))
        .route("/ready", get(readiness_endpoint))
        .route("/metrics", get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

fn error_response(error: BackendError) -> Response {
    let status = match &error {
        BackendError::ProcessNotFound(_) | BackendError::DraftNotFound => StatusCode::NOT_FOUND,
        BackendError::NotEditable(_) => StatusCode::CONFLICT,
        BackendError::PositionNotOffered(_) | BackendError::Incomplete(_) => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
    };
    (status, Json(json!({ "error": error.to_string() }))).into_response()
}

pub(crate) async fn process_handler(
    State(backend): State<InMemoryBackend>,
    Path(process_id): Path<String>,
) -> Response {
    match backend.process(&ProcessId(process_id)) {
        Ok(process) => (StatusCode::OK, Json(process)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn find_draft_handler(
    State(backend): State<InMemoryBackend>,
    Path(process_id): Path<String>,
    Query(query): Query<DraftQuery>,
) -> Response {
    match backend.find_draft(&ProcessId(process_id), &PositionId(query.vaga)) {
        Ok(draft) => (StatusCode::OK, Json(draft)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn create_draft_handler(
    State(backend): State<InMemoryBackend>,
    Path(process_id): Path<String>,
    Json(request): Json<CreateDraftRequest>,
) -> Response {
    match backend.upsert_draft(&ProcessId(process_id), &request) {
        Ok((draft, true)) => (StatusCode::CREATED, Json(draft)).into_response(),
        Ok((draft, false)) => (StatusCode::OK, Json(draft)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn save_answers_handler(
    State(backend): State<InMemoryBackend>,
    Path((process_id, inscricao_id)): Path<(String, String)>,
    Json(request): Json<SaveAnswersRequest>,
) -> Response {
    match backend.save_answers(
        &ProcessId(process_id),
        &InscricaoId(inscricao_id),
        request.answers,
    ) {
        Ok(draft) => (StatusCode::OK, Json(draft)).into_response(),
        Err(err) => error_response(err),
    }
}

pub(crate) async fn submit_handler(
    State(backend): State<InMemoryBackend>,
    Path((process_id, inscricao_id)): Path<(String, String)>,
) -> Response {
    match backend.submit(&ProcessId(process_id), &InscricaoId(inscricao_id)) {
        Ok(receipt) => (StatusCode::OK, Json(receipt)).into_response(),
        Err(err) => error_response(err),
    }
}
