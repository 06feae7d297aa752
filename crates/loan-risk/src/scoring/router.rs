use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tracing::error;

use super::domain::ScoreRequest;
use super::model::{ModelLoader, ModelMetadata, ModelUnavailable};
use super::service::{LoanScoringService, ScoringServiceError};

/// Router exposing scoring, readiness, liveness, and model administration.
pub fn scoring_router<L>(service: Arc<LoanScoringService<L>>) -> Router
where
    L: ModelLoader + 'static,
{
    Router::new()
        .route("/score", post(score_handler::<L>))
        .route("/ready", get(ready_handler::<L>))
        .route("/live", get(live_handler))
        .route("/model", get(model_handler::<L>))
        .route("/model/reload", post(reload_handler::<L>))
        .with_state(service)
}

pub(crate) async fn score_handler<L>(
    State(service): State<Arc<LoanScoringService<L>>>,
    payload: Result<Json<ScoreRequest>, JsonRejection>,
) -> Response
where
    L: ModelLoader + 'static,
{
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            let payload = json!({ "error": rejection.body_text() });
            return (rejection.status(), Json(payload)).into_response();
        }
    };

    match service.score(request).await {
        Ok(result) => (StatusCode::OK, Json(service.respond(&result))).into_response(),
        Err(ScoringServiceError::Validation(error)) => {
            let payload = json!({
                "error": error.to_string(),
                "field": error.field(),
            });
            (StatusCode::UNPROCESSABLE_ENTITY, Json(payload)).into_response()
        }
        Err(ScoringServiceError::Unavailable(error)) => unavailable(&error),
        Err(ScoringServiceError::Scoring(error)) => {
            error!(%error, "scoring request failed");
            let payload = json!({ "error": error.to_string() });
            (StatusCode::INTERNAL_SERVER_ERROR, Json(payload)).into_response()
        }
    }
}

pub(crate) async fn ready_handler<L>(State(service): State<Arc<LoanScoringService<L>>>) -> Response
where
    L: ModelLoader + 'static,
{
    match service.readiness().await {
        Ok(metadata) => (StatusCode::OK, Json(ready_payload(&metadata))).into_response(),
        Err(error) => {
            let payload = json!({
                "status": "unavailable",
                "error": error.to_string(),
            });
            (StatusCode::SERVICE_UNAVAILABLE, Json(payload)).into_response()
        }
    }
}

pub(crate) async fn live_handler() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn model_handler<L>(State(service): State<Arc<LoanScoringService<L>>>) -> Response
where
    L: ModelLoader + 'static,
{
    match service.readiness().await {
        Ok(metadata) => (StatusCode::OK, Json(metadata)).into_response(),
        Err(error) => unavailable(&error),
    }
}

pub(crate) async fn reload_handler<L>(
    State(service): State<Arc<LoanScoringService<L>>>,
) -> Response
where
    L: ModelLoader + 'static,
{
    match service.reload().await {
        Ok(metadata) => (StatusCode::OK, Json(metadata)).into_response(),
        Err(error) => unavailable(&error),
    }
}

fn ready_payload(metadata: &ModelMetadata) -> serde_json::Value {
    json!({
        "status": "ready",
        "model_uri": metadata.model_uri,
        "backend": metadata.backend,
        "version": metadata.version,
    })
}

fn unavailable(error: &ModelUnavailable) -> Response {
    let payload = json!({ "error": error.to_string() });
    (StatusCode::SERVICE_UNAVAILABLE, Json(payload)).into_response()
}
