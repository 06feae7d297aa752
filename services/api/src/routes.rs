use crate::infra::AppState;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::{Extension, Json};
use loan_risk::scoring::model::ModelLoader;
use loan_risk::scoring::{scoring_router, LoanScoringService};
use serde_json::json;
use std::sync::Arc;

/// Scoring routes plus the process-level health and metrics endpoints.
pub(crate) fn with_operational_routes<L>(service: Arc<LoanScoringService<L>>) -> axum::Router
where
    L: ModelLoader + 'static,
{
    scoring_router(service)
        .route("/health", axum::routing::get(healthcheck))
        .route("/metrics", axum::routing::get(metrics_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use loan_risk::scoring::model::{
        ArtifactLoader, BackendPreference, ModelProvider, RetryPolicy,
    };
    use loan_risk::scoring::DecisionPolicy;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use tower::ServiceExt;

    fn app() -> axum::Router {
        let loader = ArtifactLoader::new(
            "does-not-exist/model.json",
            "does-not-exist/feature_cols.json",
            BackendPreference::Auto,
        );
        let provider = Arc::new(ModelProvider::new(loader, RetryPolicy::default()));
        let service = Arc::new(LoanScoringService::new(provider, DecisionPolicy::default()));
        let state = AppState {
            metrics: Arc::new(PrometheusBuilder::new().build_recorder().handle()),
        };
        with_operational_routes(service).layer(Extension(state))
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .body(Body::empty())
            .expect("request builds")
    }

    #[tokio::test]
    async fn health_is_served_without_a_model() {
        let response = app().oneshot(get("/health")).await.expect("responds");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn metrics_use_prometheus_text_format() {
        let response = app().oneshot(get("/metrics")).await.expect("responds");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response
                .headers()
                .get(header::CONTENT_TYPE)
                .and_then(|value| value.to_str().ok()),
            Some("text/plain; version=0.0.4")
        );
    }

    #[tokio::test]
    async fn missing_artifacts_leave_the_service_unready() {
        let response = app().oneshot(get("/ready")).await.expect("responds");
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
