use crate::cli::ServeArgs;
use crate::infra::{override_threshold, scoring_service, AppState};
use crate::routes::with_operational_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use loan_risk::config::AppConfig;
use loan_risk::error::AppError;
use loan_risk::scoring::model::ModelLoader;
use loan_risk::telemetry;
use std::sync::Arc;
use tracing::info;

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }
    override_threshold(&mut config, args.threshold)?;

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let app_state = AppState {
        metrics: Arc::new(prometheus_handle),
    };

    let service = scoring_service(&config);
    let model_source = service.provider().loader().describe();

    let app = with_operational_routes(service)
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!(
        ?config.environment,
        %addr,
        %model_source,
        threshold = config.scoring.policy.threshold(),
        "loan scoring service listening; model loads on first request"
    );

    axum::serve(listener, app).await?;
    Ok(())
}
