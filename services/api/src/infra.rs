use loan_risk::config::{AppConfig, ConfigError};
use loan_risk::scoring::{DecisionPolicy, LoanScoringService, ModelProvider, SourceLoader};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::Arc;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Apply a command-line threshold on top of the environment configuration.
pub(crate) fn override_threshold(
    config: &mut AppConfig,
    threshold: Option<f64>,
) -> Result<(), ConfigError> {
    if let Some(threshold) = threshold {
        config.scoring.policy = DecisionPolicy::new(threshold)
            .map_err(|err| ConfigError::InvalidThreshold { value: err.0 })?;
    }
    Ok(())
}

/// Scoring service over the configured model source. Nothing is loaded until first use.
pub(crate) fn scoring_service(config: &AppConfig) -> Arc<LoanScoringService<SourceLoader>> {
    let provider = Arc::new(ModelProvider::new(
        config.model.loader(),
        config.model.retry,
    ));
    Arc::new(
        LoanScoringService::new(provider, config.scoring.policy)
            .with_disclosure(config.scoring.disclosure),
    )
}
