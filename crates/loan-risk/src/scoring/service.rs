use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use super::decision::{self, DecisionPolicy, ScoringError, ScoringResult};
use super::domain::ScoreRequest;
use super::features;
use super::model::{ModelLoader, ModelMetadata, ModelProvider, ModelUnavailable};
use super::validation::{RequestValidator, ValidationError};

/// How much of the scoring result is returned to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Disclosure {
    #[default]
    DecisionOnly,
    WithProbability,
}

/// Outbound scoring payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoreResponse {
    pub approved: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prob_default: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
}

/// Service composing validation, feature alignment, the model cache, and the
/// decision policy.
pub struct LoanScoringService<L> {
    validator: RequestValidator,
    provider: Arc<ModelProvider<L>>,
    policy: DecisionPolicy,
    disclosure: Disclosure,
}

impl<L> LoanScoringService<L>
where
    L: ModelLoader + 'static,
{
    pub fn new(provider: Arc<ModelProvider<L>>, policy: DecisionPolicy) -> Self {
        Self {
            validator: RequestValidator::new(),
            provider,
            policy,
            disclosure: Disclosure::default(),
        }
    }

    pub fn with_disclosure(mut self, disclosure: Disclosure) -> Self {
        self.disclosure = disclosure;
        self
    }

    pub fn provider(&self) -> &Arc<ModelProvider<L>> {
        &self.provider
    }

    pub fn policy(&self) -> DecisionPolicy {
        self.policy
    }

    /// Validate, align, and score one application. Invalid payloads never reach the model.
    pub async fn score(&self, request: ScoreRequest) -> Result<ScoringResult, ScoringServiceError> {
        let record = self.validator.validate(request)?;
        let model = self.provider.get().await?;
        let vector = features::build(&record, model.schema());
        let result = decision::score(&vector, &model, &self.policy)?;

        debug!(
            backend = %model.metadata().backend,
            probability_of_default = result.probability_of_default,
            approved = result.approved,
            "application scored"
        );
        Ok(result)
    }

    pub fn respond(&self, result: &ScoringResult) -> ScoreResponse {
        match self.disclosure {
            Disclosure::DecisionOnly => ScoreResponse {
                approved: result.approved,
                prob_default: None,
                threshold: None,
            },
            Disclosure::WithProbability => ScoreResponse {
                approved: result.approved,
                prob_default: Some(result.probability_of_default),
                threshold: Some(result.threshold),
            },
        }
    }

    /// Load (if needed) and describe the serving model.
    pub async fn readiness(&self) -> Result<ModelMetadata, ModelUnavailable> {
        let model = self.provider.get().await?;
        Ok(model.metadata().clone())
    }

    /// Discard the cached model and load the current one.
    pub async fn reload(&self) -> Result<ModelMetadata, ModelUnavailable> {
        let model = self.provider.reload().await?;
        Ok(model.metadata().clone())
    }
}

/// Error raised by the scoring service, split by who has to act on it.
#[derive(Debug, thiserror::Error)]
pub enum ScoringServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Unavailable(#[from] ModelUnavailable),
    #[error(transparent)]
    Scoring(#[from] ScoringError),
}
