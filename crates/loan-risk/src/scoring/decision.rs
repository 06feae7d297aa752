use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use super::features::FeatureVector;
use super::model::{BackendError, BackendKind, FeatureMatrix, ModelBackend, ScoringModel};

pub const DEFAULT_THRESHOLD: f64 = 0.5;

/// Approval threshold applied to the probability of default.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DecisionPolicy {
    threshold: f64,
}

impl DecisionPolicy {
    pub fn new(threshold: f64) -> Result<Self, InvalidThreshold> {
        if threshold.is_finite() && (0.0..=1.0).contains(&threshold) {
            Ok(Self { threshold })
        } else {
            Err(InvalidThreshold(threshold))
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Applicants are approved strictly below the threshold.
    pub fn approves(&self, probability_of_default: f64) -> bool {
        probability_of_default < self.threshold
    }
}

impl Default for DecisionPolicy {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
#[error("decision threshold must lie within [0, 1] (got {0})")]
pub struct InvalidThreshold(pub f64);

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoringResult {
    pub probability_of_default: f64,
    pub approved: bool,
    pub threshold: f64,
    /// The backend produced a probability outside [0, 1]; the result is a denial.
    pub contract_violation: bool,
}

/// Backend or shape failures that indicate training/serving skew.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScoringError {
    #[error("{backend} model expects {expected} features but the vector has {actual}")]
    FeatureCountMismatch {
        backend: BackendKind,
        expected: usize,
        actual: usize,
    },
    #[error("{backend} model returned an unexpected shape: {detail}")]
    UnexpectedShape {
        backend: BackendKind,
        detail: String,
    },
    #[error("{backend} model failed: {source}")]
    Backend {
        backend: BackendKind,
        source: BackendError,
    },
}

/// Turn a feature vector into an approve/deny decision with the given model.
pub fn score(
    vector: &FeatureVector,
    model: &ScoringModel,
    policy: &DecisionPolicy,
) -> Result<ScoringResult, ScoringError> {
    let backend = model.backend();
    let schema_len = model.schema().len();
    let expected = backend.num_features().unwrap_or(schema_len);

    if vector.len() != schema_len || vector.len() != expected {
        error!(
            backend = %backend.kind(),
            schema_len,
            model_features = expected,
            vector_len = vector.len(),
            "feature vector does not match the loaded model"
        );
        return Err(ScoringError::FeatureCountMismatch {
            backend: backend.kind(),
            expected,
            actual: vector.len(),
        });
    }

    let raw = probability_of_default(backend, vector).map_err(|err| {
        error!(
            backend = %backend.kind(),
            vector_len = vector.len(),
            error = %err,
            "scoring failed"
        );
        err
    })?;

    Ok(decide(raw, policy))
}

fn probability_of_default(
    backend: &ModelBackend,
    vector: &FeatureVector,
) -> Result<f64, ScoringError> {
    let kind = backend.kind();
    let backend_error = |source| ScoringError::Backend {
        backend: kind,
        source,
    };

    match backend {
        ModelBackend::Classifier(model) => {
            let rows = model
                .predict_proba(&[vector.as_slice()])
                .map_err(backend_error)?;
            match rows.as_slice() {
                [row] if row.len() == 2 => Ok(row[1]),
                _ => Err(ScoringError::UnexpectedShape {
                    backend: kind,
                    detail: format!(
                        "expected 1 row of 2 class probabilities, got {} row(s) of widths {:?}",
                        rows.len(),
                        rows.iter().map(Vec::len).collect::<Vec<_>>()
                    ),
                }),
            }
        }
        ModelBackend::Booster(model) => {
            let matrix = FeatureMatrix::from_vector(vector);
            let predictions = model.predict(&matrix).map_err(backend_error)?;
            match predictions.as_slice() {
                [probability] => Ok(*probability),
                _ => Err(ScoringError::UnexpectedShape {
                    backend: kind,
                    detail: format!("expected 1 prediction, got {}", predictions.len()),
                }),
            }
        }
    }
}

/// Apply the threshold, failing closed on probabilities outside [0, 1].
pub fn decide(probability_of_default: f64, policy: &DecisionPolicy) -> ScoringResult {
    let in_contract = (0.0..=1.0).contains(&probability_of_default);
    if !in_contract {
        warn!(
            probability_of_default,
            "model returned a probability outside [0, 1], denying"
        );
        let reported = if probability_of_default.is_nan() {
            1.0
        } else {
            probability_of_default.clamp(0.0, 1.0)
        };
        return ScoringResult {
            probability_of_default: reported,
            approved: false,
            threshold: policy.threshold(),
            contract_violation: true,
        };
    }

    ScoringResult {
        probability_of_default,
        approved: policy.approves(probability_of_default),
        threshold: policy.threshold(),
        contract_violation: false,
    }
}
