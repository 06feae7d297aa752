use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::super::features::FeatureVector;
use super::super::schema::FeatureSchema;
use super::loader::ModelLoadError;
use super::registry::VersionMetadata;

/// Which prediction interface a loaded model exposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Classifier,
    Booster,
}

impl BackendKind {
    pub fn label(&self) -> &'static str {
        match self {
            BackendKind::Classifier => "classifier",
            BackendKind::Booster => "booster",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Dense row-major matrix handed to boosters, mirroring the float32 layout tree
/// ensembles are trained on.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    rows: usize,
    cols: usize,
    data: Vec<f32>,
}

impl FeatureMatrix {
    pub fn from_vector(vector: &FeatureVector) -> Self {
        Self {
            rows: 1,
            cols: vector.len(),
            data: vector.as_slice().iter().map(|value| *value as f32).collect(),
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn row(&self, index: usize) -> Option<&[f32]> {
        if index >= self.rows {
            return None;
        }
        let start = index * self.cols;
        self.data.get(start..start + self.cols)
    }

    pub fn iter_rows(&self) -> impl Iterator<Item = &[f32]> + '_ {
        (0..self.rows).filter_map(move |index| self.row(index))
    }
}

/// Failure inside a backend's prediction call.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BackendError {
    #[error("model expects {expected} features, received {actual}")]
    FeatureCount { expected: usize, actual: usize },
    #[error("prediction failed: {0}")]
    Prediction(String),
}

/// Model exposing class probabilities per row, `[P(repaid), P(default)]`.
pub trait ProbabilisticClassifier: Send + Sync {
    fn predict_proba(&self, rows: &[&[f64]]) -> Result<Vec<Vec<f64>>, BackendError>;

    fn num_features(&self) -> Option<usize> {
        None
    }
}

/// Raw boosted-tree model returning one default probability per matrix row.
pub trait Booster: Send + Sync {
    fn predict(&self, matrix: &FeatureMatrix) -> Result<Vec<f64>, BackendError>;

    fn num_features(&self) -> Option<usize> {
        None
    }
}

#[derive(Clone)]
pub enum ModelBackend {
    Classifier(Arc<dyn ProbabilisticClassifier>),
    Booster(Arc<dyn Booster>),
}

impl ModelBackend {
    pub fn kind(&self) -> BackendKind {
        match self {
            ModelBackend::Classifier(_) => BackendKind::Classifier,
            ModelBackend::Booster(_) => BackendKind::Booster,
        }
    }

    pub fn num_features(&self) -> Option<usize> {
        match self {
            ModelBackend::Classifier(model) => model.num_features(),
            ModelBackend::Booster(model) => model.num_features(),
        }
    }
}

impl fmt::Debug for ModelBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelBackend")
            .field("kind", &self.kind())
            .field("num_features", &self.num_features())
            .finish()
    }
}

/// Descriptive facts about the loaded model, exposed on readiness and info surfaces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    pub model_uri: String,
    pub backend: BackendKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub run_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// When the version was registered, for registry-sourced models.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub registered_at: Option<DateTime<Utc>>,
    pub num_features: usize,
    pub loaded_at: DateTime<Utc>,
}

/// A ready-to-score model bundled with the schema it was trained on.
#[derive(Debug, Clone)]
pub struct ScoringModel {
    backend: ModelBackend,
    schema: FeatureSchema,
    metadata: ModelMetadata,
}

impl ScoringModel {
    pub fn new(
        backend: ModelBackend,
        schema: FeatureSchema,
        model_uri: impl Into<String>,
    ) -> Result<Self, ModelLoadError> {
        if let Some(expected) = backend.num_features() {
            if expected != schema.len() {
                return Err(ModelLoadError::SchemaLengthMismatch {
                    model: expected,
                    schema: schema.len(),
                });
            }
        }

        let metadata = ModelMetadata {
            model_uri: model_uri.into(),
            backend: backend.kind(),
            version: None,
            run_id: None,
            description: None,
            registered_at: None,
            num_features: schema.len(),
            loaded_at: Utc::now(),
        };

        Ok(Self {
            backend,
            schema,
            metadata,
        })
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.metadata.version = Some(version.into());
        self
    }

    /// Attach what the registry recorded about this version.
    pub fn with_registration(mut self, registration: VersionMetadata) -> Self {
        self.metadata.run_id = registration.run_id;
        self.metadata.description = registration.description;
        self.metadata.registered_at = registration.created_at;
        self
    }

    pub fn backend(&self) -> &ModelBackend {
        &self.backend
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }
}
