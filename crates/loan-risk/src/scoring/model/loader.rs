use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::super::schema::{FeatureSchema, SchemaError};
use super::backend::{BackendKind, ModelBackend, ScoringModel};
use super::registry::{ModelRegistry, ModelUri, RegistryError};
use super::xgboost::{ArtifactError, BoostedClassifier, TreeEnsemble};

/// Resolves a ready-to-score model from wherever the deployment keeps it.
pub trait ModelLoader: Send + Sync {
    /// Human-readable source used in logs and unavailability errors.
    fn describe(&self) -> String;

    fn load(&self) -> Result<ScoringModel, ModelLoadError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ModelLoadError {
    #[error(transparent)]
    Schema(#[from] SchemaError),
    #[error(transparent)]
    Artifact(#[from] ArtifactError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("model was trained on {model} features but the schema lists {schema}")]
    SchemaLengthMismatch { model: usize, schema: usize },
    #[error("model feature names {model:?} differ from schema columns {schema:?}")]
    FeatureNamesMismatch {
        model: Vec<String>,
        schema: Vec<String>,
    },
    #[error("no configured backend accepted the artifact: {}", .attempts.join("; "))]
    NoBackend { attempts: Vec<String> },
    #[error("model load timed out after {0:?}")]
    TimedOut(Duration),
    #[error("model load was interrupted: {0}")]
    Interrupted(String),
}

/// Order in which backends are tried for a single artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BackendPreference {
    /// Classifier wrapper first, raw booster as fallback.
    #[default]
    Auto,
    Classifier,
    Booster,
}

impl BackendPreference {
    pub fn order(&self) -> &'static [BackendKind] {
        match self {
            BackendPreference::Auto => &[BackendKind::Classifier, BackendKind::Booster],
            BackendPreference::Classifier => &[BackendKind::Classifier],
            BackendPreference::Booster => &[BackendKind::Booster],
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "auto" => Some(Self::Auto),
            "classifier" | "sklearn" => Some(Self::Classifier),
            "booster" => Some(Self::Booster),
            _ => None,
        }
    }
}

/// Loads a model and its feature schema from two local files.
#[derive(Debug, Clone)]
pub struct ArtifactLoader {
    model_path: PathBuf,
    schema_path: PathBuf,
    preference: BackendPreference,
}

impl ArtifactLoader {
    pub fn new(
        model_path: impl Into<PathBuf>,
        schema_path: impl Into<PathBuf>,
        preference: BackendPreference,
    ) -> Self {
        Self {
            model_path: model_path.into(),
            schema_path: schema_path.into(),
            preference,
        }
    }

    pub(crate) fn load_files(
        model_path: &Path,
        schema_path: &Path,
        preference: BackendPreference,
        model_uri: String,
    ) -> Result<ScoringModel, ModelLoadError> {
        let schema = FeatureSchema::from_path(schema_path)?;
        let ensemble = TreeEnsemble::from_path(model_path)?;

        let names = ensemble.feature_names();
        if !names.is_empty() && !names.iter().map(String::as_str).eq(schema.names()) {
            return Err(ModelLoadError::FeatureNamesMismatch {
                model: names.to_vec(),
                schema: schema.names().map(str::to_string).collect(),
            });
        }

        let backend = select_backend(ensemble, preference)?;
        let unpopulated = schema.unpopulated_columns();
        if !unpopulated.is_empty() {
            warn!(
                columns = ?unpopulated,
                "schema columns not populated by this service will be zero-filled"
            );
        }

        ScoringModel::new(backend, schema, model_uri)
    }
}

impl ModelLoader for ArtifactLoader {
    fn describe(&self) -> String {
        self.model_path.display().to_string()
    }

    fn load(&self) -> Result<ScoringModel, ModelLoadError> {
        Self::load_files(
            &self.model_path,
            &self.schema_path,
            self.preference,
            self.describe(),
        )
    }
}

fn select_backend(
    ensemble: TreeEnsemble,
    preference: BackendPreference,
) -> Result<ModelBackend, ModelLoadError> {
    let mut attempts = Vec::new();
    for kind in preference.order() {
        match kind {
            BackendKind::Classifier if ensemble.is_classifier_artifact() => {
                return Ok(ModelBackend::Classifier(Arc::new(BoostedClassifier::new(
                    ensemble,
                ))));
            }
            BackendKind::Classifier => {
                debug!("artifact was not saved by a classifier wrapper, trying next backend");
                attempts.push("classifier: artifact carries no classifier metadata".to_string());
            }
            BackendKind::Booster => return Ok(ModelBackend::Booster(Arc::new(ensemble))),
        }
    }
    Err(ModelLoadError::NoBackend { attempts })
}

/// Resolves a symbolic registry URI to a version, then loads that version's files.
#[derive(Clone)]
pub struct RegistryLoader {
    registry: Arc<dyn ModelRegistry>,
    uri: ModelUri,
    preference: BackendPreference,
}

impl RegistryLoader {
    pub fn new(
        registry: Arc<dyn ModelRegistry>,
        uri: ModelUri,
        preference: BackendPreference,
    ) -> Self {
        Self {
            registry,
            uri,
            preference,
        }
    }
}

impl ModelLoader for RegistryLoader {
    fn describe(&self) -> String {
        self.uri.to_string()
    }

    fn load(&self) -> Result<ScoringModel, ModelLoadError> {
        let version = self.registry.resolve(&self.uri)?;
        let metadata = self.registry.metadata(&version)?;
        let location = self.registry.artifact(&version)?;
        info!(uri = %self.uri, version = %version.version, "resolved registered model");

        let model = ArtifactLoader::load_files(
            &location.model_path,
            &location.schema_path,
            self.preference,
            self.describe(),
        )?;
        Ok(model
            .with_version(version.version)
            .with_registration(metadata))
    }
}

/// Loader selected by configuration.
#[derive(Clone)]
pub enum SourceLoader {
    Artifact(ArtifactLoader),
    Registry(RegistryLoader),
}

impl ModelLoader for SourceLoader {
    fn describe(&self) -> String {
        match self {
            SourceLoader::Artifact(loader) => loader.describe(),
            SourceLoader::Registry(loader) => loader.describe(),
        }
    }

    fn load(&self) -> Result<ScoringModel, ModelLoadError> {
        match self {
            SourceLoader::Artifact(loader) => loader.load(),
            SourceLoader::Registry(loader) => loader.load(),
        }
    }
}
