//! Model backends, artifact loading, and the process-wide model cache.

mod backend;
mod loader;
pub mod provider;
pub mod registry;
pub mod xgboost;

pub use backend::{
    BackendError, BackendKind, Booster, FeatureMatrix, ModelBackend, ModelMetadata,
    ProbabilisticClassifier, ScoringModel,
};
pub use loader::{
    ArtifactLoader, BackendPreference, ModelLoadError, ModelLoader, RegistryLoader, SourceLoader,
};
pub use provider::{ModelProvider, ModelUnavailable, ProviderStatus, RetryPolicy};
pub use registry::{
    ArtifactLocation, FileRegistry, ModelRegistry, ModelUri, ModelVersion, RegistryError,
    VersionMetadata, VersionRef,
};
pub use xgboost::{ArtifactError, BoostedClassifier, TreeEnsemble};
