//! Versioned model registry addressed by `models:/<name>@<alias>` URIs.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

const URI_SCHEME: &str = "models:/";
const REGISTRY_INDEX: &str = "registry.json";
const MODEL_FILE: &str = "model.json";
const SCHEMA_FILE: &str = "feature_cols.json";

/// Which version of a registered model to load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionRef {
    /// Symbolic alias such as `champion`, resolved at load time.
    Alias(String),
    Version(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelUri {
    name: String,
    reference: VersionRef,
}

impl ModelUri {
    pub fn alias(name: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            reference: VersionRef::Alias(alias.into()),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn reference(&self) -> &VersionRef {
        &self.reference
    }
}

impl FromStr for ModelUri {
    type Err = RegistryError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let invalid = || RegistryError::InvalidUri(raw.to_string());
        let body = raw.trim().strip_prefix(URI_SCHEME).ok_or_else(invalid)?;

        let (name, reference) = if let Some((name, alias)) = body.rsplit_once('@') {
            (name, VersionRef::Alias(alias.trim().to_string()))
        } else if let Some((name, version)) = body.rsplit_once('/') {
            (name, VersionRef::Version(version.trim().to_string()))
        } else {
            return Err(invalid());
        };

        let name = name.trim();
        let reference_empty = match &reference {
            VersionRef::Alias(value) | VersionRef::Version(value) => value.is_empty(),
        };
        if name.is_empty() || reference_empty {
            return Err(invalid());
        }

        Ok(Self {
            name: name.to_string(),
            reference,
        })
    }
}

impl fmt::Display for ModelUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reference {
            VersionRef::Alias(alias) => write!(f, "{URI_SCHEME}{}@{alias}", self.name),
            VersionRef::Version(version) => write!(f, "{URI_SCHEME}{}/{version}", self.name),
        }
    }
}

/// A concrete registered version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelVersion {
    pub name: String,
    pub version: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VersionMetadata {
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub run_id: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Files making up one registered version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactLocation {
    pub model_path: PathBuf,
    pub schema_path: PathBuf,
}

/// Registry lookup seam; the serving path only needs resolution and metadata.
pub trait ModelRegistry: Send + Sync {
    fn resolve(&self, uri: &ModelUri) -> Result<ModelVersion, RegistryError>;
    fn metadata(&self, version: &ModelVersion) -> Result<VersionMetadata, RegistryError>;
    fn artifact(&self, version: &ModelVersion) -> Result<ArtifactLocation, RegistryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("'{0}' is not a models:/<name>@<alias> or models:/<name>/<version> URI")]
    InvalidUri(String),
    #[error("registered model '{0}' not found")]
    UnknownModel(String),
    #[error("registered model '{name}' has no alias '{alias}'")]
    UnknownAlias { name: String, alias: String },
    #[error("registered model '{name}' has no version '{version}'")]
    UnknownVersion { name: String, version: String },
    #[error("failed to read registry index {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("registry index {path:?} is malformed: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
}

#[derive(Debug, Default, Deserialize)]
struct RegistryIndex {
    #[serde(default)]
    aliases: BTreeMap<String, String>,
    #[serde(default)]
    versions: BTreeMap<String, VersionMetadata>,
}

/// Registry stored on a local or mounted filesystem.
///
/// ```text
/// <root>/<name>/registry.json            aliases and version metadata
/// <root>/<name>/<version>/model.json     XGBoost JSON model
/// <root>/<name>/<version>/feature_cols.json
/// ```
#[derive(Debug, Clone)]
pub struct FileRegistry {
    root: PathBuf,
}

impl FileRegistry {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn model_dir(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    fn index(&self, name: &str) -> Result<RegistryIndex, RegistryError> {
        let dir = self.model_dir(name);
        if !dir.is_dir() {
            return Err(RegistryError::UnknownModel(name.to_string()));
        }

        let path = dir.join(REGISTRY_INDEX);
        let raw = fs::read_to_string(&path).map_err(|source| RegistryError::Read {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| RegistryError::Parse { path, source })
    }
}

impl ModelRegistry for FileRegistry {
    fn resolve(&self, uri: &ModelUri) -> Result<ModelVersion, RegistryError> {
        let index = self.index(uri.name())?;
        let version = match uri.reference() {
            VersionRef::Alias(alias) => index.aliases.get(alias).cloned().ok_or_else(|| {
                RegistryError::UnknownAlias {
                    name: uri.name().to_string(),
                    alias: alias.clone(),
                }
            })?,
            VersionRef::Version(version) => version.clone(),
        };

        if !index.versions.contains_key(&version) {
            return Err(RegistryError::UnknownVersion {
                name: uri.name().to_string(),
                version,
            });
        }

        Ok(ModelVersion {
            name: uri.name().to_string(),
            version,
        })
    }

    fn metadata(&self, version: &ModelVersion) -> Result<VersionMetadata, RegistryError> {
        let mut index = self.index(&version.name)?;
        index
            .versions
            .remove(&version.version)
            .ok_or_else(|| RegistryError::UnknownVersion {
                name: version.name.clone(),
                version: version.version.clone(),
            })
    }

    fn artifact(&self, version: &ModelVersion) -> Result<ArtifactLocation, RegistryError> {
        let dir = self.model_dir(&version.name).join(&version.version);
        Ok(ArtifactLocation {
            model_path: dir.join(MODEL_FILE),
            schema_path: dir.join(SCHEMA_FILE),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_alias_and_version_uris() {
        let uri: ModelUri = "models:/XGBoost with SMOTETomek@champion"
            .parse()
            .expect("alias uri parses");
        assert_eq!(uri.name(), "XGBoost with SMOTETomek");
        assert_eq!(uri.reference(), &VersionRef::Alias("champion".to_string()));
        assert_eq!(uri.to_string(), "models:/XGBoost with SMOTETomek@champion");

        let uri: ModelUri = "models:/credit-risk/7".parse().expect("version uri parses");
        assert_eq!(uri.reference(), &VersionRef::Version("7".to_string()));
        assert_eq!(uri.to_string(), "models:/credit-risk/7");
    }

    #[test]
    fn rejects_malformed_uris() {
        for raw in [
            "runs:/abc/model",
            "models:/",
            "models:/name",
            "models:/@champion",
            "models:/name@",
        ] {
            assert!(
                matches!(raw.parse::<ModelUri>(), Err(RegistryError::InvalidUri(_))),
                "{raw} should be rejected"
            );
        }
    }

    #[test]
    fn resolves_aliases_from_the_index() {
        let dir = tempfile::tempdir().expect("tempdir");
        let model_dir = dir.path().join("credit-risk");
        fs::create_dir_all(&model_dir).expect("model dir");
        fs::write(
            model_dir.join(REGISTRY_INDEX),
            r#"{"aliases": {"champion": "3"},
                "versions": {"2": {}, "3": {"run_id": "abc123", "description": "SMOTETomek"}}}"#,
        )
        .expect("index written");

        let registry = FileRegistry::new(dir.path());
        let version = registry
            .resolve(&ModelUri::alias("credit-risk", "champion"))
            .expect("alias resolves");
        assert_eq!(version.version, "3");

        let metadata = registry.metadata(&version).expect("metadata present");
        assert_eq!(metadata.run_id.as_deref(), Some("abc123"));

        let location = registry.artifact(&version).expect("artifact located");
        assert_eq!(location.model_path, model_dir.join("3").join(MODEL_FILE));

        assert!(matches!(
            registry.resolve(&ModelUri::alias("credit-risk", "challenger")),
            Err(RegistryError::UnknownAlias { .. })
        ));
        assert!(matches!(
            registry.resolve(&"models:/credit-risk/9".parse().expect("uri parses")),
            Err(RegistryError::UnknownVersion { .. })
        ));
        assert!(matches!(
            registry.resolve(&ModelUri::alias("fraud", "champion")),
            Err(RegistryError::UnknownModel(_))
        ));
    }
}
