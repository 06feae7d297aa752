use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::scoring::model::{
    ArtifactLoader, BackendPreference, FileRegistry, ModelUri, RegistryLoader, RetryPolicy,
    SourceLoader,
};
use crate::scoring::{DecisionPolicy, Disclosure};

const DEFAULT_MODEL_PATH: &str = "artifacts/xgboost.json";
const DEFAULT_SCHEMA_PATH: &str = "artifacts/feature_cols.json";
const DEFAULT_REGISTRY_ROOT: &str = "registry";
const DEFAULT_MODEL_URI: &str = "models:/XGBoost with SMOTETomek@champion";

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub model: ModelConfig,
    pub scoring: ScoringConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let log_format = match env::var("APP_LOG_FORMAT") {
            Ok(raw) => LogFormat::parse(&raw).ok_or_else(|| ConfigError::InvalidValue {
                variable: "APP_LOG_FORMAT",
                value: raw,
                expected: "compact or pretty",
            })?,
            Err(_) => LogFormat::Compact,
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig {
                log_level,
                log_format,
            },
            model: ModelConfig::from_env()?,
            scoring: ScoringConfig::from_env()?,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Pretty,
}

impl LogFormat {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "compact" => Some(Self::Compact),
            "pretty" => Some(Self::Pretty),
            _ => None,
        }
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
    pub log_format: LogFormat,
}

/// Where the serving model comes from.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelSource {
    Artifact {
        model_path: PathBuf,
        schema_path: PathBuf,
    },
    Registry {
        root: PathBuf,
        uri: ModelUri,
    },
}

#[derive(Debug, Clone)]
pub struct ModelConfig {
    pub source: ModelSource,
    pub backend: BackendPreference,
    pub retry: RetryPolicy,
}

impl ModelConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let source_kind = env::var("MODEL_SOURCE").unwrap_or_else(|_| "artifact".to_string());
        let (source, default_attempts) = match source_kind.trim().to_ascii_lowercase().as_str() {
            "artifact" => (
                ModelSource::Artifact {
                    model_path: env_path("MODEL_PATH", DEFAULT_MODEL_PATH),
                    schema_path: env_path("FEATURE_COLS_PATH", DEFAULT_SCHEMA_PATH),
                },
                1,
            ),
            "registry" => {
                let raw_uri =
                    env::var("MODEL_URI").unwrap_or_else(|_| DEFAULT_MODEL_URI.to_string());
                let uri = raw_uri
                    .parse::<ModelUri>()
                    .map_err(|_| ConfigError::InvalidValue {
                        variable: "MODEL_URI",
                        value: raw_uri.clone(),
                        expected: "models:/<name>@<alias> or models:/<name>/<version>",
                    })?;
                (
                    ModelSource::Registry {
                        root: env_path("MODEL_REGISTRY_ROOT", DEFAULT_REGISTRY_ROOT),
                        uri,
                    },
                    3,
                )
            }
            _ => {
                return Err(ConfigError::InvalidValue {
                    variable: "MODEL_SOURCE",
                    value: source_kind,
                    expected: "artifact or registry",
                })
            }
        };

        let backend = match env::var("MODEL_BACKEND") {
            Ok(raw) => BackendPreference::parse(&raw).ok_or(ConfigError::InvalidValue {
                variable: "MODEL_BACKEND",
                value: raw,
                expected: "auto, classifier, or booster",
            })?,
            Err(_) => BackendPreference::Auto,
        };

        let attempts: usize = env_parsed("MODEL_LOAD_ATTEMPTS", "a positive integer")?
            .unwrap_or(default_attempts);
        if attempts == 0 {
            return Err(ConfigError::InvalidValue {
                variable: "MODEL_LOAD_ATTEMPTS",
                value: "0".to_string(),
                expected: "a positive integer",
            });
        }
        let backoff_ms: u64 =
            env_parsed("MODEL_LOAD_BACKOFF_MS", "milliseconds as an integer")?.unwrap_or(100);
        let timeout_secs: u64 =
            env_parsed("MODEL_LOAD_TIMEOUT_SECS", "seconds as an integer")?.unwrap_or(10);

        Ok(Self {
            source,
            backend,
            retry: RetryPolicy {
                attempts,
                backoff: Duration::from_millis(backoff_ms),
                timeout: Duration::from_secs(timeout_secs),
            },
        })
    }

    /// Build the loader for the configured source.
    pub fn loader(&self) -> SourceLoader {
        match &self.source {
            ModelSource::Artifact {
                model_path,
                schema_path,
            } => SourceLoader::Artifact(ArtifactLoader::new(
                model_path.clone(),
                schema_path.clone(),
                self.backend,
            )),
            ModelSource::Registry { root, uri } => SourceLoader::Registry(RegistryLoader::new(
                Arc::new(FileRegistry::new(root.clone())),
                uri.clone(),
                self.backend,
            )),
        }
    }
}

/// Decision threshold and response disclosure.
#[derive(Debug, Clone, Copy)]
pub struct ScoringConfig {
    pub policy: DecisionPolicy,
    pub disclosure: Disclosure,
}

impl ScoringConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let policy = match env_parsed::<f64>("DECISION_THRESHOLD", "a number within [0, 1]")? {
            Some(threshold) => DecisionPolicy::new(threshold)
                .map_err(|err| ConfigError::InvalidThreshold { value: err.0 })?,
            None => DecisionPolicy::default(),
        };

        let expose = env_parsed::<bool>("EXPOSE_PROBABILITY", "true or false")?.unwrap_or(false);
        let disclosure = if expose {
            Disclosure::WithProbability
        } else {
            Disclosure::DecisionOnly
        };

        Ok(Self { policy, disclosure })
    }
}

fn env_path(variable: &str, default: &str) -> PathBuf {
    PathBuf::from(env::var(variable).unwrap_or_else(|_| default.to_string()))
}

fn env_parsed<T: FromStr>(
    variable: &'static str,
    expected: &'static str,
) -> Result<Option<T>, ConfigError> {
    match env::var(variable) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue {
                variable,
                value: raw,
                expected,
            }),
        Err(_) => Ok(None),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost {
        source: std::net::AddrParseError,
    },
    InvalidValue {
        variable: &'static str,
        value: String,
        expected: &'static str,
    },
    InvalidThreshold {
        value: f64,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidValue {
                variable,
                value,
                expected,
            } => write!(f, "{variable} must be {expected} (got '{value}')"),
            ConfigError::InvalidThreshold { value } => {
                write!(f, "DECISION_THRESHOLD must lie within [0, 1] (got {value})")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidValue { .. }
            | ConfigError::InvalidThreshold { .. } => None,
        }
    }
}
