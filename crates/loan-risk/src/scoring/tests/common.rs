use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request};
use axum::response::Response;
use serde_json::Value;

use crate::scoring::model::{
    BackendError, Booster, FeatureMatrix, ModelBackend, ModelLoadError, ModelLoader,
    ModelProvider, ProbabilisticClassifier, RetryPolicy, ScoringModel,
};
use crate::scoring::{DecisionPolicy, FeatureSchema, LoanScoringService, ScoreRequest};

pub(super) const TEST_MODEL_URI: &str = "memory://loan-default";

/// Applicant used across the end-to-end scenarios.
pub(super) fn payload() -> ScoreRequest {
    ScoreRequest {
        age: Some(25.0),
        income: Some(50_000.0),
        home_ownership: Some("rent".to_string()),
        employment_length: Some(5.0),
        loan_amount: Some(10_000.0),
        def_on_file: Some(0.0),
        loan_intent: Some("personal".to_string()),
    }
}

pub(super) fn payload_json() -> Value {
    serde_json::to_value(payload()).expect("payload serializes")
}

/// Classifier that returns the same `[1 - p, p]` row for every input.
pub(super) struct FixedClassifier {
    pub(super) probability: f64,
    pub(super) features: usize,
}

impl ProbabilisticClassifier for FixedClassifier {
    fn predict_proba(&self, rows: &[&[f64]]) -> Result<Vec<Vec<f64>>, BackendError> {
        rows.iter()
            .map(|row| {
                if row.len() == self.features {
                    Ok(vec![1.0 - self.probability, self.probability])
                } else {
                    Err(BackendError::FeatureCount {
                        expected: self.features,
                        actual: row.len(),
                    })
                }
            })
            .collect()
    }

    fn num_features(&self) -> Option<usize> {
        Some(self.features)
    }
}

/// Classifier returning a malformed probability row.
pub(super) struct ThreeClassClassifier;

impl ProbabilisticClassifier for ThreeClassClassifier {
    fn predict_proba(&self, rows: &[&[f64]]) -> Result<Vec<Vec<f64>>, BackendError> {
        Ok(rows.iter().map(|_| vec![0.2, 0.3, 0.5]).collect())
    }
}

pub(super) struct FixedBooster {
    pub(super) probability: f64,
}

impl Booster for FixedBooster {
    fn predict(&self, matrix: &FeatureMatrix) -> Result<Vec<f64>, BackendError> {
        Ok(matrix.iter_rows().map(|_| self.probability).collect())
    }
}

pub(super) fn classifier_backend(probability: f64) -> ModelBackend {
    ModelBackend::Classifier(Arc::new(FixedClassifier {
        probability,
        features: FeatureSchema::training_default().len(),
    }))
}

pub(super) fn booster_backend(probability: f64) -> ModelBackend {
    ModelBackend::Booster(Arc::new(FixedBooster { probability }))
}

pub(super) fn scoring_model(backend: ModelBackend) -> ScoringModel {
    ScoringModel::new(backend, FeatureSchema::training_default(), TEST_MODEL_URI)
        .expect("backend matches the training schema")
}

/// Loader handing out a fresh model built from a fixed backend.
pub(super) struct StaticLoader {
    backend: ModelBackend,
    loads: AtomicUsize,
}

impl StaticLoader {
    pub(super) fn new(backend: ModelBackend) -> Self {
        Self {
            backend,
            loads: AtomicUsize::new(0),
        }
    }

    pub(super) fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl ModelLoader for StaticLoader {
    fn describe(&self) -> String {
        TEST_MODEL_URI.to_string()
    }

    fn load(&self) -> Result<ScoringModel, ModelLoadError> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        Ok(scoring_model(self.backend.clone()))
    }
}

/// Loader whose source is unreachable.
pub(super) struct UnreachableLoader;

impl ModelLoader for UnreachableLoader {
    fn describe(&self) -> String {
        "models:/loan-default@champion".to_string()
    }

    fn load(&self) -> Result<ScoringModel, ModelLoadError> {
        Err(ModelLoadError::Interrupted(
            "registry connection refused".to_string(),
        ))
    }
}

/// Unreachable source that takes a while to report it.
pub(super) struct SlowUnreachableLoader;

impl ModelLoader for SlowUnreachableLoader {
    fn describe(&self) -> String {
        "models:/loan-default@champion".to_string()
    }

    fn load(&self) -> Result<ScoringModel, ModelLoadError> {
        std::thread::sleep(Duration::from_millis(50));
        Err(ModelLoadError::Interrupted(
            "registry connection refused".to_string(),
        ))
    }
}

/// Loader that fails a fixed number of times before succeeding.
pub(super) struct FlakyLoader {
    failures_remaining: AtomicUsize,
    inner: StaticLoader,
}

impl FlakyLoader {
    pub(super) fn new(failures: usize, backend: ModelBackend) -> Self {
        Self {
            failures_remaining: AtomicUsize::new(failures),
            inner: StaticLoader::new(backend),
        }
    }
}

impl ModelLoader for FlakyLoader {
    fn describe(&self) -> String {
        self.inner.describe()
    }

    fn load(&self) -> Result<ScoringModel, ModelLoadError> {
        let remaining = self.failures_remaining.load(Ordering::SeqCst);
        if remaining > 0 {
            self.failures_remaining.store(remaining - 1, Ordering::SeqCst);
            return Err(ModelLoadError::Interrupted("transient outage".to_string()));
        }
        self.inner.load()
    }
}

/// Loader that takes longer than any sensible timeout.
pub(super) struct SlowLoader;

impl ModelLoader for SlowLoader {
    fn describe(&self) -> String {
        "slow://model".to_string()
    }

    fn load(&self) -> Result<ScoringModel, ModelLoadError> {
        std::thread::sleep(Duration::from_millis(300));
        Ok(scoring_model(classifier_backend(0.1)))
    }
}

pub(super) fn quick_retry(attempts: usize) -> RetryPolicy {
    RetryPolicy {
        attempts,
        backoff: Duration::from_millis(1),
        timeout: Duration::from_secs(5),
    }
}

pub(super) fn provider<L: ModelLoader + 'static>(loader: L) -> Arc<ModelProvider<L>> {
    Arc::new(ModelProvider::new(loader, quick_retry(1)))
}

pub(super) fn service_with<L: ModelLoader + 'static>(loader: L) -> Arc<LoanScoringService<L>> {
    Arc::new(LoanScoringService::new(
        provider(loader),
        DecisionPolicy::default(),
    ))
}

pub(super) fn classifier_service(probability: f64) -> Arc<LoanScoringService<StaticLoader>> {
    service_with(StaticLoader::new(classifier_backend(probability)))
}

pub(super) fn json_request(method: &str, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            serde_json::to_vec(body).expect("body serializes"),
        ))
        .expect("request builds")
}

pub(super) fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("request builds")
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), 16 * 1024)
        .await
        .expect("body readable");
    serde_json::from_slice(&bytes).expect("json body")
}
