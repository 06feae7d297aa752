//! End-to-end scoring through on-disk artifacts, the file registry, and the HTTP router.
//!
//! The model under test is a two-stump XGBoost ensemble: applicants under 30 and
//! loans under 20000 each shift the margin, so the expected probabilities can be
//! computed by hand.

mod common {
    use std::fs;
    use std::path::Path;

    use serde_json::{json, Value};

    use loan_risk::scoring::schema::TRAINING_FEATURE_COLUMNS;

    pub(super) fn stump_model(classifier: bool, feature_names: &[&str]) -> Value {
        let attributes = if classifier {
            json!({
                "scikit_learn": "{\"_estimator_type\": \"classifier\", \"n_classes_\": 2}"
            })
        } else {
            json!({})
        };
        let num_feature = feature_names
            .len()
            .max(TRAINING_FEATURE_COLUMNS.len())
            .to_string();
        json!({
            "learner": {
                "attributes": attributes,
                "feature_names": feature_names,
                "gradient_booster": {
                    "name": "gbtree",
                    "model": {
                        "gbtree_model_param": {"num_trees": "2", "num_parallel_tree": "1"},
                        "tree_info": [0, 0],
                        "trees": [
                            {
                                "id": 0,
                                "left_children": [1, -1, -1],
                                "right_children": [2, -1, -1],
                                "split_indices": [0, 0, 0],
                                "split_conditions": [30.0, 0.4, -0.2],
                                "default_left": [1, 0, 0],
                                "base_weights": [0.0, 0.4, -0.2]
                            },
                            {
                                "id": 1,
                                "left_children": [1, -1, -1],
                                "right_children": [2, -1, -1],
                                "split_indices": [4, 0, 0],
                                "split_conditions": [20000.0, -0.3, 0.5],
                                "default_left": [0, 0, 0],
                                "base_weights": [0.0, -0.3, 0.5]
                            }
                        ]
                    }
                },
                "learner_model_param": {
                    "base_score": "5E-1",
                    "num_class": "0",
                    "num_feature": num_feature
                },
                "objective": {"name": "binary:logistic"}
            },
            "version": [2, 0, 3]
        })
    }

    pub(super) fn write_version(dir: &Path, model: &Value, columns: &[&str]) {
        fs::create_dir_all(dir).expect("version dir");
        fs::write(
            dir.join("model.json"),
            serde_json::to_vec(model).expect("model serializes"),
        )
        .expect("model written");
        fs::write(
            dir.join("feature_cols.json"),
            serde_json::to_vec(columns).expect("columns serialize"),
        )
        .expect("schema written");
    }

    /// Registry with version 1 (booster-only) and version 2 (classifier), champion -> 2.
    pub(super) fn seeded_registry(root: &Path) {
        let model_dir = root.join("loan-default");
        write_version(
            &model_dir.join("1"),
            &stump_model(false, &[]),
            &TRAINING_FEATURE_COLUMNS,
        );
        write_version(
            &model_dir.join("2"),
            &stump_model(true, &TRAINING_FEATURE_COLUMNS),
            &TRAINING_FEATURE_COLUMNS,
        );
        let index = json!({
            "aliases": {"champion": "2", "challenger": "1"},
            "versions": {
                "1": {"run_id": "run-001", "description": "baseline"},
                "2": {
                    "run_id": "run-002",
                    "description": "XGBoost with SMOTETomek",
                    "created_at": "2026-03-01T12:00:00Z"
                }
            }
        });
        fs::write(
            model_dir.join("registry.json"),
            serde_json::to_vec_pretty(&index).expect("index serializes"),
        )
        .expect("index written");
    }

    pub(super) fn payload(age: u32) -> Value {
        json!({
            "age": age,
            "income": 50000,
            "home_ownership": "rent",
            "employment_length": 5,
            "loan_amount": 10000,
            "def_on_file": 0,
            "loan_intent": "personal"
        })
    }

    pub(super) fn sigmoid(margin: f64) -> f64 {
        1.0 / (1.0 + (-margin).exp())
    }
}

use std::sync::Arc;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use tower::ServiceExt;

use loan_risk::scoring::model::{
    ArtifactLoader, BackendKind, BackendPreference, FileRegistry, ModelLoadError, ModelLoader,
    ModelProvider, ModelUri, RegistryLoader, RetryPolicy, SourceLoader,
};
use loan_risk::scoring::schema::TRAINING_FEATURE_COLUMNS;
use loan_risk::scoring::{scoring_router, DecisionPolicy, Disclosure, LoanScoringService};

use common::*;

fn registry_service(
    root: &std::path::Path,
    alias: &str,
) -> Arc<LoanScoringService<SourceLoader>> {
    let loader = SourceLoader::Registry(RegistryLoader::new(
        Arc::new(FileRegistry::new(root)),
        ModelUri::alias("loan-default", alias),
        BackendPreference::Auto,
    ));
    let provider = Arc::new(ModelProvider::new(loader, RetryPolicy::default()));
    Arc::new(
        LoanScoringService::new(provider, DecisionPolicy::default())
            .with_disclosure(Disclosure::WithProbability),
    )
}

async fn post_score(router: axum::Router, body: &Value) -> (StatusCode, Value) {
    let request = Request::builder()
        .method("POST")
        .uri("/score")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(serde_json::to_vec(body).expect("body serializes")))
        .expect("request builds");
    let response = router.oneshot(request).await.expect("router responds");
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), 16 * 1024)
        .await
        .expect("body readable");
    (status, serde_json::from_slice(&bytes).expect("json body"))
}

#[tokio::test]
async fn champion_alias_scores_through_the_classifier_backend() {
    let dir = tempfile::tempdir().expect("tempdir");
    seeded_registry(dir.path());
    let service = registry_service(dir.path(), "champion");

    let metadata = service.readiness().await.expect("champion loads");
    assert_eq!(metadata.backend, BackendKind::Classifier);
    assert_eq!(metadata.version.as_deref(), Some("2"));
    assert_eq!(metadata.run_id.as_deref(), Some("run-002"));
    assert_eq!(
        metadata.registered_at.map(|at| at.to_rfc3339()),
        Some("2026-03-01T12:00:00+00:00".to_string())
    );
    assert_eq!(metadata.model_uri, "models:/loan-default@champion");

    let router = scoring_router(service);

    // age 25 takes +0.4, loan 10000 takes -0.3
    let (status, body) = post_score(router.clone(), &payload(25)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["approved"], json!(false));
    let probability = body["prob_default"].as_f64().expect("probability disclosed");
    assert!((probability - sigmoid(0.1)).abs() < 1e-6);

    // age 35 takes -0.2
    let (status, body) = post_score(router, &payload(35)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["approved"], json!(true));
    let probability = body["prob_default"].as_f64().expect("probability disclosed");
    assert!((probability - sigmoid(-0.5)).abs() < 1e-6);
}

#[tokio::test]
async fn booster_only_artifacts_fall_back_to_the_raw_booster() {
    let dir = tempfile::tempdir().expect("tempdir");
    seeded_registry(dir.path());
    let service = registry_service(dir.path(), "challenger");

    let metadata = service.readiness().await.expect("challenger loads");
    assert_eq!(metadata.backend, BackendKind::Booster);
    assert_eq!(metadata.version.as_deref(), Some("1"));
    assert_eq!(metadata.registered_at, None);

    let (status, body) = post_score(scoring_router(service), &payload(25)).await;
    assert_eq!(status, StatusCode::OK);
    let probability = body["prob_default"].as_f64().expect("probability disclosed");
    assert!((probability - sigmoid(0.1)).abs() < 1e-6);
}

#[tokio::test]
async fn unknown_alias_keeps_the_service_unready() {
    let dir = tempfile::tempdir().expect("tempdir");
    seeded_registry(dir.path());
    let service = registry_service(dir.path(), "staging");
    let router = scoring_router(service);

    let ready = router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/ready")
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("router responds");
    assert_eq!(ready.status(), StatusCode::SERVICE_UNAVAILABLE);

    let (status, body) = post_score(router, &payload(25)).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert!(body["error"]
        .as_str()
        .expect("error message")
        .contains("staging"));
}

#[tokio::test]
async fn repointing_the_alias_takes_effect_after_reload() {
    let dir = tempfile::tempdir().expect("tempdir");
    seeded_registry(dir.path());
    let service = registry_service(dir.path(), "champion");
    assert_eq!(
        service.readiness().await.expect("loads").version.as_deref(),
        Some("2")
    );

    let index_path = dir.path().join("loan-default").join("registry.json");
    let mut index: Value =
        serde_json::from_slice(&std::fs::read(&index_path).expect("index readable"))
            .expect("index parses");
    index["aliases"]["champion"] = json!("1");
    std::fs::write(&index_path, serde_json::to_vec(&index).expect("serializes"))
        .expect("index rewritten");

    assert_eq!(
        service.readiness().await.expect("cached").version.as_deref(),
        Some("2")
    );
    let reloaded = service.reload().await.expect("reloads");
    assert_eq!(reloaded.version.as_deref(), Some("1"));
    assert_eq!(reloaded.backend, BackendKind::Booster);
}

#[test]
fn artifact_loader_honours_an_explicit_backend_preference() {
    let dir = tempfile::tempdir().expect("tempdir");
    write_version(
        dir.path(),
        &stump_model(true, &TRAINING_FEATURE_COLUMNS),
        &TRAINING_FEATURE_COLUMNS,
    );
    let model_path = dir.path().join("model.json");
    let schema_path = dir.path().join("feature_cols.json");

    let booster = ArtifactLoader::new(&model_path, &schema_path, BackendPreference::Booster)
        .load()
        .expect("booster loads");
    assert_eq!(booster.metadata().backend, BackendKind::Booster);
    assert_eq!(booster.schema().len(), TRAINING_FEATURE_COLUMNS.len());

    write_version(dir.path(), &stump_model(false, &[]), &TRAINING_FEATURE_COLUMNS);
    let err = ArtifactLoader::new(&model_path, &schema_path, BackendPreference::Classifier)
        .load()
        .expect_err("raw booster is not a classifier");
    assert!(matches!(err, ModelLoadError::NoBackend { .. }));
}

#[test]
fn artifact_loader_rejects_a_schema_the_model_was_not_trained_on() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut reordered = TRAINING_FEATURE_COLUMNS;
    reordered.swap(0, 1);
    write_version(
        dir.path(),
        &stump_model(true, &TRAINING_FEATURE_COLUMNS),
        &reordered,
    );

    let err = ArtifactLoader::new(
        dir.path().join("model.json"),
        dir.path().join("feature_cols.json"),
        BackendPreference::Auto,
    )
    .load()
    .expect_err("column order differs");
    assert!(matches!(err, ModelLoadError::FeatureNamesMismatch { .. }));

    write_version(
        dir.path(),
        &stump_model(false, &[]),
        &TRAINING_FEATURE_COLUMNS[..6],
    );
    let err = ArtifactLoader::new(
        dir.path().join("model.json"),
        dir.path().join("feature_cols.json"),
        BackendPreference::Auto,
    )
    .load()
    .expect_err("schema shorter than the model");
    assert!(matches!(err, ModelLoadError::SchemaLengthMismatch { .. }));
}

#[tokio::test]
async fn missing_artifacts_report_the_configured_path() {
    let dir = tempfile::tempdir().expect("tempdir");
    let loader = SourceLoader::Artifact(ArtifactLoader::new(
        dir.path().join("absent.json"),
        dir.path().join("feature_cols.json"),
        BackendPreference::Auto,
    ));
    let provider = ModelProvider::new(loader, RetryPolicy::default());
    let err = provider.get().await.expect_err("no artifact on disk");
    assert!(err.model_uri.ends_with("absent.json"));
}
