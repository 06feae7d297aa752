//! Evaluator for gradient-boosted tree models saved in XGBoost's JSON format.
//!
//! Only the pieces needed for binary default prediction are read: the tree arrays,
//! the base score, the feature count, and the objective. Features are compared as
//! `f32`, matching how XGBoost stores its training matrix.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use super::backend::{BackendError, Booster, FeatureMatrix, ProbabilisticClassifier};

const SKLEARN_ATTRIBUTE: &str = "scikit_learn";

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("failed to read model artifact {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("model artifact is not valid XGBoost JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("unsupported model artifact: {0}")]
    Unsupported(String),
    #[error("malformed model artifact: {0}")]
    Malformed(String),
}

#[derive(Debug, Deserialize)]
struct ModelDocument {
    learner: LearnerDocument,
}

#[derive(Debug, Deserialize)]
struct LearnerDocument {
    #[serde(default)]
    attributes: BTreeMap<String, String>,
    #[serde(default)]
    feature_names: Vec<String>,
    gradient_booster: GradientBoosterDocument,
    learner_model_param: LearnerModelParam,
    objective: ObjectiveDocument,
}

#[derive(Debug, Deserialize)]
struct GradientBoosterDocument {
    name: String,
    #[serde(default)]
    model: Option<TreeModelDocument>,
}

#[derive(Debug, Deserialize)]
struct TreeModelDocument {
    trees: Vec<TreeDocument>,
}

#[derive(Debug, Deserialize)]
struct TreeDocument {
    left_children: Vec<i64>,
    right_children: Vec<i64>,
    split_indices: Vec<i64>,
    split_conditions: Vec<f32>,
    default_left: Vec<Flag>,
}

/// `default_left` is written as integers by some releases and booleans by others.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
enum Flag {
    Bool(bool),
    Int(u8),
}

impl Flag {
    fn is_set(self) -> bool {
        match self {
            Flag::Bool(value) => value,
            Flag::Int(value) => value != 0,
        }
    }
}

#[derive(Debug, Deserialize)]
struct LearnerModelParam {
    base_score: String,
    num_feature: String,
}

#[derive(Debug, Deserialize)]
struct ObjectiveDocument {
    name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Objective {
    Logistic,
    LogitRaw,
}

impl Objective {
    fn parse(name: &str) -> Result<Self, ArtifactError> {
        match name {
            "binary:logistic" | "reg:logistic" => Ok(Objective::Logistic),
            "binary:logitraw" => Ok(Objective::LogitRaw),
            other => Err(ArtifactError::Unsupported(format!(
                "objective '{other}' does not produce a default probability"
            ))),
        }
    }

    /// Convert the stored base score into margin space.
    fn base_margin(self, base_score: f64) -> Result<f32, ArtifactError> {
        match self {
            Objective::LogitRaw => Ok(base_score as f32),
            Objective::Logistic => {
                if base_score <= 0.0 || base_score >= 1.0 {
                    return Err(ArtifactError::Malformed(format!(
                        "base_score {base_score} must lie strictly between 0 and 1"
                    )));
                }
                Ok((base_score / (1.0 - base_score)).ln() as f32)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum TreeNode {
    Split {
        feature: usize,
        threshold: f32,
        left: usize,
        right: usize,
        default_left: bool,
    },
    Leaf(f32),
}

#[derive(Debug, Clone, PartialEq)]
struct RegressionTree {
    nodes: Vec<TreeNode>,
}

impl RegressionTree {
    fn from_document(
        index: usize,
        doc: TreeDocument,
        num_features: usize,
    ) -> Result<Self, ArtifactError> {
        let len = doc.left_children.len();
        if len == 0
            || doc.right_children.len() != len
            || doc.split_indices.len() != len
            || doc.split_conditions.len() != len
            || doc.default_left.len() != len
        {
            return Err(ArtifactError::Malformed(format!(
                "tree {index} has inconsistent node arrays"
            )));
        }

        let mut nodes = Vec::with_capacity(len);
        for node in 0..len {
            let left = doc.left_children[node];
            if left == -1 {
                nodes.push(TreeNode::Leaf(doc.split_conditions[node]));
                continue;
            }

            let right = doc.right_children[node];
            let feature = doc.split_indices[node];
            // Children always follow their parent, which also rules out cycles.
            let child_in_range = |child: i64| child > node as i64 && (child as usize) < len;
            if !child_in_range(left) || !child_in_range(right) {
                return Err(ArtifactError::Malformed(format!(
                    "tree {index} node {node} points at an invalid child"
                )));
            }
            if feature < 0 || feature as usize >= num_features {
                return Err(ArtifactError::Malformed(format!(
                    "tree {index} node {node} splits on feature {feature} \
                     but the model has {num_features}"
                )));
            }

            nodes.push(TreeNode::Split {
                feature: feature as usize,
                threshold: doc.split_conditions[node],
                left: left as usize,
                right: right as usize,
                default_left: doc.default_left[node].is_set(),
            });
        }

        Ok(Self { nodes })
    }

    fn leaf_value(&self, row: &[f32]) -> f32 {
        let mut index = 0;
        loop {
            match &self.nodes[index] {
                TreeNode::Leaf(value) => return *value,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                    default_left,
                } => {
                    let value = row[*feature];
                    index = if value.is_nan() {
                        if *default_left {
                            *left
                        } else {
                            *right
                        }
                    } else if value < *threshold {
                        *left
                    } else {
                        *right
                    };
                }
            }
        }
    }
}

/// Boosted tree ensemble producing `sigmoid(base_margin + sum(leaves))`.
#[derive(Debug, Clone, PartialEq)]
pub struct TreeEnsemble {
    trees: Vec<RegressionTree>,
    base_margin: f32,
    num_features: usize,
    feature_names: Vec<String>,
    classifier_wrapper: bool,
}

impl TreeEnsemble {
    pub fn from_json_str(raw: &str) -> Result<Self, ArtifactError> {
        let document: ModelDocument = serde_json::from_str(raw)?;
        let learner = document.learner;

        if learner.gradient_booster.name != "gbtree" {
            return Err(ArtifactError::Unsupported(format!(
                "booster '{}' is not a gbtree model",
                learner.gradient_booster.name
            )));
        }
        let model = learner
            .gradient_booster
            .model
            .ok_or_else(|| ArtifactError::Malformed("gbtree model has no trees".to_string()))?;

        let objective = Objective::parse(&learner.objective.name)?;
        let base_score = parse_param("base_score", &learner.learner_model_param.base_score)?;
        let base_margin = objective.base_margin(base_score)?;
        let num_features = parse_param("num_feature", &learner.learner_model_param.num_feature)?;
        if num_features < 1.0 || num_features.fract() != 0.0 {
            return Err(ArtifactError::Malformed(format!(
                "num_feature must be a positive integer (got {num_features})"
            )));
        }
        let num_features = num_features as usize;

        if !learner.feature_names.is_empty() && learner.feature_names.len() != num_features {
            return Err(ArtifactError::Malformed(format!(
                "{} feature names for {num_features} features",
                learner.feature_names.len()
            )));
        }

        let trees = model
            .trees
            .into_iter()
            .enumerate()
            .map(|(index, tree)| RegressionTree::from_document(index, tree, num_features))
            .collect::<Result<Vec<_>, _>>()?;

        let classifier_wrapper = learner
            .attributes
            .get(SKLEARN_ATTRIBUTE)
            .map(|raw| is_classifier_estimator(raw))
            .unwrap_or(false);

        Ok(Self {
            trees,
            base_margin,
            num_features,
            feature_names: learner.feature_names,
            classifier_wrapper,
        })
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ArtifactError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path).map_err(|source| ArtifactError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    /// Column names recorded by the trainer, empty when trained on a bare array.
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    /// Whether the artifact was saved through the scikit-learn classifier wrapper.
    pub fn is_classifier_artifact(&self) -> bool {
        self.classifier_wrapper
    }

    pub fn predict_row(&self, row: &[f32]) -> Result<f64, BackendError> {
        if row.len() != self.num_features {
            return Err(BackendError::FeatureCount {
                expected: self.num_features,
                actual: row.len(),
            });
        }

        let margin = self
            .trees
            .iter()
            .fold(self.base_margin, |sum, tree| sum + tree.leaf_value(row));
        Ok(sigmoid(f64::from(margin)))
    }
}

impl Booster for TreeEnsemble {
    fn predict(&self, matrix: &FeatureMatrix) -> Result<Vec<f64>, BackendError> {
        matrix.iter_rows().map(|row| self.predict_row(row)).collect()
    }

    fn num_features(&self) -> Option<usize> {
        Some(self.num_features)
    }
}

/// Classifier view over a tree ensemble, returning `[1 - p, p]` per row.
#[derive(Debug, Clone)]
pub struct BoostedClassifier {
    ensemble: TreeEnsemble,
}

impl BoostedClassifier {
    pub fn new(ensemble: TreeEnsemble) -> Self {
        Self { ensemble }
    }
}

impl ProbabilisticClassifier for BoostedClassifier {
    fn predict_proba(&self, rows: &[&[f64]]) -> Result<Vec<Vec<f64>>, BackendError> {
        rows.iter()
            .map(|row| {
                let row: Vec<f32> = row.iter().map(|value| *value as f32).collect();
                let positive = self.ensemble.predict_row(&row)?;
                Ok(vec![1.0 - positive, positive])
            })
            .collect()
    }

    fn num_features(&self) -> Option<usize> {
        Some(self.ensemble.num_features)
    }
}

fn sigmoid(margin: f64) -> f64 {
    1.0 / (1.0 + (-margin).exp())
}

/// Parse a numeric learner parameter; newer releases wrap scalars as `[5E-1]`.
fn parse_param(name: &str, raw: &str) -> Result<f64, ArtifactError> {
    let trimmed = raw.trim().trim_start_matches('[').trim_end_matches(']');
    let first = trimmed.split(',').next().unwrap_or_default().trim();
    first
        .parse::<f64>()
        .map_err(|_| ArtifactError::Malformed(format!("{name} '{raw}' is not a number")))
}

fn is_classifier_estimator(raw: &str) -> bool {
    serde_json::from_str::<serde_json::Value>(raw)
        .ok()
        .and_then(|value| {
            value
                .get("_estimator_type")
                .and_then(serde_json::Value::as_str)
                .map(|kind| kind == "classifier")
        })
        .unwrap_or(false)
}

#[cfg(test)]
pub(crate) mod fixtures {
    use serde_json::{json, Value};

    /// Two stumps over `num_feature` inputs: the first splits feature 0 at 30, the
    /// second splits feature 4 at 20000.
    pub(crate) fn stump_model(num_feature: usize, classifier: bool) -> Value {
        let mut learner = json!({
            "attributes": {},
            "feature_names": [],
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
                            "default_left": [false, false, false],
                            "base_weights": [0.0, -0.3, 0.5]
                        }
                    ]
                }
            },
            "learner_model_param": {
                "base_score": "5E-1",
                "num_class": "0",
                "num_feature": num_feature.to_string()
            },
            "objective": {"name": "binary:logistic", "reg_loss_param": {"scale_pos_weight": "1"}}
        });
        if classifier {
            learner["attributes"] = json!({
                "scikit_learn": "{\"_estimator_type\": \"classifier\", \"n_classes_\": 2}"
            });
        }
        json!({"learner": learner, "version": [2, 0, 3]})
    }
}
