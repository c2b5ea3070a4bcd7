use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::models::features::{FeatureVector, FEATURE_COUNT, FEATURE_NAMES};

#[derive(Debug, Error)]
pub enum ModelLoadError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Invalid model artifact {path}: {reason}")]
    Invalid { path: PathBuf, reason: String },
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScoringError {
    #[error("Feature {0} is not a finite number")]
    NonFiniteFeature(&'static str),
    #[error("Scaled feature {0} is not a finite number")]
    NonFiniteScaledFeature(&'static str),
    #[error("Classifier produced a non-finite score")]
    NonFiniteScore,
    #[error("Classifier could not reach a leaf in tree {0}")]
    TreeTraversal(usize),
}

/// Normalization applied to the raw feature row before classification.
pub trait FeatureScaler: Send + Sync {
    fn transform(&self, row: &[f64; FEATURE_COUNT]) -> Result<[f64; FEATURE_COUNT], ScoringError>;
}

/// Binary default-risk classifier over a normalized row.
pub trait RiskClassifier: Send + Sync {
    fn kind(&self) -> &'static str;
    fn predict(&self, row: &[f64; FEATURE_COUNT]) -> Result<u8, ScoringError>;
}

#[derive(Debug, Clone, Deserialize)]
struct ScalerArtifact {
    mean: Vec<f64>,
    scale: Vec<f64>,
}

/// (x - mean) / scale per feature.
#[derive(Debug, Clone)]
pub struct StandardScaler {
    mean: [f64; FEATURE_COUNT],
    scale: [f64; FEATURE_COUNT],
}

impl StandardScaler {
    pub fn new(mean: &[f64], scale: &[f64]) -> Result<Self, String> {
        let mean: [f64; FEATURE_COUNT] = mean
            .try_into()
            .map_err(|_| format!("expected {FEATURE_COUNT} means, got {}", mean.len()))?;
        let scale: [f64; FEATURE_COUNT] = scale
            .try_into()
            .map_err(|_| format!("expected {FEATURE_COUNT} scales, got {}", scale.len()))?;

        for (i, (m, s)) in mean.iter().zip(scale.iter()).enumerate() {
            if !m.is_finite() {
                return Err(format!("mean of {} is not finite", FEATURE_NAMES[i]));
            }
            if !s.is_finite() || *s == 0.0 {
                return Err(format!("scale of {} must be finite and non-zero", FEATURE_NAMES[i]));
            }
        }

        Ok(Self { mean, scale })
    }

    pub fn load(path: &Path) -> Result<Self, ModelLoadError> {
        let artifact: ScalerArtifact = read_artifact(path)?;
        Self::new(&artifact.mean, &artifact.scale).map_err(|reason| ModelLoadError::Invalid {
            path: path.to_path_buf(),
            reason,
        })
    }
}

impl FeatureScaler for StandardScaler {
    fn transform(&self, row: &[f64; FEATURE_COUNT]) -> Result<[f64; FEATURE_COUNT], ScoringError> {
        let mut scaled = [0.0; FEATURE_COUNT];
        for i in 0..FEATURE_COUNT {
            scaled[i] = (row[i] - self.mean[i]) / self.scale[i];
            if !scaled[i].is_finite() {
                return Err(ScoringError::NonFiniteScaledFeature(FEATURE_NAMES[i]));
            }
        }
        Ok(scaled)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
enum ClassifierArtifact {
    RandomForest {
        classes: Vec<i64>,
        estimators: Vec<DecisionTree>,
    },
    LogisticRegression {
        coefficients: Vec<f64>,
        intercept: f64,
        #[serde(default = "default_decision_threshold")]
        threshold: f64,
    },
}

fn default_decision_threshold() -> f64 {
    0.5
}

/// One fitted tree in flat array form. Node 0 is the root; a node whose
/// left child is -1 is a leaf.
#[derive(Debug, Clone, Deserialize)]
pub struct DecisionTree {
    pub children_left: Vec<i64>,
    pub children_right: Vec<i64>,
    pub feature: Vec<i64>,
    pub threshold: Vec<f64>,
    pub value: Vec<Vec<f64>>,
}

impl DecisionTree {
    fn validate(&self, n_classes: usize) -> Result<(), String> {
        let nodes = self.children_left.len();
        if nodes == 0 {
            return Err("tree has no nodes".to_string());
        }
        if self.children_right.len() != nodes
            || self.feature.len() != nodes
            || self.threshold.len() != nodes
            || self.value.len() != nodes
        {
            return Err("tree node arrays have different lengths".to_string());
        }

        for node in 0..nodes {
            let left = self.children_left[node];
            let right = self.children_right[node];

            if left == -1 {
                let weights = &self.value[node];
                if weights.len() != n_classes {
                    return Err(format!(
                        "leaf {node} has {} class weights, expected {n_classes}",
                        weights.len()
                    ));
                }
                if weights.iter().any(|w| !w.is_finite() || *w < 0.0) || weights.iter().sum::<f64>() <= 0.0 {
                    return Err(format!("leaf {node} has invalid class weights"));
                }
                continue;
            }

            // Children always sit after their parent, which rules out cycles.
            for child in [left, right] {
                if child <= node as i64 || child >= nodes as i64 {
                    return Err(format!("node {node} points to invalid child {child}"));
                }
            }
            let feature = self.feature[node];
            if feature < 0 || feature >= FEATURE_COUNT as i64 {
                return Err(format!("node {node} splits on unknown feature {feature}"));
            }
            if !self.threshold[node].is_finite() {
                return Err(format!("node {node} has a non-finite threshold"));
            }
        }

        Ok(())
    }

    fn leaf_weights(&self, row: &[f64; FEATURE_COUNT]) -> Option<&[f64]> {
        let mut node = 0usize;
        for _ in 0..self.children_left.len() {
            let left = self.children_left[node];
            if left == -1 {
                return Some(&self.value[node]);
            }
            let feature = self.feature[node] as usize;
            node = if row[feature] <= self.threshold[node] {
                left as usize
            } else {
                self.children_right[node] as usize
            };
        }
        None
    }
}

/// Averages the normalized leaf distributions of every tree.
#[derive(Debug, Clone)]
pub struct RandomForest {
    classes: Vec<u8>,
    estimators: Vec<DecisionTree>,
}

impl RandomForest {
    pub fn new(classes: &[i64], estimators: Vec<DecisionTree>) -> Result<Self, String> {
        if classes.is_empty() {
            return Err("forest has no classes".to_string());
        }
        let classes = classes
            .iter()
            .map(|c| match c {
                0 => Ok(0u8),
                1 => Ok(1u8),
                other => Err(format!("unsupported class label {other}")),
            })
            .collect::<Result<Vec<u8>, String>>()?;
        if estimators.is_empty() {
            return Err("forest has no estimators".to_string());
        }
        for (index, tree) in estimators.iter().enumerate() {
            tree.validate(classes.len())
                .map_err(|reason| format!("estimator {index}: {reason}"))?;
        }

        Ok(Self { classes, estimators })
    }

    pub fn predict_proba(&self, row: &[f64; FEATURE_COUNT]) -> Result<Vec<f64>, ScoringError> {
        let mut totals = vec![0.0; self.classes.len()];
        for (index, tree) in self.estimators.iter().enumerate() {
            let weights = tree.leaf_weights(row).ok_or(ScoringError::TreeTraversal(index))?;
            let sum: f64 = weights.iter().sum();
            for (total, weight) in totals.iter_mut().zip(weights) {
                *total += weight / sum;
            }
        }

        let n = self.estimators.len() as f64;
        Ok(totals.into_iter().map(|t| t / n).collect())
    }
}

impl RiskClassifier for RandomForest {
    fn kind(&self) -> &'static str {
        "random_forest"
    }

    fn predict(&self, row: &[f64; FEATURE_COUNT]) -> Result<u8, ScoringError> {
        let proba = self.predict_proba(row)?;
        if proba.iter().any(|p| !p.is_finite()) {
            return Err(ScoringError::NonFiniteScore);
        }

        // First class wins ties.
        let mut best = 0;
        for (index, p) in proba.iter().enumerate().skip(1) {
            if *p > proba[best] {
                best = index;
            }
        }
        Ok(self.classes[best])
    }
}

#[derive(Debug, Clone)]
pub struct LogisticRegression {
    coefficients: [f64; FEATURE_COUNT],
    intercept: f64,
    threshold: f64,
}

impl LogisticRegression {
    pub fn new(coefficients: &[f64], intercept: f64, threshold: f64) -> Result<Self, String> {
        let coefficients: [f64; FEATURE_COUNT] = coefficients.try_into().map_err(|_| {
            format!("expected {FEATURE_COUNT} coefficients, got {}", coefficients.len())
        })?;
        if coefficients.iter().any(|c| !c.is_finite()) || !intercept.is_finite() {
            return Err("coefficients and intercept must be finite".to_string());
        }
        if !(0.0..=1.0).contains(&threshold) {
            return Err(format!("decision threshold {threshold} is outside [0, 1]"));
        }

        Ok(Self {
            coefficients,
            intercept,
            threshold,
        })
    }

    pub fn predict_proba(&self, row: &[f64; FEATURE_COUNT]) -> f64 {
        let z = self.intercept
            + self
                .coefficients
                .iter()
                .zip(row.iter())
                .map(|(w, x)| w * x)
                .sum::<f64>();
        1.0 / (1.0 + (-z).exp())
    }
}

impl RiskClassifier for LogisticRegression {
    fn kind(&self) -> &'static str {
        "logistic_regression"
    }

    fn predict(&self, row: &[f64; FEATURE_COUNT]) -> Result<u8, ScoringError> {
        let prob = self.predict_proba(row);
        if !prob.is_finite() {
            return Err(ScoringError::NonFiniteScore);
        }
        Ok(u8::from(prob >= self.threshold))
    }
}

/// Loads a classifier artifact, dispatching on its `kind` tag.
pub fn load_classifier(path: &Path) -> Result<Box<dyn RiskClassifier>, ModelLoadError> {
    let artifact: ClassifierArtifact = read_artifact(path)?;
    let invalid = |reason: String| ModelLoadError::Invalid {
        path: path.to_path_buf(),
        reason,
    };

    match artifact {
        ClassifierArtifact::RandomForest { classes, estimators } => {
            let forest = RandomForest::new(&classes, estimators).map_err(invalid)?;
            Ok(Box::new(forest))
        }
        ClassifierArtifact::LogisticRegression {
            coefficients,
            intercept,
            threshold,
        } => {
            let model = LogisticRegression::new(&coefficients, intercept, threshold).map_err(invalid)?;
            Ok(Box::new(model))
        }
    }
}

fn read_artifact<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, ModelLoadError> {
    let raw = fs::read_to_string(path).map_err(|source| ModelLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| ModelLoadError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Scaler + classifier pair, built once at startup and shared read-only.
pub struct RiskModel {
    scaler: Box<dyn FeatureScaler>,
    classifier: Box<dyn RiskClassifier>,
}

impl RiskModel {
    pub fn new(scaler: Box<dyn FeatureScaler>, classifier: Box<dyn RiskClassifier>) -> Self {
        Self { scaler, classifier }
    }

    pub fn load(model_path: &Path, scaler_path: &Path) -> Result<Self, ModelLoadError> {
        let classifier = load_classifier(model_path)?;
        let scaler = StandardScaler::load(scaler_path)?;
        Ok(Self::new(Box::new(scaler), classifier))
    }

    pub fn classifier_kind(&self) -> &'static str {
        self.classifier.kind()
    }

    pub fn score(&self, features: &FeatureVector) -> Result<u8, ScoringError> {
        let row = features.to_row();
        if let Some(index) = row.iter().position(|v| !v.is_finite()) {
            return Err(ScoringError::NonFiniteFeature(FEATURE_NAMES[index]));
        }

        let scaled = self.scaler.transform(&row)?;
        self.classifier.predict(&scaled)
    }
}

impl std::fmt::Debug for RiskModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RiskModel")
            .field("classifier", &self.classifier.kind())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity_scaler() -> StandardScaler {
        StandardScaler::new(&[0.0; FEATURE_COUNT], &[1.0; FEATURE_COUNT]).expect("scaler")
    }

    /// Single split on Debt_to_Income_Ratio (index 7) at 1.0.
    fn debt_stump(low_weights: Vec<f64>, high_weights: Vec<f64>) -> DecisionTree {
        DecisionTree {
            children_left: vec![1, -1, -1],
            children_right: vec![2, -1, -1],
            feature: vec![7, -2, -2],
            threshold: vec![1.0, -2.0, -2.0],
            value: vec![vec![1.0, 1.0], low_weights, high_weights],
        }
    }

    fn features(debt_to_income_ratio: f64) -> FeatureVector {
        FeatureVector {
            age: 30.0,
            estimated_income: 1000.0,
            credit_card_balance: 100.0,
            bank_loans: 100.0,
            superannuation_savings: 50.0,
            saving_accounts: 50.0,
            properties_owned: 1.0,
            debt_to_income_ratio,
            savings_to_debt_ratio: 0.5,
        }
    }

    #[test]
    fn scaler_standardizes_each_feature() {
        let mut mean = [0.0; FEATURE_COUNT];
        let mut scale = [1.0; FEATURE_COUNT];
        mean[1] = 1000.0;
        scale[1] = 500.0;
        let scaler = StandardScaler::new(&mean, &scale).expect("scaler");

        let mut row = [0.0; FEATURE_COUNT];
        row[1] = 2000.0;
        let scaled = scaler.transform(&row).expect("transform");
        assert_eq!(scaled[1], 2.0);
    }

    #[test]
    fn scaler_rejects_wrong_width_and_zero_scale() {
        assert!(StandardScaler::new(&[0.0; 8], &[1.0; 8]).is_err());
        let mut scale = [1.0; FEATURE_COUNT];
        scale[4] = 0.0;
        let err = StandardScaler::new(&[0.0; FEATURE_COUNT], &scale).unwrap_err();
        assert!(err.contains("Superannuation Savings"));
    }

    #[test]
    fn forest_votes_by_mean_probability() {
        let forest = RandomForest::new(
            &[0, 1],
            vec![
                debt_stump(vec![9.0, 1.0], vec![1.0, 9.0]),
                debt_stump(vec![8.0, 2.0], vec![4.0, 6.0]),
            ],
        )
        .expect("forest");
        let model = RiskModel::new(Box::new(identity_scaler()), Box::new(forest));

        assert_eq!(model.score(&features(0.2)).expect("score"), 0);
        assert_eq!(model.score(&features(3.0)).expect("score"), 1);
    }

    #[test]
    fn forest_ties_go_to_first_class() {
        let forest = RandomForest::new(&[0, 1], vec![debt_stump(vec![5.0, 5.0], vec![5.0, 5.0])])
            .expect("forest");
        assert_eq!(forest.predict(&features(3.0).to_row()).expect("predict"), 0);
    }

    #[test]
    fn forest_rejects_malformed_trees() {
        let mut cyclic = debt_stump(vec![1.0, 0.0], vec![0.0, 1.0]);
        cyclic.children_left[0] = 0;
        assert!(RandomForest::new(&[0, 1], vec![cyclic]).is_err());

        let mut bad_feature = debt_stump(vec![1.0, 0.0], vec![0.0, 1.0]);
        bad_feature.feature[0] = 9;
        assert!(RandomForest::new(&[0, 1], vec![bad_feature]).is_err());

        assert!(RandomForest::new(&[0, 2], vec![debt_stump(vec![1.0, 0.0], vec![0.0, 1.0])]).is_err());
        assert!(RandomForest::new(&[0, 1], Vec::new()).is_err());
    }

    #[test]
    fn logistic_regression_thresholds_probability() {
        let mut coefficients = [0.0; FEATURE_COUNT];
        coefficients[7] = 4.0;
        let model = LogisticRegression::new(&coefficients, -4.0, 0.5).expect("model");

        assert_eq!(model.predict(&features(0.2).to_row()).expect("predict"), 0);
        assert_eq!(model.predict(&features(1.0).to_row()).expect("predict"), 1);
        assert!((model.predict_proba(&features(1.0).to_row()) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn non_finite_features_are_scoring_errors() {
        let forest = RandomForest::new(&[0, 1], vec![debt_stump(vec![1.0, 0.0], vec![0.0, 1.0])])
            .expect("forest");
        let model = RiskModel::new(Box::new(identity_scaler()), Box::new(forest));

        let err = model.score(&features(f64::INFINITY)).unwrap_err();
        assert_eq!(err, ScoringError::NonFiniteFeature("Debt_to_Income_Ratio"));
    }

    #[test]
    fn artifacts_load_from_json() {
        let dir = tempfile::tempdir().expect("temp dir");
        let model_path = dir.path().join("model.json");
        let scaler_path = dir.path().join("scaler.json");

        std::fs::write(
            &model_path,
            serde_json::json!({
                "kind": "logistic_regression",
                "coefficients": [0, 0, 0, 0, 0, 0, 0, 4.0, 0],
                "intercept": -4.0
            })
            .to_string(),
        )
        .expect("write model");
        let means = vec![0.0; FEATURE_COUNT];
        let scales = vec![1.0; FEATURE_COUNT];
        std::fs::write(
            &scaler_path,
            serde_json::json!({ "mean": means, "scale": scales }).to_string(),
        )
        .expect("write scaler");

        let model = RiskModel::load(&model_path, &scaler_path).expect("load");
        assert_eq!(model.classifier_kind(), "logistic_regression");
        assert_eq!(model.score(&features(2.0)).expect("score"), 1);
    }

    #[test]
    fn missing_or_corrupt_artifacts_fail_to_load() {
        let dir = tempfile::tempdir().expect("temp dir");
        let missing = dir.path().join("missing.json");
        assert!(matches!(
            load_classifier(&missing),
            Err(ModelLoadError::Io { .. })
        ));

        let corrupt = dir.path().join("corrupt.json");
        std::fs::write(&corrupt, "{ not json").expect("write");
        assert!(matches!(
            StandardScaler::load(&corrupt),
            Err(ModelLoadError::Parse { .. })
        ));

        let unknown = dir.path().join("unknown.json");
        std::fs::write(&unknown, r#"{"kind": "svm"}"#).expect("write");
        assert!(matches!(
            load_classifier(&unknown),
            Err(ModelLoadError::Parse { .. })
        ));
    }
}
