//! Capabilities the evaluation needs from a trained model.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::schema::FeatureMatrix;

/// Class treated as positive by every metric and diagnostic.
pub const POSITIVE_LABEL: i8 = 1;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScoringError {
    #[error("Model expects {expected} features, matrix has {got}")]
    FeatureCountMismatch { expected: usize, got: usize },
    #[error("Feature {position}: model expects `{expected}`, matrix has `{got}`")]
    FeatureNameMismatch {
        position: usize,
        expected: String,
        got: String,
    },
    #[error("Cannot attach {got} feature names to a model with {expected} features")]
    FeatureNameCount { expected: usize, got: usize },
    #[error("{got} predictions for {expected} records")]
    PredictionCount { expected: usize, got: usize },
}

/// One predicted label per input row, in row order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct PredictionVector {
    labels: Vec<i8>,
    /// Positive class probability per row.
    probabilities: Vec<f32>,
}

impl PredictionVector {
    /// Labels are derived from the probabilities: positive when above one half.
    pub fn from_probabilities(probabilities: Vec<f32>) -> Self {
        let labels = probabilities
            .iter()
            .map(|p| if *p > 0.5 { POSITIVE_LABEL } else { 0 })
            .collect();
        Self {
            labels,
            probabilities,
        }
    }

    /// Hard labels without scores; every probability is taken as the label itself.
    pub fn from_labels(labels: Vec<i8>) -> Self {
        let probabilities = labels.iter().map(|l| *l as f32).collect();
        Self {
            labels,
            probabilities,
        }
    }

    pub fn labels(&self) -> &[i8] {
        &self.labels
    }

    pub fn probabilities(&self) -> &[f32] {
        &self.probabilities
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn positive_count(&self) -> usize {
        self.labels.iter().filter(|l| **l == POSITIVE_LABEL).count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ImportanceType {
    /// Number of splits using the feature.
    Weight,
    /// Average loss reduction of the splits using the feature.
    Gain,
    /// Average hessian sum of the samples reaching those splits.
    Cover,
}

/// Feature name to importance score. Features the model never splits on are absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct FeatureImportance(BTreeMap<String, f64>);

impl FeatureImportance {
    pub fn new(scores: BTreeMap<String, f64>) -> Self {
        Self(scores)
    }

    pub fn get(&self, feature: &str) -> Option<f64> {
        self.0.get(feature).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Highest scores first, ties broken by name. At most `limit` entries.
    pub fn top(&self, limit: usize) -> Vec<(String, f64)> {
        let mut ranked: Vec<(String, f64)> = self.0.iter().map(|(k, v)| (k.clone(), *v)).collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(limit);
        ranked
    }
}

/// Batch scoring.
pub trait Predictor {
    /// Must return exactly one label per row of `features`, in row order.
    fn predict(&self, features: &FeatureMatrix) -> Result<PredictionVector, ScoringError>;
}

/// Access to the model's internal feature importance.
pub trait ImportanceSource {
    /// Attach names so importance is reported per named column instead of `f0..fN`.
    fn set_feature_names(&mut self, names: &[String]) -> Result<(), ScoringError>;

    fn importance(&self, kind: ImportanceType) -> FeatureImportance;
}
