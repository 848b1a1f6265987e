//! Validated boosted-tree ensemble built from an [`XgbModel`].

use std::collections::BTreeMap;

use ndarray::ArrayView1;

use super::ArtifactError;
use super::format::{ModelTrees, Tree, XgbModel};
use crate::scorer::{FeatureImportance, ImportanceType, PredictionVector, ScoringError};
use crate::schema::FeatureMatrix;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryObjective {
    /// Output is a probability; `base_score` is stored in probability space.
    Logistic,
    /// Output is the raw margin.
    LogitRaw,
}

impl BinaryObjective {
    fn from_name(name: &str) -> Result<Self, ArtifactError> {
        match name {
            "binary:logistic" => Ok(Self::Logistic),
            "binary:logitraw" => Ok(Self::LogitRaw),
            other => Err(ArtifactError::UnsupportedObjective(other.to_string())),
        }
    }

    fn base_margin(self, base_score: f32) -> f32 {
        match self {
            Self::Logistic => {
                let p = base_score.clamp(1e-7, 1.0 - 1e-7);
                (p / (1.0 - p)).ln()
            }
            Self::LogitRaw => base_score,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Node {
    left: u32,
    right: u32,
    feature: u32,
    /// Split threshold, or the leaf value for leaves.
    value: f32,
    default_left: bool,
    gain: f64,
    cover: f64,
    leaf: bool,
}

#[derive(Debug, Clone, PartialEq)]
struct RegTree {
    nodes: Vec<Node>,
}

impl RegTree {
    fn leaf_value(&self, row: &ArrayView1<'_, f32>) -> f32 {
        let mut idx = 0usize;
        loop {
            let node = &self.nodes[idx];
            if node.leaf {
                return node.value;
            }
            let x = row[node.feature as usize];
            let go_left = if x.is_nan() {
                node.default_left
            } else {
                x < node.value
            };
            idx = (if go_left { node.left } else { node.right }) as usize;
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TreeEnsemble {
    trees: Vec<RegTree>,
    objective: BinaryObjective,
    base_margin: f32,
    num_feature: usize,
    /// Names recorded at training time, if any.
    trained_names: Vec<String>,
    /// Names attached for importance reporting.
    feature_names: Vec<String>,
}

impl TryFrom<XgbModel> for TreeEnsemble {
    type Error = ArtifactError;

    fn try_from(model: XgbModel) -> Result<Self, Self::Error> {
        let learner = model.learner;
        let booster = learner.gradient_booster;
        if booster.name != "gbtree" {
            return Err(ArtifactError::UnsupportedBooster(booster.name));
        }

        let num_class = learner.learner_model_param.num_class;
        if num_class > 1 {
            return Err(ArtifactError::NotBinary(num_class));
        }
        let objective = BinaryObjective::from_name(&learner.objective.name)?;

        let num_feature = usize::try_from(learner.learner_model_param.num_feature)
            .map_err(|_| ArtifactError::Malformed("num_feature is negative".to_string()))?;
        if !learner.feature_names.is_empty() && learner.feature_names.len() != num_feature {
            return Err(ArtifactError::Malformed(format!(
                "{} feature names for {} features",
                learner.feature_names.len(),
                num_feature
            )));
        }

        let body = booster
            .model
            .ok_or_else(|| ArtifactError::Malformed("gbtree has no model".to_string()))?;
        let model_trees: ModelTrees =
            serde_json::from_value(body).map_err(|e| ArtifactError::Malformed(e.to_string()))?;
        if let Some(group) = model_trees.tree_info.iter().find(|g| **g != 0) {
            return Err(ArtifactError::Malformed(format!(
                "tree group {group} in a single output model"
            )));
        }

        let trees = model_trees
            .trees
            .iter()
            .enumerate()
            .map(|(idx, tree)| convert_tree(tree, idx, num_feature))
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(
            "Loaded {} trees over {} features ({:?}, xgboost {:?})",
            trees.len(),
            num_feature,
            objective,
            model.version
        );

        Ok(Self {
            trees,
            objective,
            base_margin: objective.base_margin(learner.learner_model_param.base_score),
            num_feature,
            feature_names: learner.feature_names.clone(),
            trained_names: learner.feature_names,
        })
    }
}

fn convert_tree(tree: &Tree, idx: usize, num_feature: usize) -> Result<RegTree, ArtifactError> {
    let invalid = |reason: String| ArtifactError::InvalidTree { tree: idx, reason };

    let num_nodes = usize::try_from(tree.tree_param.num_nodes)
        .map_err(|_| invalid("num_nodes is negative".to_string()))?;
    if num_nodes == 0 {
        return Err(invalid("tree has no nodes".to_string()));
    }

    let required = [
        ("left_children", tree.left_children.len()),
        ("right_children", tree.right_children.len()),
        ("split_indices", tree.split_indices.len()),
        ("split_conditions", tree.split_conditions.len()),
        ("default_left", tree.default_left.len()),
    ];
    let optional = [
        ("loss_changes", tree.loss_changes.len()),
        ("sum_hessian", tree.sum_hessian.len()),
        ("split_type", tree.split_type.len()),
    ];
    for (name, len) in required
        .into_iter()
        .chain(optional.into_iter().filter(|(_, len)| *len != 0))
    {
        if len != num_nodes {
            return Err(invalid(format!("{name} has {len} entries for {num_nodes} nodes")));
        }
    }

    let mut nodes = Vec::with_capacity(num_nodes);
    for node in 0..num_nodes {
        let left = tree.left_children[node];
        let right = tree.right_children[node];
        let leaf = left == -1;
        let value = tree.split_conditions[node];

        if leaf {
            if right != -1 {
                return Err(invalid(format!("node {node} has only a right child")));
            }
        } else {
            for child in [left, right] {
                if child <= node as i32 || child as usize >= num_nodes {
                    return Err(invalid(format!(
                        "node {node} references child {child} but tree has {num_nodes} nodes"
                    )));
                }
            }
            let feature = tree.split_indices[node];
            if feature < 0 || feature as usize >= num_feature {
                return Err(invalid(format!(
                    "node {node} splits on feature {feature} of {num_feature}"
                )));
            }
            if tree.split_type.get(node).is_some_and(|t| *t != 0) {
                return Err(invalid(format!("node {node} uses a categorical split")));
            }
            if value.is_nan() {
                return Err(invalid(format!("node {node} has a NaN threshold")));
            }
        }

        nodes.push(Node {
            left: if leaf { 0 } else { left as u32 },
            right: if leaf { 0 } else { right as u32 },
            feature: if leaf { 0 } else { tree.split_indices[node] as u32 },
            value,
            default_left: tree.default_left[node] != 0,
            gain: tree.loss_changes.get(node).copied().unwrap_or(0.0),
            cover: tree.sum_hessian.get(node).copied().unwrap_or(0.0),
            leaf,
        });
    }

    Ok(RegTree { nodes })
}

#[inline]
fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

impl TreeEnsemble {
    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn num_feature(&self) -> usize {
        self.num_feature
    }

    pub fn objective(&self) -> BinaryObjective {
        self.objective
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn set_feature_names(&mut self, names: &[String]) -> Result<(), ScoringError> {
        if names.len() != self.num_feature {
            return Err(ScoringError::FeatureNameCount {
                expected: self.num_feature,
                got: names.len(),
            });
        }
        self.feature_names = names.to_vec();
        Ok(())
    }

    /// Raw margin for one row.
    pub fn margin(&self, row: &ArrayView1<'_, f32>) -> f32 {
        self.trees
            .iter()
            .fold(self.base_margin, |acc, tree| acc + tree.leaf_value(row))
    }

    fn check_columns(&self, features: &FeatureMatrix) -> Result<(), ScoringError> {
        if features.ncols() != self.num_feature {
            return Err(ScoringError::FeatureCountMismatch {
                expected: self.num_feature,
                got: features.ncols(),
            });
        }
        if let Some((position, (expected, got))) = self
            .trained_names
            .iter()
            .zip(features.names())
            .enumerate()
            .find(|(_, (expected, got))| expected != got)
        {
            return Err(ScoringError::FeatureNameMismatch {
                position,
                expected: expected.clone(),
                got: got.clone(),
            });
        }
        Ok(())
    }

    pub fn predict(&self, features: &FeatureMatrix) -> Result<PredictionVector, ScoringError> {
        self.check_columns(features)?;
        let array = features.to_array();
        let probabilities = array
            .rows()
            .into_iter()
            .map(|row| sigmoid(self.margin(&row)))
            .collect();
        Ok(PredictionVector::from_probabilities(probabilities))
    }

    fn feature_label(&self, feature: usize) -> String {
        self.feature_names
            .get(feature)
            .cloned()
            .unwrap_or_else(|| format!("f{feature}"))
    }

    /// Importance per feature over every split node, XGBoost `get_score` style.
    pub fn importance(&self, kind: ImportanceType) -> FeatureImportance {
        let mut totals: BTreeMap<usize, (f64, f64)> = BTreeMap::new();
        for node in self.trees.iter().flat_map(|t| &t.nodes).filter(|n| !n.leaf) {
            let entry = totals.entry(node.feature as usize).or_insert((0.0, 0.0));
            entry.0 += 1.0;
            entry.1 += match kind {
                ImportanceType::Weight => 0.0,
                ImportanceType::Gain => node.gain,
                ImportanceType::Cover => node.cover,
            };
        }

        let scores = totals
            .into_iter()
            .map(|(feature, (count, sum))| {
                let score = match kind {
                    ImportanceType::Weight => count,
                    ImportanceType::Gain | ImportanceType::Cover => sum / count,
                };
                (self.feature_label(feature), score)
            })
            .collect();
        FeatureImportance::new(scores)
    }
}
