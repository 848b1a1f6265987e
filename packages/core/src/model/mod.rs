//! Trained model artifact.
//!
//! The artifact is a composite pipeline document whose `steps` object holds
//! the boosted-tree stage under [`BOOSTER_STEP`]. That stage is an XGBoost
//! JSON model; see [`format`] for the subset that is read. Any other step
//! (scaler, imputer, ...) would transform features before scoring and cannot
//! be applied here, so the artifact is rejected.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::schema::FeatureMatrix;
use crate::scorer::{
    FeatureImportance, ImportanceSource, ImportanceType, PredictionVector, Predictor, ScoringError,
};

pub mod ensemble;
pub mod format;

#[cfg(test)]
pub(crate) mod fixtures;

pub use ensemble::{BinaryObjective, TreeEnsemble};
pub use format::XgbModel;

/// Key of the boosted-tree stage inside the pipeline's `steps`.
pub const BOOSTER_STEP: &str = "xgb";

#[derive(Debug, thiserror::Error)]
pub enum ArtifactError {
    #[error("Failed to read model artifact {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse model artifact {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Pipeline has no `{0}` step")]
    MissingStep(String),
    #[error("Unsupported pipeline step `{0}`, only `xgb` can be applied")]
    UnsupportedStep(String),
    #[error("Unsupported booster `{0}`, only gbtree can be scored")]
    UnsupportedBooster(String),
    #[error("Unsupported objective `{0}`, expected binary:logistic or binary:logitraw")]
    UnsupportedObjective(String),
    #[error("Model has {0} classes, expected a binary classifier")]
    NotBinary(i64),
    #[error("Tree {tree} is invalid: {reason}")]
    InvalidTree { tree: usize, reason: String },
    #[error("Malformed model: {0}")]
    Malformed(String),
}

/// On-disk pipeline document.
#[derive(Debug, Clone, Deserialize)]
pub struct ModelArtifact {
    pub steps: Map<String, Value>,
}

impl ModelArtifact {
    /// Read and validate the pipeline stored at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<TreePipeline, ArtifactError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|source| ArtifactError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let artifact: ModelArtifact =
            serde_json::from_slice(&bytes).map_err(|source| ArtifactError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        tracing::debug!(
            "Read pipeline {} with steps {:?}",
            path.display(),
            artifact.steps.keys().collect::<Vec<_>>()
        );
        artifact.into_pipeline()
    }

    pub fn into_pipeline(mut self) -> Result<TreePipeline, ArtifactError> {
        let stage = self
            .steps
            .remove(BOOSTER_STEP)
            .ok_or_else(|| ArtifactError::MissingStep(BOOSTER_STEP.to_string()))?;
        if let Some(step) = self.steps.keys().min() {
            return Err(ArtifactError::UnsupportedStep(step.clone()));
        }
        let model: XgbModel =
            serde_json::from_value(stage).map_err(|e| ArtifactError::Malformed(e.to_string()))?;
        Ok(TreePipeline {
            booster: TreeEnsemble::try_from(model)?,
        })
    }
}

/// Loaded pipeline, scored through its boosted-tree stage.
#[derive(Debug, Clone)]
pub struct TreePipeline {
    booster: TreeEnsemble,
}

impl TreePipeline {
    pub fn booster(&self) -> &TreeEnsemble {
        &self.booster
    }
}

impl Predictor for TreePipeline {
    fn predict(&self, features: &FeatureMatrix) -> Result<PredictionVector, ScoringError> {
        self.booster.predict(features)
    }
}

impl ImportanceSource for TreePipeline {
    fn set_feature_names(&mut self, names: &[String]) -> Result<(), ScoringError> {
        self.booster.set_feature_names(names)
    }

    fn importance(&self, kind: ImportanceType) -> FeatureImportance {
        self.booster.importance(kind)
    }
}
