use std::path::PathBuf;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::schema::SchemaError;

/// Where the evaluation dataset lives and which of its columns matter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct DatasetInfo {
    /// Feature columns, in the order the model expects them.
    pub feature_names: Vec<String>,
    /// Only the first entry is used, as the ground-truth column.
    pub target_names: Vec<String>,
    /// Query returning the held-out records.
    pub sql: String,
}

impl DatasetInfo {
    pub fn target_name(&self) -> Result<&str, SchemaError> {
        self.target_names
            .first()
            .map(String::as_str)
            .ok_or(SchemaError::NoTarget)
    }
}

/// Inputs for a single evaluation run. Read only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct EvaluationContext {
    pub artifact_input_path: PathBuf,
    pub artifact_output_path: PathBuf,
    pub dataset_info: DatasetInfo,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
}

impl EvaluationContext {
    pub fn new(
        artifact_input_path: impl Into<PathBuf>,
        artifact_output_path: impl Into<PathBuf>,
        dataset_info: DatasetInfo,
    ) -> Self {
        Self {
            artifact_input_path: artifact_input_path.into(),
            artifact_output_path: artifact_output_path.into(),
            dataset_info,
            model_id: None,
            model_version: None,
            job_id: None,
        }
    }

    pub fn with_model(mut self, model_id: impl Into<String>, version: impl Into<String>) -> Self {
        self.model_id = Some(model_id.into());
        self.model_version = Some(version.into());
        self
    }

    pub fn with_job(mut self, job_id: impl Into<String>) -> Self {
        self.job_id = Some(job_id.into());
        self
    }

    pub fn feature_names(&self) -> &[String] {
        &self.dataset_info.feature_names
    }

    pub fn target_name(&self) -> Result<&str, SchemaError> {
        self.dataset_info.target_name()
    }
}
