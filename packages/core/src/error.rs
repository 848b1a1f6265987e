use std::fmt;

use scorecard_storage::StoreError;

use crate::metrics::MetricsError;
use crate::model::ArtifactError;
use crate::schema::SchemaError;
use crate::scorer::ScoringError;

pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Steps of an evaluation run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Load,
    Type,
    Score,
    Metrics,
    PersistMetrics,
    Plots,
    PublishPredictions,
    RecordStats,
    Done,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Load => "load",
            Stage::Type => "type",
            Stage::Score => "score",
            Stage::Metrics => "metrics",
            Stage::PersistMetrics => "persist_metrics",
            Stage::Plots => "plots",
            Stage::PublishPredictions => "publish_predictions",
            Stage::RecordStats => "record_stats",
            Stage::Done => "done",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EvaluationError {
    #[error("Model artifact error: {0}")]
    Artifact(#[from] ArtifactError),
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),
    #[error("Scoring error: {0}")]
    Scoring(#[from] ScoringError),
    #[error("Metrics error: {0}")]
    Metrics(#[from] MetricsError),
    #[error("Dataset query failed: {0}")]
    Dataset(#[source] StoreError),
    #[error("Persistence failed during {stage}: {source}")]
    Persistence {
        stage: Stage,
        #[source]
        source: BoxError,
    },
}

impl EvaluationError {
    pub fn persistence(stage: Stage, source: impl Into<BoxError>) -> Self {
        EvaluationError::Persistence {
            stage,
            source: source.into(),
        }
    }

    /// Stage the run halted in.
    pub fn stage(&self) -> Stage {
        match self {
            EvaluationError::Artifact(_) => Stage::Load,
            EvaluationError::Schema(_) | EvaluationError::Dataset(_) => Stage::Type,
            EvaluationError::Scoring(_) => Stage::Score,
            EvaluationError::Metrics(_) => Stage::Metrics,
            EvaluationError::Persistence { stage, .. } => *stage,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_names() {
        let names: Vec<&str> = [
            Stage::Load,
            Stage::Type,
            Stage::Score,
            Stage::Metrics,
            Stage::PersistMetrics,
            Stage::Plots,
            Stage::PublishPredictions,
            Stage::RecordStats,
            Stage::Done,
        ]
        .iter()
        .map(Stage::as_str)
        .collect();
        assert_eq!(
            names,
            vec![
                "load",
                "type",
                "score",
                "metrics",
                "persist_metrics",
                "plots",
                "publish_predictions",
                "record_stats",
                "done"
            ]
        );
    }

    #[test]
    fn test_persistence_keeps_source() {
        let err = EvaluationError::persistence(
            Stage::PublishPredictions,
            scorecard_types::anyhow!("disk full"),
        );
        assert_eq!(err.stage(), Stage::PublishPredictions);
        assert_eq!(
            err.to_string(),
            "Persistence failed during publish_predictions: disk full"
        );
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_stage_of_typed_errors() {
        let err: EvaluationError = SchemaError::EmptyDataset.into();
        assert_eq!(err.stage(), Stage::Type);
        let err: EvaluationError = MetricsError::Empty.into();
        assert_eq!(err.stage(), Stage::Metrics);
    }
}
