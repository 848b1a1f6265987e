//! Held-out evaluation for boosted-tree fraud classifiers.
//!
//! An [`Evaluator`] loads a trained model, types the evaluation dataset,
//! scores it, writes `metrics.json` plus diagnostic plots, publishes the
//! predictions to `predictions_tmp` and records evaluation statistics.

pub mod artifacts;
pub mod config;
pub mod context;
pub mod error;
pub mod evaluator;
pub mod metrics;
pub mod model;
pub mod publish;
pub mod schema;
pub mod scorer;
pub mod stats;
pub mod telemetry;

pub use artifacts::{FsPlotStore, Plot, PlotStore};
pub use config::{EvaluatorConfig, LogConfig};
pub use context::{DatasetInfo, EvaluationContext};
pub use error::{EvaluationError, Stage};
pub use evaluator::{EvaluationSummary, Evaluator};
pub use metrics::MetricReport;
pub use model::{ArtifactError, ModelArtifact, TreePipeline};
pub use publish::{PREDICTIONS_TABLE, StatsRecorder};
pub use schema::{FeatureSchema, SchemaError};
pub use scorer::{FeatureImportance, ImportanceSource, ImportanceType, PredictionVector, Predictor};
pub use stats::FileStatsRecorder;

pub use scorecard_storage as storage;
pub use scorecard_types as types;
