//! Prediction publishing.
//!
//! Predictions are written to the queryable store keyed by record id, read
//! back from the store, and handed to the statistics recorder together with
//! the feature dataset and the model's importance scores.

use scorecard_storage::SqlStore;
use scorecard_types::{Cell, Table};

use crate::context::EvaluationContext;
use crate::error::{EvaluationError, Stage};
use crate::schema::RECORD_ID_COLUMN;
use crate::scorer::{FeatureImportance, PredictionVector, ScoringError};

pub const PREDICTIONS_TABLE: &str = "predictions_tmp";

/// Downstream consumer of evaluation statistics.
pub trait StatsRecorder {
    fn record_evaluation_stats(
        &self,
        features: &Table,
        predicted: &Table,
        importance: &FeatureImportance,
        ctx: &EvaluationContext,
    ) -> scorecard_types::Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishOutcome {
    pub rows_written: usize,
    pub rows_read_back: usize,
}

/// Two columns, `target_name` then `txn_id`, one row per prediction.
pub fn prediction_table(
    target_name: &str,
    predictions: &PredictionVector,
    record_ids: &[Cell],
) -> Result<Table, ScoringError> {
    if predictions.len() != record_ids.len() {
        return Err(ScoringError::PredictionCount {
            expected: record_ids.len(),
            got: predictions.len(),
        });
    }

    let rows = predictions
        .labels()
        .iter()
        .zip(record_ids)
        .map(|(label, id)| vec![Cell::Int(*label as i64), id.clone()])
        .collect();
    Table::new(
        vec![target_name.to_string(), RECORD_ID_COLUMN.to_string()],
        rows,
    )
    .map_err(|_| ScoringError::PredictionCount {
        expected: record_ids.len(),
        got: predictions.len(),
    })
}

pub struct PredictionPublisher<'a> {
    store: &'a SqlStore,
    recorder: &'a dyn StatsRecorder,
}

impl<'a> PredictionPublisher<'a> {
    pub fn new(store: &'a SqlStore, recorder: &'a dyn StatsRecorder) -> Self {
        Self { store, recorder }
    }

    /// Replace [`PREDICTIONS_TABLE`] with `predictions`, re-read it, and
    /// record statistics over `features` and the re-read table.
    pub fn publish(
        &self,
        features: &Table,
        target_name: &str,
        predictions: &PredictionVector,
        record_ids: &[Cell],
        importance: &FeatureImportance,
        ctx: &EvaluationContext,
    ) -> Result<PublishOutcome, EvaluationError> {
        let table = prediction_table(target_name, predictions, record_ids)?;

        let rows_written = self
            .store
            .replace_table(PREDICTIONS_TABLE, &table)
            .map_err(|e| EvaluationError::persistence(Stage::PublishPredictions, e))?;
        tracing::info!("Published {} predictions to {}", rows_written, PREDICTIONS_TABLE);

        let predicted = self
            .store
            .query(&format!("SELECT * FROM {PREDICTIONS_TABLE}"))
            .map_err(|e| EvaluationError::persistence(Stage::PublishPredictions, e))?;
        tracing::debug!(
            "Read back {} rows with columns {:?}",
            predicted.row_count(),
            predicted.headers()
        );

        self.recorder
            .record_evaluation_stats(features, &predicted, importance, ctx)
            .map_err(|e| EvaluationError::persistence(Stage::RecordStats, e))?;

        Ok(PublishOutcome {
            rows_written,
            rows_read_back: predicted.row_count(),
        })
    }
}
