//! The evaluation run.
//!
//! `Load -> Type -> Score -> Metrics -> PersistMetrics -> Plots ->
//! PublishPredictions -> RecordStats -> Done`. The first failure halts the
//! run; side effects of earlier stages stay in place.

use ab_glyph::FontVec;
use scorecard_storage::SqlStore;

use crate::artifacts::{self, ArtifactWriter, FsPlotStore, PlotOptions, PlotStore, render};
use crate::config::EvaluatorConfig;
use crate::context::EvaluationContext;
use crate::error::{EvaluationError, Stage};
use crate::metrics::{self, MetricReport};
use crate::model::ModelArtifact;
use crate::publish::{PREDICTIONS_TABLE, PredictionPublisher, StatsRecorder};
use crate::schema::FeatureSchema;
use crate::scorer::{FeatureImportance, Predictor};
use crate::stats::FileStatsRecorder;

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationSummary {
    pub rows: usize,
    pub metrics: MetricReport,
    pub importance: FeatureImportance,
    pub roc_auc: Option<f64>,
    pub predictions_table: String,
}

pub struct Evaluator {
    config: EvaluatorConfig,
    schema: FeatureSchema,
    store: SqlStore,
    plot_store: Box<dyn PlotStore>,
    stats_recorder: Box<dyn StatsRecorder>,
    font: Option<FontVec>,
}

impl std::fmt::Debug for Evaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Evaluator")
            .field("config", &self.config)
            .field("store", &self.store)
            .field("labelled_charts", &self.font.is_some())
            .finish_non_exhaustive()
    }
}

impl Evaluator {
    pub fn new(
        config: EvaluatorConfig,
        store: SqlStore,
        plot_store: Box<dyn PlotStore>,
        stats_recorder: Box<dyn StatsRecorder>,
    ) -> Self {
        let font = render::resolve_font(config.font_path.as_deref());
        Self {
            config,
            schema: FeatureSchema::transactions(),
            store,
            plot_store,
            stats_recorder,
            font,
        }
    }

    /// Open the configured database and write plots and statistics next to
    /// the metrics file.
    pub fn from_config(config: EvaluatorConfig) -> Result<Self, EvaluationError> {
        let store = SqlStore::open(&config.database_path).map_err(EvaluationError::Dataset)?;
        Ok(Self::new(
            config,
            store,
            Box::new(FsPlotStore),
            Box::new(FileStatsRecorder),
        ))
    }

    pub fn with_schema(mut self, schema: FeatureSchema) -> Self {
        self.schema = schema;
        self
    }

    pub fn config(&self) -> &EvaluatorConfig {
        &self.config
    }

    pub fn store(&self) -> &SqlStore {
        &self.store
    }

    pub fn evaluate(&self, ctx: &EvaluationContext) -> Result<EvaluationSummary, EvaluationError> {
        let span = tracing::info_span!(
            "evaluation",
            model_id = ctx.model_id.as_deref().unwrap_or("-"),
            job_id = ctx.job_id.as_deref().unwrap_or("-")
        );
        let _guard = span.enter();

        let result = self.run(ctx);
        if let Err(e) = &result {
            tracing::error!("Evaluation halted at {}: {}", e.stage(), e);
        }
        result
    }

    fn run(&self, ctx: &EvaluationContext) -> Result<EvaluationSummary, EvaluationError> {
        let model_path = ctx.artifact_input_path.join(&self.config.model_file_name);
        tracing::info!("[{}] Loading model from {}", Stage::Load, model_path.display());
        let mut model = ModelArtifact::load(&model_path)?;

        let info = &ctx.dataset_info;
        let target_name = ctx.target_name()?;
        tracing::info!("[{}] Features: {:?}", Stage::Type, info.feature_names);
        tracing::info!("[{}] Target: {}", Stage::Type, target_name);
        tracing::info!("[{}] Dataset query: {}", Stage::Type, info.sql);
        let dataset = self.store.query(&info.sql).map_err(EvaluationError::Dataset)?;
        let typed = self.schema.type_dataset(&dataset, info)?;
        tracing::info!(
            "[{}] Typed features {:?}, target ({},)",
            Stage::Type,
            typed.features.shape(),
            typed.target.len()
        );

        tracing::info!("[{}] Scoring", Stage::Score);
        let predictions = model.predict(&typed.features)?;
        tracing::info!(
            "[{}] Predictions ({},), {} positive",
            Stage::Score,
            predictions.len(),
            predictions.positive_count()
        );

        let report = metrics::compute(&typed.target, &predictions)?;
        tracing::info!("[{}] {:?}", Stage::Metrics, report.entries());

        artifacts::write_metrics(&report, &ctx.artifact_output_path)
            .map_err(|e| EvaluationError::persistence(Stage::PersistMetrics, e))?;
        tracing::info!("[{}] Saved {}", Stage::PersistMetrics, artifacts::METRICS_FILE);

        let writer = ArtifactWriter::new(self.plot_store.as_ref(), PlotOptions::from(&self.config))
            .with_font(self.font.as_ref());
        let diagnostics = writer.write_diagnostics(
            &mut model,
            &typed.features,
            &typed.target,
            &predictions,
            ctx,
        )?;
        tracing::info!("[{}] Saved diagnostics", Stage::Plots);

        let publisher = PredictionPublisher::new(&self.store, self.stats_recorder.as_ref());
        let outcome = publisher.publish(
            &dataset,
            target_name,
            &predictions,
            &typed.record_ids,
            &diagnostics.importance,
            ctx,
        )?;
        tracing::info!(
            "[{}] {} rows published, {} read back, statistics recorded",
            Stage::RecordStats,
            outcome.rows_written,
            outcome.rows_read_back
        );

        tracing::info!("[{}] All done with evaluation", Stage::Done);
        Ok(EvaluationSummary {
            rows: typed.len(),
            metrics: report,
            importance: diagnostics.importance,
            roc_auc: diagnostics.roc_auc,
            predictions_table: PREDICTIONS_TABLE.to_string(),
        })
    }
}
