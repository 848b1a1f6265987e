//! Evaluation artifacts: the metrics file and the visual diagnostics.

use std::path::{Path, PathBuf};

use ab_glyph::FontVec;
use scorecard_storage::StoreError;
use scorecard_storage::files::LocalDir;
use serde_json::json;

use crate::config::EvaluatorConfig;
use crate::context::EvaluationContext;
use crate::error::{EvaluationError, Stage};
use crate::metrics::{ConfusionCounts, MetricReport, RocCurve};
use crate::schema::{FeatureMatrix, TargetVector};
use crate::scorer::{FeatureImportance, ImportanceSource, ImportanceType, PredictionVector};

pub mod render;

pub const METRICS_FILE: &str = "metrics.json";
pub const CONFUSION_MATRIX_LABEL: &str = "Confusion Matrix";
pub const ROC_CURVE_LABEL: &str = "ROC Curve";
pub const FEATURE_IMPORTANCE_LABEL: &str = "feature_importance.png";

/// Write `report` to `<output>/metrics.json`, replacing any previous file.
pub fn write_metrics(report: &MetricReport, output: &Path) -> Result<PathBuf, StoreError> {
    let path = LocalDir::new(output).put_json(METRICS_FILE, report)?;
    tracing::debug!("Metrics written to {}", path.display());
    Ok(path)
}

/// A rendered diagnostic and the numbers it was drawn from.
#[derive(Debug, Clone, PartialEq)]
pub struct Plot {
    pub label: String,
    pub png: Vec<u8>,
    pub data: serde_json::Value,
}

/// Destination for rendered diagnostics.
pub trait PlotStore {
    fn save_plot(&self, plot: &Plot, ctx: &EvaluationContext) -> scorecard_types::Result<()>;
}

/// Writes `<slug>.png` and `<slug>.json` into the run's output directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsPlotStore;

impl FsPlotStore {
    /// File stem for a plot label: `"ROC Curve"` becomes `roc_curve`,
    /// `"feature_importance.png"` becomes `feature_importance`.
    pub fn file_stem(label: &str) -> String {
        let label = label.strip_suffix(".png").unwrap_or(label);
        let mut stem = String::with_capacity(label.len());
        for c in label.chars() {
            if c.is_ascii_alphanumeric() {
                stem.push(c.to_ascii_lowercase());
            } else if !stem.is_empty() && !stem.ends_with('_') {
                stem.push('_');
            }
        }
        while stem.ends_with('_') {
            stem.pop();
        }
        if stem.is_empty() {
            stem.push_str("plot");
        }
        stem
    }
}

impl PlotStore for FsPlotStore {
    fn save_plot(&self, plot: &Plot, ctx: &EvaluationContext) -> scorecard_types::Result<()> {
        let dir = LocalDir::new(&ctx.artifact_output_path);
        let stem = Self::file_stem(&plot.label);
        dir.put(&format!("{stem}.png"), &plot.png)?;
        dir.put_json(&format!("{stem}.json"), &plot.data)?;
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlotOptions {
    pub width: u32,
    pub height: u32,
    pub max_importance_features: usize,
}

impl Default for PlotOptions {
    fn default() -> Self {
        Self::from(&EvaluatorConfig::default())
    }
}

impl From<&EvaluatorConfig> for PlotOptions {
    fn from(config: &EvaluatorConfig) -> Self {
        let (width, height) = config.plot_size();
        Self {
            width,
            height,
            max_importance_features: config.max_importance_features,
        }
    }
}

/// What the diagnostics step learned about the model.
#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostics {
    pub importance: FeatureImportance,
    pub roc_auc: Option<f64>,
}

pub struct ArtifactWriter<'a> {
    store: &'a dyn PlotStore,
    options: PlotOptions,
    font: Option<&'a FontVec>,
}

impl<'a> ArtifactWriter<'a> {
    pub fn new(store: &'a dyn PlotStore, options: PlotOptions) -> Self {
        Self {
            store,
            options,
            font: None,
        }
    }

    /// Label the charts with `font`; unlabelled when `None`.
    pub fn with_font(mut self, font: Option<&'a FontVec>) -> Self {
        self.font = font;
        self
    }

    fn save(
        &self,
        label: &str,
        img: image::RgbImage,
        data: serde_json::Value,
        ctx: &EvaluationContext,
    ) -> Result<(), EvaluationError> {
        let png =
            render::encode_png(img).map_err(|e| EvaluationError::persistence(Stage::Plots, e))?;
        let plot = Plot {
            label: label.to_string(),
            png,
            data,
        };
        self.store
            .save_plot(&plot, ctx)
            .map_err(|e| EvaluationError::persistence(Stage::Plots, e))?;
        tracing::debug!("Saved plot `{}` ({} bytes)", label, plot.png.len());
        Ok(())
    }

    /// Render and persist the confusion matrix, ROC curve and feature
    /// importance chart. Feature names are attached to `model` first so the
    /// importance is keyed by column name.
    pub fn write_diagnostics(
        &self,
        model: &mut dyn ImportanceSource,
        features: &FeatureMatrix,
        target: &TargetVector,
        predictions: &PredictionVector,
        ctx: &EvaluationContext,
    ) -> Result<Diagnostics, EvaluationError> {
        let PlotOptions { width, height, .. } = self.options;

        let counts = ConfusionCounts::from_labels(target.values(), predictions.labels())?;
        self.save(
            CONFUSION_MATRIX_LABEL,
            render::confusion_matrix(&counts, width, height, self.font),
            json!({
                "labels": [0, 1],
                "matrix": counts.matrix(),
            }),
            ctx,
        )?;

        let roc = RocCurve::compute(target.values(), predictions.probabilities())?;
        if roc.auc.is_none() {
            tracing::warn!("Only one class present in the target, ROC curve is undefined");
        }
        self.save(
            ROC_CURVE_LABEL,
            render::roc_curve(&roc, width, height, self.font),
            serde_json::to_value(&roc).map_err(|e| EvaluationError::persistence(Stage::Plots, e))?,
            ctx,
        )?;

        model.set_feature_names(features.names())?;
        let importance = model.importance(ImportanceType::Weight);
        let top = importance.top(self.options.max_importance_features);
        self.save(
            FEATURE_IMPORTANCE_LABEL,
            render::importance_bars(&top, width, height, self.font),
            json!({
                "importance_type": ImportanceType::Weight,
                "features": top
                    .iter()
                    .map(|(name, score)| json!({"feature": name, "score": score}))
                    .collect::<Vec<_>>(),
            }),
            ctx,
        )?;

        Ok(Diagnostics {
            importance,
            roc_auc: roc.auc,
        })
    }
}
