//! File-backed evaluation statistics.

use std::collections::BTreeMap;

use chrono::Utc;
use scorecard_storage::files::LocalDir;
use scorecard_types::{Context, Table, anyhow};
use serde::Serialize;

use crate::context::EvaluationContext;
use crate::publish::StatsRecorder;
use crate::scorer::FeatureImportance;

pub const STATS_FILE: &str = "data_stats.json";

/// Summary of one numeric column. Non-numeric cells count as nulls.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnSummary {
    pub count: usize,
    pub nulls: usize,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
}

impl ColumnSummary {
    pub fn of(table: &Table, column: &str) -> Option<Self> {
        let mut count = 0usize;
        let mut nulls = 0usize;
        let mut sum = 0.0f64;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;

        for cell in table.column(column)? {
            match cell.as_f64().filter(|v| !v.is_nan()) {
                Some(v) => {
                    count += 1;
                    sum += v;
                    min = min.min(v);
                    max = max.max(v);
                }
                None => nulls += 1,
            }
        }

        let seen = count > 0;
        Some(Self {
            count,
            nulls,
            min: seen.then_some(min),
            max: seen.then_some(max),
            mean: seen.then(|| sum / count as f64),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictedSummary {
    pub column: String,
    pub rows: usize,
    pub class_counts: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationStats {
    pub recorded_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<String>,
    pub features: BTreeMap<String, ColumnSummary>,
    pub predicted: PredictedSummary,
    pub importance: FeatureImportance,
}

impl EvaluationStats {
    pub fn collect(
        features: &Table,
        predicted: &Table,
        importance: &FeatureImportance,
        ctx: &EvaluationContext,
    ) -> scorecard_types::Result<Self> {
        let target = ctx.target_name()?;

        let mut summaries = BTreeMap::new();
        for name in ctx.feature_names().iter().map(String::as_str).chain([target]) {
            let summary = ColumnSummary::of(features, name)
                .ok_or_else(|| anyhow!("Feature dataset has no column `{}`", name))?;
            summaries.insert(name.to_string(), summary);
        }

        let mut class_counts = BTreeMap::new();
        for cell in predicted
            .column(target)
            .ok_or_else(|| anyhow!("Predicted table has no column `{}`", target))?
        {
            *class_counts.entry(cell.to_string()).or_insert(0usize) += 1;
        }

        Ok(Self {
            recorded_at: Utc::now().to_rfc3339(),
            model_id: ctx.model_id.clone(),
            model_version: ctx.model_version.clone(),
            job_id: ctx.job_id.clone(),
            features: summaries,
            predicted: PredictedSummary {
                column: target.to_string(),
                rows: predicted.row_count(),
                class_counts,
            },
            importance: importance.clone(),
        })
    }
}

/// Writes `data_stats.json` into the run's output directory.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileStatsRecorder;

impl StatsRecorder for FileStatsRecorder {
    fn record_evaluation_stats(
        &self,
        features: &Table,
        predicted: &Table,
        importance: &FeatureImportance,
        ctx: &EvaluationContext,
    ) -> scorecard_types::Result<()> {
        let stats = EvaluationStats::collect(features, predicted, importance, ctx)?;
        let path = LocalDir::new(&ctx.artifact_output_path)
            .put_json(STATS_FILE, &stats)
            .context("Failed to write evaluation statistics")?;
        tracing::info!("Evaluation statistics recorded to {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::DatasetInfo;
    use scorecard_types::Cell;

    fn ctx(output: &std::path::Path) -> EvaluationContext {
        EvaluationContext::new(
            "/in",
            output,
            DatasetInfo {
                feature_names: vec!["step".into(), "amount".into()],
                target_names: vec!["isFraud".into()],
                sql: "SELECT * FROM txns".into(),
            },
        )
        .with_job("job-7")
    }

    fn features() -> Table {
        Table::from_columns(vec![
            ("txn_id".into(), vec![Cell::Int(1), Cell::Int(2), Cell::Int(3)]),
            ("step".into(), vec![Cell::Int(1), Cell::Int(5), Cell::Int(3)]),
            ("amount".into(), vec![Cell::Float(10.0), Cell::Null, Cell::Float(30.0)]),
            ("isFraud".into(), vec![Cell::Int(0), Cell::Int(1), Cell::Int(1)]),
        ])
        .unwrap()
    }

    fn predicted() -> Table {
        Table::from_columns(vec![
            ("isFraud".into(), vec![Cell::Int(0), Cell::Int(1), Cell::Int(1)]),
            ("txn_id".into(), vec![Cell::Int(1), Cell::Int(2), Cell::Int(3)]),
        ])
        .unwrap()
    }

    #[test]
    fn test_column_summary() {
        let summary = ColumnSummary::of(&features(), "amount").unwrap();
        assert_eq!(summary.count, 2);
        assert_eq!(summary.nulls, 1);
        assert_eq!(summary.min, Some(10.0));
        assert_eq!(summary.max, Some(30.0));
        assert_eq!(summary.mean, Some(20.0));
        assert!(ColumnSummary::of(&features(), "missing").is_none());
    }

    #[test]
    fn test_all_null_column_has_no_range() {
        let table = Table::from_columns(vec![("x".into(), vec![Cell::Null, Cell::from("n/a")])]).unwrap();
        let summary = ColumnSummary::of(&table, "x").unwrap();
        assert_eq!(summary.nulls, 2);
        assert_eq!(summary.mean, None);
    }

    #[test]
    fn test_collect_stats() {
        let tmp = tempfile::tempdir().unwrap();
        let stats = EvaluationStats::collect(
            &features(),
            &predicted(),
            &FeatureImportance::default(),
            &ctx(tmp.path()),
        )
        .unwrap();

        assert_eq!(stats.features.len(), 3);
        assert_eq!(stats.features["step"].max, Some(5.0));
        assert_eq!(stats.predicted.rows, 3);
        assert_eq!(stats.predicted.class_counts["1"], 2);
        assert_eq!(stats.predicted.class_counts["0"], 1);
        assert_eq!(stats.job_id.as_deref(), Some("job-7"));
        assert!(chrono::DateTime::parse_from_rfc3339(&stats.recorded_at).is_ok());
    }

    #[test]
    fn test_collect_requires_target_in_predictions() {
        let tmp = tempfile::tempdir().unwrap();
        let predicted = Table::from_columns(vec![("txn_id".into(), vec![Cell::Int(1)])]).unwrap();
        let err = EvaluationStats::collect(
            &features(),
            &predicted,
            &FeatureImportance::default(),
            &ctx(tmp.path()),
        )
        .unwrap_err();
        assert!(err.to_string().contains("isFraud"));
    }

    #[test]
    fn test_file_recorder_writes_json() {
        let tmp = tempfile::tempdir().unwrap();
        FileStatsRecorder
            .record_evaluation_stats(
                &features(),
                &predicted(),
                &FeatureImportance::default(),
                &ctx(tmp.path()),
            )
            .unwrap();

        let written: serde_json::Value =
            serde_json::from_slice(&std::fs::read(tmp.path().join(STATS_FILE)).unwrap()).unwrap();
        assert_eq!(written["predicted"]["column"], "isFraud");
        assert_eq!(written["features"]["amount"]["nulls"], 1);
        assert_eq!(written["job_id"], "job-7");
        assert!(written.get("model_id").is_none());
    }
}
