//! Binary classification metrics.
//!
//! Positive class is [`POSITIVE_LABEL`]. Ratios with a zero denominator are
//! reported as 0 instead of failing.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::schema::TargetVector;
use crate::scorer::{POSITIVE_LABEL, PredictionVector};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MetricsError {
    #[error("{targets} targets but {predictions} predictions")]
    LengthMismatch { targets: usize, predictions: usize },
    #[error("Cannot compute metrics over zero records")]
    Empty,
}

fn check_lengths(targets: usize, predictions: usize) -> Result<(), MetricsError> {
    if targets != predictions {
        return Err(MetricsError::LengthMismatch {
            targets,
            predictions,
        });
    }
    if targets == 0 {
        return Err(MetricsError::Empty);
    }
    Ok(())
}

fn ratio(numerator: u64, denominator: u64) -> f64 {
    if denominator > 0 {
        numerator as f64 / denominator as f64
    } else {
        0.0
    }
}

/// Confusion matrix (rows = actual, columns = predicted)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ConfusionCounts {
    pub tn: u64,
    pub fp: u64,
    #[serde(rename = "fn")]
    pub fn_: u64,
    pub tp: u64,
}

impl ConfusionCounts {
    pub fn from_labels(targets: &[i8], predictions: &[i8]) -> Result<Self, MetricsError> {
        check_lengths(targets.len(), predictions.len())?;

        let mut counts = Self::default();
        for (actual, predicted) in targets.iter().zip(predictions) {
            match (*actual == POSITIVE_LABEL, *predicted == POSITIVE_LABEL) {
                (false, false) => counts.tn += 1,
                (false, true) => counts.fp += 1,
                (true, false) => counts.fn_ += 1,
                (true, true) => counts.tp += 1,
            }
        }
        Ok(counts)
    }

    pub fn total(&self) -> u64 {
        self.tn + self.fp + self.fn_ + self.tp
    }

    pub fn accuracy(&self) -> f64 {
        ratio(self.tp + self.tn, self.total())
    }

    pub fn recall(&self) -> f64 {
        ratio(self.tp, self.tp + self.fn_)
    }

    pub fn precision(&self) -> f64 {
        ratio(self.tp, self.tp + self.fp)
    }

    pub fn f1_score(&self) -> f64 {
        let (precision, recall) = (self.precision(), self.recall());
        if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        }
    }

    /// `[[tn, fp], [fn, tp]]`
    pub fn matrix(&self) -> [[u64; 2]; 2] {
        [[self.tn, self.fp], [self.fn_, self.tp]]
    }
}

/// Metric values as written to `metrics.json`, each with two decimals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct MetricReport {
    #[serde(rename = "Accuracy")]
    pub accuracy: String,
    #[serde(rename = "Recall")]
    pub recall: String,
    #[serde(rename = "Precision")]
    pub precision: String,
    #[serde(rename = "f1-score")]
    pub f1_score: String,
}

impl MetricReport {
    pub fn from_counts(counts: &ConfusionCounts) -> Self {
        Self {
            accuracy: format!("{:.2}", counts.accuracy()),
            recall: format!("{:.2}", counts.recall()),
            precision: format!("{:.2}", counts.precision()),
            f1_score: format!("{:.2}", counts.f1_score()),
        }
    }

    pub fn entries(&self) -> [(&'static str, &str); 4] {
        [
            ("Accuracy", self.accuracy.as_str()),
            ("Recall", self.recall.as_str()),
            ("Precision", self.precision.as_str()),
            ("f1-score", self.f1_score.as_str()),
        ]
    }
}

pub fn compute(targets: &TargetVector, predictions: &PredictionVector) -> Result<MetricReport, MetricsError> {
    let counts = ConfusionCounts::from_labels(targets.values(), predictions.labels())?;
    Ok(MetricReport::from_counts(&counts))
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RocPoint {
    pub fpr: f64,
    pub tpr: f64,
    /// Scores at or above this value are predicted positive.
    pub threshold: f64,
}

/// Receiver operating characteristic over every distinct score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RocCurve {
    pub points: Vec<RocPoint>,
    /// Trapezoidal area under the curve; absent when one class has no records.
    pub auc: Option<f64>,
}

impl RocCurve {
    pub fn compute(targets: &[i8], scores: &[f32]) -> Result<Self, MetricsError> {
        check_lengths(targets.len(), scores.len())?;

        let positives = targets.iter().filter(|t| **t == POSITIVE_LABEL).count() as u64;
        let negatives = targets.len() as u64 - positives;
        if positives == 0 || negatives == 0 {
            return Ok(Self {
                points: Vec::new(),
                auc: None,
            });
        }

        let mut order: Vec<usize> = (0..scores.len()).collect();
        order.sort_by(|a, b| scores[*b].total_cmp(&scores[*a]));

        let mut points = vec![RocPoint {
            fpr: 0.0,
            tpr: 0.0,
            threshold: f64::INFINITY,
        }];
        let (mut tp, mut fp) = (0u64, 0u64);
        for (pos, idx) in order.iter().enumerate() {
            if targets[*idx] == POSITIVE_LABEL {
                tp += 1;
            } else {
                fp += 1;
            }
            let last_of_threshold = order
                .get(pos + 1)
                .is_none_or(|next| scores[*next] != scores[*idx]);
            if last_of_threshold {
                points.push(RocPoint {
                    fpr: ratio(fp, negatives),
                    tpr: ratio(tp, positives),
                    threshold: scores[*idx] as f64,
                });
            }
        }

        let auc = points
            .windows(2)
            .map(|w| (w[1].fpr - w[0].fpr) * (w[1].tpr + w[0].tpr) / 2.0)
            .sum();
        Ok(Self {
            points,
            auc: Some(auc),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(targets: &[i8], predictions: &[i8]) -> MetricReport {
        compute(
            &TargetVector::new(targets.to_vec()),
            &PredictionVector::from_labels(predictions.to_vec()),
        )
        .unwrap()
    }

    fn is_two_decimals(value: &str) -> bool {
        let bytes = value.as_bytes();
        bytes.len() == 4
            && bytes[0].is_ascii_digit()
            && bytes[1] == b'.'
            && bytes[2].is_ascii_digit()
            && bytes[3].is_ascii_digit()
    }

    // ========================================================================
    // Report
    // ========================================================================

    #[test]
    fn test_reference_scenario() {
        let report = report(&[0, 0, 1, 1], &[0, 1, 1, 1]);
        assert_eq!(report.accuracy, "0.75");
        assert_eq!(report.recall, "1.00");
        assert_eq!(report.precision, "0.67");
        assert_eq!(report.f1_score, "0.80");
    }

    #[test]
    fn test_no_predicted_positives_reports_zero() {
        let report = report(&[0, 1, 1], &[0, 0, 0]);
        assert_eq!(report.precision, "0.00");
        assert_eq!(report.recall, "0.00");
        assert_eq!(report.f1_score, "0.00");
        assert_eq!(report.accuracy, "0.33");
    }

    #[test]
    fn test_no_actual_positives_reports_zero() {
        let report = report(&[0, 0], &[0, 0]);
        assert_eq!(report.accuracy, "1.00");
        assert_eq!(report.recall, "0.00");
        assert_eq!(report.precision, "0.00");
    }

    #[test]
    fn test_values_always_have_two_decimals() {
        let cases: [(&[i8], &[i8]); 4] = [
            (&[1], &[1]),
            (&[0], &[1]),
            (&[1, 0, 1, 0, 1, 1, 0], &[1, 1, 0, 0, 1, 0, 0]),
            (&[0, 0, 0], &[1, 1, 1]),
        ];
        for (targets, predictions) in cases {
            for (name, value) in report(targets, predictions).entries() {
                assert!(is_two_decimals(value), "{name} = {value}");
            }
        }
    }

    #[test]
    fn test_report_serializes_in_order() {
        let json = serde_json::to_string(&report(&[0, 0, 1, 1], &[0, 1, 1, 1])).unwrap();
        assert_eq!(
            json,
            r#"{"Accuracy":"0.75","Recall":"1.00","Precision":"0.67","f1-score":"0.80"}"#
        );
    }

    #[test]
    fn test_length_mismatch_and_empty() {
        let err = compute(
            &TargetVector::new(vec![0, 1]),
            &PredictionVector::from_labels(vec![0]),
        )
        .unwrap_err();
        assert_eq!(
            err,
            MetricsError::LengthMismatch {
                targets: 2,
                predictions: 1
            }
        );
        assert_eq!(
            ConfusionCounts::from_labels(&[], &[]).unwrap_err(),
            MetricsError::Empty
        );
    }

    // ========================================================================
    // Confusion counts
    // ========================================================================

    #[test]
    fn test_confusion_counts() {
        let counts = ConfusionCounts::from_labels(&[0, 0, 1, 1, 1], &[0, 1, 1, 0, 1]).unwrap();
        assert_eq!(counts.matrix(), [[1, 1], [1, 2]]);
        assert_eq!(counts.total(), 5);
        assert_eq!(
            serde_json::to_value(counts).unwrap(),
            serde_json::json!({"tn": 1, "fp": 1, "fn": 1, "tp": 2})
        );
    }

    // ========================================================================
    // ROC
    // ========================================================================

    #[test]
    fn test_roc_perfect_separation() {
        let roc = RocCurve::compute(&[0, 0, 1, 1], &[0.1, 0.2, 0.8, 0.9]).unwrap();
        assert_eq!(roc.auc, Some(1.0));
        assert_eq!(roc.points.first().map(|p| (p.fpr, p.tpr)), Some((0.0, 0.0)));
        assert_eq!(roc.points.last().map(|p| (p.fpr, p.tpr)), Some((1.0, 1.0)));
    }

    #[test]
    fn test_roc_ties_share_a_point() {
        let roc = RocCurve::compute(&[0, 1, 0, 1], &[0.5, 0.5, 0.5, 0.5]).unwrap();
        assert_eq!(roc.points.len(), 2);
        assert_eq!(roc.auc, Some(0.5));
    }

    #[test]
    fn test_roc_mixed() {
        // Classic four-point example: AUC 0.75.
        let roc = RocCurve::compute(&[0, 0, 1, 1], &[0.1, 0.4, 0.35, 0.8]).unwrap();
        let auc = roc.auc.unwrap();
        assert!((auc - 0.75).abs() < 1e-12);
        assert!(roc.points.windows(2).all(|w| w[0].fpr <= w[1].fpr && w[0].tpr <= w[1].tpr));
    }

    #[test]
    fn test_roc_undefined_with_one_class() {
        let roc = RocCurve::compute(&[0, 0, 0], &[0.1, 0.2, 0.3]).unwrap();
        assert!(roc.points.is_empty());
        assert_eq!(roc.auc, None);
    }
}
