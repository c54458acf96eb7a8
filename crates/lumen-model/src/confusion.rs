//! Confusion matrix and per-class classification metrics.

use lumen_image::Label;

use crate::error::ModelError;

/// A confusion matrix over [`Label`]s.
///
/// Entry `matrix[true][predicted]` counts how many samples with true label
/// `true` were predicted as `predicted`, indexed by class index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfusionMatrix {
    matrix: Vec<Vec<usize>>,
}

/// Per-class precision, recall, and F1 score.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassMetrics {
    /// The class.
    pub label: Label,
    /// Precision: TP / (TP + FP). 0.0 if no predictions for this class.
    pub precision: f64,
    /// Recall: TP / (TP + FN). 0.0 if no true samples for this class.
    pub recall: f64,
    /// F1: 2 * precision * recall / (precision + recall). 0.0 if both are zero.
    pub f1: f64,
    /// Number of true samples in this class.
    pub support: usize,
}

impl ConfusionMatrix {
    /// Build a confusion matrix from true and predicted labels.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::PredictionCountMismatch`] if the slices differ
    /// in length.
    pub fn from_labels(truth: &[Label], predicted: &[Label]) -> Result<Self, ModelError> {
        if truth.len() != predicted.len() {
            return Err(ModelError::PredictionCountMismatch {
                n_truth: truth.len(),
                n_predicted: predicted.len(),
            });
        }
        let mut matrix = vec![vec![0usize; Label::COUNT]; Label::COUNT];
        for (t, p) in truth.iter().zip(predicted) {
            matrix[t.index()][p.index()] += 1;
        }
        Ok(Self { matrix })
    }

    /// Count for one `(true, predicted)` cell.
    #[must_use]
    pub fn count(&self, truth: Label, predicted: Label) -> usize {
        self.matrix[truth.index()][predicted.index()]
    }

    /// Total number of samples.
    #[must_use]
    pub fn total(&self) -> usize {
        self.matrix.iter().flatten().sum()
    }

    /// Overall accuracy: proportion of correct predictions.
    #[must_use]
    pub fn accuracy(&self) -> f64 {
        let correct: usize = Label::ALL.iter().map(|&l| self.count(l, l)).sum();
        let total = self.total();
        if total == 0 {
            0.0
        } else {
            correct as f64 / total as f64
        }
    }

    /// Per-class precision, recall, F1, and support.
    #[must_use]
    pub fn class_metrics(&self) -> Vec<ClassMetrics> {
        Label::ALL
            .iter()
            .map(|&label| {
                let tp = self.count(label, label);
                let predicted_as: usize = Label::ALL.iter().map(|&t| self.count(t, label)).sum();
                let support: usize = Label::ALL.iter().map(|&p| self.count(label, p)).sum();
                let precision = ratio(tp, predicted_as);
                let recall = ratio(tp, support);
                let f1 = if precision + recall == 0.0 {
                    0.0
                } else {
                    2.0 * precision * recall / (precision + recall)
                };
                ClassMetrics {
                    label,
                    precision,
                    recall,
                    f1,
                    support,
                }
            })
            .collect()
    }

    /// Return the underlying matrix rows.
    #[must_use]
    pub fn as_rows(&self) -> &[Vec<usize>] {
        &self.matrix
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

/// Support-weighted mean of one per-class metric.
pub(crate) fn weighted(metrics: &[ClassMetrics], value: impl Fn(&ClassMetrics) -> f64) -> f64 {
    let total: usize = metrics.iter().map(|m| m.support).sum();
    if total == 0 {
        return 0.0;
    }
    metrics
        .iter()
        .map(|m| value(m) * m.support as f64)
        .sum::<f64>()
        / total as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use Label::{Covid, Normal};

    #[test]
    fn counts_and_accuracy() {
        let truth = [Normal, Normal, Normal, Covid, Covid];
        let pred = [Normal, Normal, Covid, Covid, Normal];
        let cm = ConfusionMatrix::from_labels(&truth, &pred).unwrap();
        assert_eq!(cm.as_rows(), &[vec![2, 1], vec![1, 1]]);
        assert!((cm.accuracy() - 0.6).abs() < 1e-12);
    }

    #[test]
    fn per_class_metrics() {
        let truth = [Normal, Normal, Normal, Covid, Covid];
        let pred = [Normal, Normal, Covid, Covid, Normal];
        let metrics = ConfusionMatrix::from_labels(&truth, &pred).unwrap().class_metrics();
        assert!((metrics[0].precision - 2.0 / 3.0).abs() < 1e-12);
        assert!((metrics[0].recall - 2.0 / 3.0).abs() < 1e-12);
        assert!((metrics[1].precision - 0.5).abs() < 1e-12);
        assert!((metrics[1].recall - 0.5).abs() < 1e-12);
        assert_eq!(metrics[0].support, 3);
        assert_eq!(metrics[1].support, 2);
    }

    #[test]
    fn never_predicted_class_has_zero_precision() {
        let truth = [Normal, Covid];
        let pred = [Normal, Normal];
        let metrics = ConfusionMatrix::from_labels(&truth, &pred).unwrap().class_metrics();
        assert_eq!(metrics[1].precision, 0.0);
        assert_eq!(metrics[1].f1, 0.0);
    }

    #[test]
    fn weighted_mean_uses_support() {
        let truth = [Normal, Normal, Normal, Covid];
        let pred = [Normal, Normal, Normal, Normal];
        let metrics = ConfusionMatrix::from_labels(&truth, &pred).unwrap().class_metrics();
        // Normal precision 0.75 (support 3), COVID precision 0 (support 1).
        let p = weighted(&metrics, |m| m.precision);
        assert!((p - 0.5625).abs() < 1e-12);
        let r = weighted(&metrics, |m| m.recall);
        assert!((r - 0.75).abs() < 1e-12);
    }

    #[test]
    fn length_mismatch_rejected() {
        assert!(matches!(
            ConfusionMatrix::from_labels(&[Normal], &[]),
            Err(ModelError::PredictionCountMismatch { n_truth: 1, n_predicted: 0 })
        ));
    }
}
