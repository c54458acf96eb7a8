//! Held-out evaluation of a fitted classifier.

use std::fmt;

use lumen_io::Dataset;
use tracing::{info, instrument};

use crate::backend::Backend;
use crate::classifier::Classifier;
use crate::confusion::{ClassMetrics, ConfusionMatrix, weighted};
use crate::error::ModelError;

/// Test-set metrics for one backend.
///
/// Precision, recall, and F1 are support-weighted means of the per-class
/// values; a class that is never predicted contributes 0 precision.
#[derive(Debug, Clone)]
pub struct Evaluation {
    backend: Backend,
    confusion: ConfusionMatrix,
    class_metrics: Vec<ClassMetrics>,
    accuracy: f64,
    precision: f64,
    recall: f64,
    f1: f64,
}

impl Evaluation {
    /// Predict every sample in `dataset` and score against its labels.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::PredictionFeatureMismatch`] if the classifier
    /// was trained on a different input width.
    #[instrument(skip_all, fields(backend = %classifier.backend(), n_samples = dataset.len()))]
    pub fn compute(classifier: &dyn Classifier, dataset: &Dataset) -> Result<Self, ModelError> {
        let predicted = classifier.predict_batch(&dataset.feature_rows())?;
        let evaluation = Self::from_confusion(
            classifier.backend(),
            ConfusionMatrix::from_labels(&dataset.labels(), &predicted)?,
        );
        info!(
            accuracy = evaluation.accuracy,
            precision = evaluation.precision,
            recall = evaluation.recall,
            "evaluation complete"
        );
        Ok(evaluation)
    }

    /// Derive every metric from a confusion matrix.
    #[must_use]
    pub fn from_confusion(backend: Backend, confusion: ConfusionMatrix) -> Self {
        let class_metrics = confusion.class_metrics();
        Self {
            backend,
            accuracy: confusion.accuracy(),
            precision: weighted(&class_metrics, |m| m.precision),
            recall: weighted(&class_metrics, |m| m.recall),
            f1: weighted(&class_metrics, |m| m.f1),
            confusion,
            class_metrics,
        }
    }

    /// Backend that was evaluated.
    #[must_use]
    pub fn backend(&self) -> Backend {
        self.backend
    }

    /// Fraction of samples classified correctly.
    #[must_use]
    pub fn accuracy(&self) -> f64 {
        self.accuracy
    }

    /// Support-weighted precision.
    #[must_use]
    pub fn precision(&self) -> f64 {
        self.precision
    }

    /// Support-weighted recall.
    #[must_use]
    pub fn recall(&self) -> f64 {
        self.recall
    }

    /// Support-weighted F1.
    #[must_use]
    pub fn f1(&self) -> f64 {
        self.f1
    }

    /// The underlying confusion matrix.
    #[must_use]
    pub fn confusion(&self) -> &ConfusionMatrix {
        &self.confusion
    }

    /// Per-class metrics in class-index order.
    #[must_use]
    pub fn class_metrics(&self) -> &[ClassMetrics] {
        &self.class_metrics
    }

    /// `(precision, recall, f1, support)` per class index, for report writers.
    #[must_use]
    pub fn class_metric_tuples(&self) -> Vec<(f64, f64, f64, usize)> {
        self.class_metrics
            .iter()
            .map(|m| (m.precision, m.recall, m.f1, m.support))
            .collect()
    }
}

impl fmt::Display for Evaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = self.backend.short_name();
        writeln!(f, "{prefix} Test Accuracy Score: {:.4}", self.accuracy)?;
        writeln!(f, "{prefix} Test Precision Score: {:.4}", self.precision)?;
        write!(f, "{prefix} Test Recall Score: {:.4}", self.recall)
    }
}
