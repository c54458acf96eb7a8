//! The uniform classifier interface over both backends.

use lumen_image::{FeatureVector, Label};
use lumen_mlp::Mlp;
use lumen_rf::RandomForest;
use serde::Serialize;
use serde::ser::Serializer;

use crate::backend::Backend;
use crate::error::ModelError;

/// Probability per [`Label`], normalized to sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Probabilities([f64; Label::COUNT]);

impl Probabilities {
    /// Build from one value per label in class-index order, normalizing the sum.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ModelError::ProbabilityCount`] | `values.len() != Label::COUNT` |
    /// | [`ModelError::InvalidProbabilities`] | a value is negative or not finite, or the sum is zero |
    pub fn from_slice(values: &[f64]) -> Result<Self, ModelError> {
        let arr: [f64; Label::COUNT] =
            values.try_into().map_err(|_| ModelError::ProbabilityCount {
                expected: Label::COUNT,
                got: values.len(),
            })?;
        let sum: f64 = arr.iter().sum();
        if arr.iter().any(|p| !p.is_finite() || *p < 0.0) || sum <= 0.0 {
            return Err(ModelError::InvalidProbabilities {
                values: values.to_vec(),
            });
        }
        Ok(Self(arr.map(|p| p / sum)))
    }

    /// Probability assigned to `label`.
    #[must_use]
    pub fn get(&self, label: Label) -> f64 {
        self.0[label.index()]
    }

    /// The most probable label. Ties go to the lower class index.
    #[must_use]
    pub fn argmax(&self) -> Label {
        let mut best = Label::ALL[0];
        for label in Label::ALL.into_iter().skip(1) {
            if self.get(label) > self.get(best) {
                best = label;
            }
        }
        best
    }

    /// The largest probability.
    #[must_use]
    pub fn max(&self) -> f64 {
        self.get(self.argmax())
    }

    /// `(label, probability)` pairs in class-index order.
    pub fn iter(&self) -> impl Iterator<Item = (Label, f64)> + '_ {
        Label::ALL.into_iter().map(|label| (label, self.get(label)))
    }
}

impl Serialize for Probabilities {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_map(self.iter().map(|(label, p)| (label.name(), p)))
    }
}

/// A fitted model that maps feature vectors to labels.
///
/// Implemented by both backends and by the tagged [`Model`](crate::Model).
pub trait Classifier: Send + Sync {
    /// Which backend this is.
    fn backend(&self) -> Backend;

    /// Input width the model was trained on.
    fn n_features(&self) -> usize;

    /// Class probabilities for one feature vector.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::PredictionFeatureMismatch`] when the vector width
    /// differs from [`Classifier::n_features`].
    fn predict_probabilities(&self, features: &FeatureVector) -> Result<Probabilities, ModelError>;

    /// Most probable label for one feature vector.
    ///
    /// # Errors
    ///
    /// Same as [`Classifier::predict_probabilities`].
    fn predict(&self, features: &FeatureVector) -> Result<Label, ModelError> {
        Ok(self.predict_probabilities(features)?.argmax())
    }

    /// Labels for many feature vectors.
    ///
    /// # Errors
    ///
    /// Fails on the first vector [`Classifier::predict`] rejects.
    fn predict_batch(&self, rows: &[&FeatureVector]) -> Result<Vec<Label>, ModelError> {
        rows.iter().map(|row| self.predict(row)).collect()
    }
}

fn check_width(expected: usize, features: &FeatureVector) -> Result<(), ModelError> {
    if features.len() != expected {
        return Err(ModelError::PredictionFeatureMismatch {
            expected,
            got: features.len(),
        });
    }
    Ok(())
}

fn label_from_index(index: usize) -> Result<Label, ModelError> {
    Label::from_index(index).ok_or_else(|| ModelError::CorruptModel {
        reason: format!("class index {index} has no label"),
    })
}

impl Classifier for Mlp {
    fn backend(&self) -> Backend {
        Backend::NeuralNetwork
    }

    fn n_features(&self) -> usize {
        Mlp::n_features(self)
    }

    fn predict_probabilities(&self, features: &FeatureVector) -> Result<Probabilities, ModelError> {
        check_width(Mlp::n_features(self), features)?;
        Probabilities::from_slice(&self.predict_proba(features.as_slice())?)
    }
}

impl Classifier for RandomForest {
    fn backend(&self) -> Backend {
        Backend::RandomForest
    }

    fn n_features(&self) -> usize {
        RandomForest::n_features(self)
    }

    fn predict_probabilities(&self, features: &FeatureVector) -> Result<Probabilities, ModelError> {
        check_width(RandomForest::n_features(self), features)?;
        Probabilities::from_slice(self.predict_proba(features.as_slice())?.as_slice())
    }

    fn predict_batch(&self, rows: &[&FeatureVector]) -> Result<Vec<Label>, ModelError> {
        for row in rows {
            check_width(RandomForest::n_features(self), row)?;
        }
        RandomForest::predict_batch(self, rows)?
            .into_iter()
            .map(label_from_index)
            .collect()
    }
}
