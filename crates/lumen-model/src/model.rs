//! The tagged model over both backends and the per-backend training configs.

use lumen_image::{FeatureVector, Label};
use lumen_io::Dataset;
use lumen_mlp::{Mlp, MlpConfig};
use lumen_rf::{RandomForest, RandomForestConfig};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::backend::Backend;
use crate::classifier::{Classifier, Probabilities};
use crate::error::ModelError;

/// A fitted model of either backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Model {
    /// A fitted multilayer perceptron.
    NeuralNetwork(Mlp),
    /// A fitted random forest.
    RandomForest(RandomForest),
}

impl Model {
    fn as_classifier(&self) -> &dyn Classifier {
        match self {
            Model::NeuralNetwork(mlp) => mlp,
            Model::RandomForest(forest) => forest,
        }
    }

    /// Number of output classes the model was fitted with.
    #[must_use]
    pub fn n_classes(&self) -> usize {
        match self {
            Model::NeuralNetwork(mlp) => mlp.n_classes(),
            Model::RandomForest(forest) => forest.n_classes(),
        }
    }
}

impl Classifier for Model {
    fn backend(&self) -> Backend {
        self.as_classifier().backend()
    }

    fn n_features(&self) -> usize {
        self.as_classifier().n_features()
    }

    fn predict_probabilities(&self, features: &FeatureVector) -> Result<Probabilities, ModelError> {
        self.as_classifier().predict_probabilities(features)
    }

    fn predict_batch(&self, rows: &[&FeatureVector]) -> Result<Vec<Label>, ModelError> {
        self.as_classifier().predict_batch(rows)
    }
}

/// What happened during a fit, for logs and summaries.
#[derive(Debug, Clone, Serialize)]
pub struct TrainingSummary {
    /// Backend that was fitted.
    pub backend: Backend,
    /// Training set size.
    pub n_samples: usize,
    /// Input width.
    pub n_features: usize,
    /// Epochs run (neural network only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n_epochs: Option<usize>,
    /// Whether training stopped on a loss plateau (neural network only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub converged: Option<bool>,
    /// Last epoch's loss (neural network only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub final_loss: Option<f64>,
    /// Trees grown (random forest only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub n_trees: Option<usize>,
    /// Out-of-bag accuracy, when enabled (random forest only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub oob_accuracy: Option<f64>,
}

/// Hyperparameters for one backend.
#[derive(Debug, Clone)]
pub enum BackendConfig {
    /// Multilayer perceptron settings.
    NeuralNetwork(MlpConfig),
    /// Random forest settings.
    RandomForest(RandomForestConfig),
}

impl BackendConfig {
    /// Which backend this config trains.
    #[must_use]
    pub fn backend(&self) -> Backend {
        match self {
            BackendConfig::NeuralNetwork(_) => Backend::NeuralNetwork,
            BackendConfig::RandomForest(_) => Backend::RandomForest,
        }
    }

    /// Fit a model on `dataset`.
    ///
    /// # Errors
    ///
    /// | Variant | Condition |
    /// |---|---|
    /// | [`ModelError::MlpTraining`] | the neural network rejected its config or diverged |
    /// | [`ModelError::RfTraining`] | the forest rejected its config |
    pub fn fit(&self, dataset: &Dataset) -> Result<Model, ModelError> {
        self.fit_with_summary(dataset).map(|(model, _)| model)
    }

    /// Fit a model on `dataset` and report how training went.
    ///
    /// # Errors
    ///
    /// Same as [`BackendConfig::fit`].
    #[instrument(skip_all, fields(backend = %self.backend(), n_samples = dataset.len()))]
    pub fn fit_with_summary(&self, dataset: &Dataset) -> Result<(Model, TrainingSummary), ModelError> {
        let rows = dataset.feature_rows();
        let labels = dataset.label_indices();

        let (model, summary) = match self {
            BackendConfig::NeuralNetwork(config) => {
                let result = config
                    .fit(&rows, &labels, Label::COUNT)
                    .map_err(|e| ModelError::MlpTraining { source: e })?;
                let summary = TrainingSummary {
                    backend: Backend::NeuralNetwork,
                    n_samples: rows.len(),
                    n_features: result.network().n_features(),
                    n_epochs: Some(result.n_epochs()),
                    converged: Some(result.converged()),
                    final_loss: result.loss_curve().last().copied(),
                    n_trees: None,
                    oob_accuracy: None,
                };
                (Model::NeuralNetwork(result.into_network()), summary)
            }
            BackendConfig::RandomForest(config) => {
                let result = config
                    .fit(&rows, &labels, Label::COUNT)
                    .map_err(|e| ModelError::RfTraining { source: e })?;
                let summary = TrainingSummary {
                    backend: Backend::RandomForest,
                    n_samples: rows.len(),
                    n_features: result.metadata().n_features,
                    n_epochs: None,
                    converged: None,
                    final_loss: None,
                    n_trees: Some(result.metadata().n_trees),
                    oob_accuracy: result.oob_accuracy(),
                };
                (Model::RandomForest(result.into_forest()), summary)
            }
        };

        info!(backend = %summary.backend, n_features = summary.n_features, "model fitted");
        Ok((model, summary))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::synthetic_dataset;

    #[test]
    fn both_backends_fit_and_predict() {
        let dataset = synthetic_dataset(6, 6);
        let configs = [
            BackendConfig::NeuralNetwork(MlpConfig::default().with_max_epochs(5).with_seed(1)),
            BackendConfig::RandomForest(RandomForestConfig::new(5).unwrap().with_seed(1)),
        ];
        for config in configs {
            let (model, summary) = config.fit_with_summary(&dataset).unwrap();
            assert_eq!(model.backend(), config.backend());
            assert_eq!(summary.backend, config.backend());
            assert_eq!(model.n_features(), lumen_image::FEATURE_LEN);
            assert_eq!(model.n_classes(), Label::COUNT);
            let probs = model.predict_probabilities(dataset.samples()[0].features()).unwrap();
            let sum: f64 = probs.iter().map(|(_, p)| p).sum();
            assert!((sum - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn forest_summary_reports_oob() {
        let dataset = synthetic_dataset(8, 8);
        let config = BackendConfig::RandomForest(
            RandomForestConfig::new(10)
                .unwrap()
                .with_oob_mode(lumen_rf::OobMode::Enabled),
        );
        let (_, summary) = config.fit_with_summary(&dataset).unwrap();
        assert_eq!(summary.n_trees, Some(10));
        assert!(summary.oob_accuracy.is_some());
        assert!(summary.n_epochs.is_none());
    }

    #[test]
    fn invalid_mlp_config_surfaces_as_training_error() {
        let dataset = synthetic_dataset(2, 2);
        let config = BackendConfig::NeuralNetwork(MlpConfig::default().with_learning_rate(-1.0));
        assert!(matches!(
            config.fit(&dataset),
            Err(ModelError::MlpTraining { .. })
        ));
    }
}
