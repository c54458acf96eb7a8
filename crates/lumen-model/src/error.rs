//! Error types for lumen-model.

use std::path::PathBuf;

use lumen_image::ImageError;
use lumen_mlp::MlpError;
use lumen_rf::RfError;

use crate::backend::Backend;

/// Errors from fitting, predicting, and persisting models.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// Returned when neural-network training fails.
    #[error("neural network training failed")]
    MlpTraining {
        /// Underlying MLP error.
        source: MlpError,
    },

    /// Returned when random-forest training fails.
    #[error("random forest training failed")]
    RfTraining {
        /// Underlying forest error.
        source: RfError,
    },

    /// Returned when a feature vector does not match the model's input width.
    #[error("model expects {expected} features, got {got}")]
    PredictionFeatureMismatch {
        /// Input width the model was trained on.
        expected: usize,
        /// Width of the offending vector.
        got: usize,
    },

    /// Returned when a backend yields something other than one probability
    /// per label.
    #[error("backend returned {got} class probabilities, expected {expected}")]
    ProbabilityCount {
        /// Number of labels.
        expected: usize,
        /// Number of values returned.
        got: usize,
    },

    /// Returned when probabilities are negative, non-finite, or sum to zero.
    #[error("backend returned invalid probabilities {values:?}")]
    InvalidProbabilities {
        /// The offending values.
        values: Vec<f64>,
    },

    /// Returned when truth and prediction lists differ in length.
    #[error("{n_truth} true labels but {n_predicted} predictions")]
    PredictionCountMismatch {
        /// Number of true labels.
        n_truth: usize,
        /// Number of predictions.
        n_predicted: usize,
    },

    /// Returned when bincode encoding fails.
    #[error("cannot encode {backend} model")]
    Encode {
        /// Backend being encoded.
        backend: Backend,
        /// Underlying bincode error.
        source: bincode::Error,
    },

    /// Returned when bytes do not decode as a model envelope.
    #[error("cannot decode model")]
    Decode {
        /// Underlying bincode error.
        source: bincode::Error,
    },

    /// Returned when the envelope was written by an incompatible format version.
    #[error("incompatible model format version {found} (expected {expected})")]
    IncompatibleModelVersion {
        /// Version this build reads.
        expected: u32,
        /// Version found in the envelope.
        found: u32,
    },

    /// Returned when the envelope header disagrees with its payload.
    #[error("corrupt model: {reason}")]
    CorruptModel {
        /// What did not match.
        reason: String,
    },

    /// Returned when a model file holds a different backend than requested.
    #[error("model file holds a {found} model, expected {expected}")]
    UnexpectedBackend {
        /// Backend that was requested.
        expected: Backend,
        /// Backend found in the file.
        found: Backend,
    },

    /// Returned when a model file cannot be read.
    #[error("cannot read model {path}")]
    ReadModel {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// Returned when a model file cannot be written.
    #[error("cannot write model {path}")]
    WriteModel {
        /// Path that was attempted.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
}

impl From<MlpError> for ModelError {
    fn from(err: MlpError) -> Self {
        match err {
            MlpError::PredictionFeatureMismatch { expected, got } => {
                ModelError::PredictionFeatureMismatch { expected, got }
            }
            other => ModelError::MlpTraining { source: other },
        }
    }
}

impl From<RfError> for ModelError {
    fn from(err: RfError) -> Self {
        match err {
            RfError::PredictionFeatureMismatch { expected, got } => {
                ModelError::PredictionFeatureMismatch { expected, got }
            }
            other => ModelError::RfTraining { source: other },
        }
    }
}

/// Errors surfaced to the operator by the inference service.
#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    /// The selector names no known backend.
    #[error("unsupported backend \"{name}\" (expected neural-network/nn/ann/mlp or random-forest/rf)")]
    UnsupportedBackend {
        /// The selector as given.
        name: String,
    },

    /// The backend's model is not loaded.
    #[error("{backend} model unavailable: {reason}")]
    ModelUnavailable {
        /// Backend that was requested.
        backend: Backend,
        /// Why it is not loaded.
        reason: String,
    },

    /// Classification was requested before any image was loaded.
    #[error("no image loaded")]
    NoInput,

    /// The image could not be normalized.
    #[error("cannot normalize input image")]
    Image {
        /// Underlying normalization error.
        #[from]
        source: ImageError,
    },

    /// The model failed to produce a decision.
    #[error("{backend} model failed")]
    Model {
        /// Backend that failed.
        backend: Backend,
        /// Underlying model error.
        source: ModelError,
    },
}
