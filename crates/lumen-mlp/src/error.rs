//! Error types for lumen-mlp.

/// Errors that can occur during MLP configuration, training, or prediction.
#[derive(Debug, thiserror::Error)]
pub enum MlpError {
    /// A hidden layer was configured with zero units.
    #[error("hidden layer {layer_index} has zero units")]
    EmptyHiddenLayer {
        /// Zero-based position of the offending layer.
        layer_index: usize,
    },

    /// Learning rate must be finite and positive.
    #[error("learning_rate must be finite and > 0, got {learning_rate}")]
    InvalidLearningRate {
        /// The invalid value provided.
        learning_rate: f64,
    },

    /// L2 penalty must be finite and non-negative.
    #[error("alpha must be finite and >= 0, got {alpha}")]
    InvalidAlpha {
        /// The invalid value provided.
        alpha: f64,
    },

    /// Mini-batch size must be at least 1.
    #[error("batch_size must be >= 1, got {batch_size}")]
    InvalidBatchSize {
        /// The invalid value provided.
        batch_size: usize,
    },

    /// Epoch budget must be at least 1.
    #[error("max_epochs must be >= 1, got {max_epochs}")]
    InvalidMaxEpochs {
        /// The invalid value provided.
        max_epochs: usize,
    },

    /// Tolerance must be finite and non-negative.
    #[error("tolerance must be finite and >= 0, got {tolerance}")]
    InvalidTolerance {
        /// The invalid value provided.
        tolerance: f64,
    },

    /// Need at least two output classes.
    #[error("n_classes must be >= 2, got {n_classes}")]
    InvalidClassCount {
        /// The invalid value provided.
        n_classes: usize,
    },

    /// Training data has no samples.
    #[error("dataset is empty (0 samples)")]
    EmptyDataset,

    /// Training rows have no feature columns.
    #[error("samples have zero features")]
    ZeroFeatures,

    /// Training rows have inconsistent lengths.
    #[error("sample {sample_index} has {got} features, expected {expected}")]
    FeatureCountMismatch {
        /// Feature count of the first row.
        expected: usize,
        /// Feature count of the offending row.
        got: usize,
        /// Index of the offending row.
        sample_index: usize,
    },

    /// Labels and rows differ in length.
    #[error("{n_rows} feature rows but {n_labels} labels")]
    LabelCountMismatch {
        /// Number of feature rows.
        n_rows: usize,
        /// Number of labels.
        n_labels: usize,
    },

    /// A label is outside `[0, n_classes)`.
    #[error("sample {sample_index} has label {label}, but n_classes is {n_classes}")]
    LabelOutOfRange {
        /// Index of the offending sample.
        sample_index: usize,
        /// The offending label.
        label: usize,
        /// Declared class count.
        n_classes: usize,
    },

    /// Prediction input width does not match the trained network.
    #[error("prediction input has {got} features, network expects {expected}")]
    PredictionFeatureMismatch {
        /// Feature count the network was trained on.
        expected: usize,
        /// Feature count of the input.
        got: usize,
    },

    /// A decoded network whose layers do not chain.
    #[error("malformed network: {reason}")]
    MalformedNetwork {
        /// First structural problem found.
        reason: String,
    },

    /// Training diverged.
    #[error("training loss became non-finite at epoch {epoch}")]
    NonFiniteLoss {
        /// One-based epoch at which the loss was NaN or infinite.
        epoch: usize,
    },
}

/// Validate training rows and labels, returning the feature count.
pub(crate) fn validate_training_data<R: AsRef<[u8]>>(
    features: &[R],
    labels: &[usize],
    n_classes: usize,
) -> Result<usize, MlpError> {
    if n_classes < 2 {
        return Err(MlpError::InvalidClassCount { n_classes });
    }
    let first = features.first().ok_or(MlpError::EmptyDataset)?;
    let n_features = first.as_ref().len();
    if n_features == 0 {
        return Err(MlpError::ZeroFeatures);
    }
    if features.len() != labels.len() {
        return Err(MlpError::LabelCountMismatch {
            n_rows: features.len(),
            n_labels: labels.len(),
        });
    }
    for (sample_index, row) in features.iter().enumerate() {
        let got = row.as_ref().len();
        if got != n_features {
            return Err(MlpError::FeatureCountMismatch {
                expected: n_features,
                got,
                sample_index,
            });
        }
    }
    if let Some((sample_index, &label)) = labels.iter().enumerate().find(|(_, l)| **l >= n_classes) {
        return Err(MlpError::LabelOutOfRange {
            sample_index,
            label,
            n_classes,
        });
    }
    Ok(n_features)
}
