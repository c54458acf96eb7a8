//! Configuration builder for MLP training.

use crate::error::MlpError;
use crate::result::MlpResult;

/// Configuration for MLP training.
///
/// Construct via [`MlpConfig::new`], then chain `with_*` methods.
///
/// # Defaults
///
/// | Parameter       | Default |
/// |-----------------|---------|
/// | `learning_rate` | 1e-3    |
/// | `alpha`         | 1e-4    |
/// | `batch_size`    | 200     |
/// | `max_epochs`    | 200     |
/// | `tolerance`     | 1e-4    |
/// | `patience`      | 10      |
/// | `seed`          | 42      |
///
/// `batch_size` is clamped to the number of training samples.
#[derive(Debug, Clone)]
pub struct MlpConfig {
    pub(crate) hidden_layer_sizes: Vec<usize>,
    pub(crate) learning_rate: f64,
    pub(crate) alpha: f64,
    pub(crate) batch_size: usize,
    pub(crate) max_epochs: usize,
    pub(crate) tolerance: f64,
    pub(crate) patience: usize,
    pub(crate) seed: u64,
}

impl MlpConfig {
    /// Hidden layer widths used when none are given.
    pub const DEFAULT_HIDDEN_LAYERS: [usize; 2] = [5, 2];

    /// Create a new config with the given hidden layer widths.
    ///
    /// An empty list yields a softmax regression (input wired straight to
    /// the output layer).
    ///
    /// # Errors
    ///
    /// Returns [`MlpError::EmptyHiddenLayer`] if any width is zero.
    pub fn new(hidden_layer_sizes: impl Into<Vec<usize>>) -> Result<Self, MlpError> {
        let hidden_layer_sizes = hidden_layer_sizes.into();
        if let Some(layer_index) = hidden_layer_sizes.iter().position(|&w| w == 0) {
            return Err(MlpError::EmptyHiddenLayer { layer_index });
        }
        Ok(Self {
            hidden_layer_sizes,
            ..Self::default()
        })
    }

    /// Set the Adam step size.
    #[must_use]
    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    /// Set the L2 penalty strength.
    #[must_use]
    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    /// Set the mini-batch size.
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Set the epoch budget.
    #[must_use]
    pub fn with_max_epochs(mut self, max_epochs: usize) -> Self {
        self.max_epochs = max_epochs;
        self
    }

    /// Set the minimum loss improvement that resets the patience counter.
    #[must_use]
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Set how many epochs without improvement are tolerated before stopping.
    #[must_use]
    pub fn with_patience(mut self, patience: usize) -> Self {
        self.patience = patience;
        self
    }

    /// Set the random seed for initialization and shuffling.
    #[must_use]
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Return the hidden layer widths.
    #[must_use]
    pub fn hidden_layer_sizes(&self) -> &[usize] {
        &self.hidden_layer_sizes
    }

    /// Return the epoch budget.
    #[must_use]
    pub fn max_epochs(&self) -> usize {
        self.max_epochs
    }

    /// Return the random seed.
    #[must_use]
    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub(crate) fn validate(&self) -> Result<(), MlpError> {
        if !self.learning_rate.is_finite() || self.learning_rate <= 0.0 {
            return Err(MlpError::InvalidLearningRate {
                learning_rate: self.learning_rate,
            });
        }
        if !self.alpha.is_finite() || self.alpha < 0.0 {
            return Err(MlpError::InvalidAlpha { alpha: self.alpha });
        }
        if self.batch_size == 0 {
            return Err(MlpError::InvalidBatchSize {
                batch_size: self.batch_size,
            });
        }
        if self.max_epochs == 0 {
            return Err(MlpError::InvalidMaxEpochs {
                max_epochs: self.max_epochs,
            });
        }
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(MlpError::InvalidTolerance {
                tolerance: self.tolerance,
            });
        }
        Ok(())
    }

    /// Train an MLP on the provided dataset.
    ///
    /// `features[sample_idx]` is a row of 8-bit values; `labels[sample_idx]`
    /// is its class index in `[0, n_classes)`.
    ///
    /// # Errors
    ///
    /// | Variant                            | When                                     |
    /// |------------------------------------|------------------------------------------|
    /// | [`MlpError::InvalidLearningRate`]  | learning rate is not finite and positive |
    /// | [`MlpError::InvalidAlpha`]         | alpha is negative or not finite          |
    /// | [`MlpError::InvalidBatchSize`]     | batch size is zero                       |
    /// | [`MlpError::InvalidMaxEpochs`]     | epoch budget is zero                     |
    /// | [`MlpError::InvalidTolerance`]     | tolerance is negative or not finite      |
    /// | [`MlpError::InvalidClassCount`]    | `n_classes < 2`                          |
    /// | [`MlpError::EmptyDataset`]         | `features` is empty                      |
    /// | [`MlpError::ZeroFeatures`]         | rows have zero feature columns           |
    /// | [`MlpError::FeatureCountMismatch`] | rows have inconsistent lengths           |
    /// | [`MlpError::LabelCountMismatch`]   | `features` and `labels` differ in length |
    /// | [`MlpError::LabelOutOfRange`]      | a label is `>= n_classes`                |
    /// | [`MlpError::NonFiniteLoss`]        | the loss diverged                        |
    pub fn fit<R: AsRef<[u8]>>(
        &self,
        features: &[R],
        labels: &[usize],
        n_classes: usize,
    ) -> Result<MlpResult, MlpError> {
        crate::train::train(self, features, labels, n_classes)
    }
}

impl Default for MlpConfig {
    fn default() -> Self {
        Self {
            hidden_layer_sizes: Self::DEFAULT_HIDDEN_LAYERS.to_vec(),
            learning_rate: 1e-3,
            alpha: 1e-4,
            batch_size: 200,
            max_epochs: 200,
            tolerance: 1e-4,
            patience: 10,
            seed: 42,
        }
    }
}
