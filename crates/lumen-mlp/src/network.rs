//! The fitted network and its forward pass.

use serde::{Deserialize, Serialize};

use crate::error::MlpError;
use crate::layer::Layer;

/// Scale applied to raw 8-bit inputs before the first layer.
pub(crate) const INPUT_SCALE: f64 = 255.0;

/// A fitted multilayer perceptron.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mlp {
    pub(crate) layers: Vec<Layer>,
    pub(crate) n_features: usize,
    pub(crate) n_classes: usize,
}

pub(crate) fn scale_input(sample: &[u8]) -> Vec<f64> {
    sample.iter().map(|&v| f64::from(v) / INPUT_SCALE).collect()
}

pub(crate) fn relu_in_place(values: &mut [f64]) {
    for v in values {
        if *v < 0.0 {
            *v = 0.0;
        }
    }
}

pub(crate) fn softmax_in_place(values: &mut [f64]) {
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mut sum = 0.0;
    for v in values.iter_mut() {
        *v = (*v - max).exp();
        sum += *v;
    }
    for v in values.iter_mut() {
        *v /= sum;
    }
}

impl Mlp {
    /// Activations of every layer, input first, softmax output last.
    pub(crate) fn forward_trace(&self, input: Vec<f64>) -> Vec<Vec<f64>> {
        let mut activations = Vec::with_capacity(self.layers.len() + 1);
        activations.push(input);
        let last = self.layers.len() - 1;
        for (i, layer) in self.layers.iter().enumerate() {
            let mut z = layer.forward(&activations[i]);
            if i == last {
                softmax_in_place(&mut z);
            } else {
                relu_in_place(&mut z);
            }
            activations.push(z);
        }
        activations
    }

    fn check_width(&self, sample: &[u8]) -> Result<(), MlpError> {
        if sample.len() != self.n_features {
            return Err(MlpError::PredictionFeatureMismatch {
                expected: self.n_features,
                got: sample.len(),
            });
        }
        Ok(())
    }

    /// Class probabilities for a single sample (sums to 1.0).
    ///
    /// # Errors
    ///
    /// Returns [`MlpError::PredictionFeatureMismatch`] if `sample` has the
    /// wrong number of features.
    pub fn predict_proba(&self, sample: &[u8]) -> Result<Vec<f64>, MlpError> {
        self.check_width(sample)?;
        let mut trace = self.forward_trace(scale_input(sample));
        Ok(trace.pop().unwrap_or_default())
    }

    /// Predicted class index for a single sample. Ties go to the lower index.
    ///
    /// # Errors
    ///
    /// Returns [`MlpError::PredictionFeatureMismatch`] if `sample` has the
    /// wrong number of features.
    pub fn predict(&self, sample: &[u8]) -> Result<usize, MlpError> {
        let probs = self.predict_proba(sample)?;
        Ok(argmax(&probs))
    }

    /// Predicted class indices for many samples.
    ///
    /// # Errors
    ///
    /// Returns [`MlpError::PredictionFeatureMismatch`] on the first row of
    /// the wrong width.
    pub fn predict_batch<R: AsRef<[u8]>>(&self, features: &[R]) -> Result<Vec<usize>, MlpError> {
        features.iter().map(|row| self.predict(row.as_ref())).collect()
    }

    /// Structural check for a network that did not come from
    /// [`MlpConfig::fit`](crate::MlpConfig::fit), such as one decoded from disk.
    ///
    /// # Errors
    ///
    /// [`MlpError::MalformedNetwork`] when there are no layers, widths do
    /// not chain from `n_features` to `n_classes`, a buffer has the wrong
    /// length, or a parameter is not finite.
    pub fn validate(&self) -> Result<(), MlpError> {
        let malformed = |reason: String| Err(MlpError::MalformedNetwork { reason });
        if self.layers.is_empty() {
            return malformed("no layers".to_owned());
        }
        let mut width = self.n_features;
        for (idx, layer) in self.layers.iter().enumerate() {
            if layer.n_in == 0 || layer.n_out == 0 {
                return malformed(format!("layer {idx} is {}x{}", layer.n_in, layer.n_out));
            }
            if layer.n_in != width {
                return malformed(format!(
                    "layer {idx} takes {} inputs, previous width is {width}",
                    layer.n_in
                ));
            }
            if layer.weights.len() != layer.n_in * layer.n_out || layer.biases.len() != layer.n_out {
                return malformed(format!(
                    "layer {idx} holds {} weights and {} biases for {}x{}",
                    layer.weights.len(),
                    layer.biases.len(),
                    layer.n_in,
                    layer.n_out
                ));
            }
            if layer.weights.iter().chain(&layer.biases).any(|p| !p.is_finite()) {
                return malformed(format!("layer {idx} holds a non-finite parameter"));
            }
            width = layer.n_out;
        }
        if width != self.n_classes {
            return malformed(format!(
                "output width {width}, network declares {} classes",
                self.n_classes
            ));
        }
        Ok(())
    }

    /// Number of input features.
    #[must_use]
    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Number of output classes.
    #[must_use]
    pub fn n_classes(&self) -> usize {
        self.n_classes
    }

    /// The dense layers, input side first.
    #[must_use]
    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    /// Hidden layer widths, excluding the output layer.
    #[must_use]
    pub fn hidden_layer_sizes(&self) -> Vec<usize> {
        let n_hidden = self.layers.len().saturating_sub(1);
        self.layers[..n_hidden].iter().map(Layer::n_out).collect()
    }
}

pub(crate) fn argmax(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate().skip(1) {
        if v > values[best] {
            best = i;
        }
    }
    best
}
