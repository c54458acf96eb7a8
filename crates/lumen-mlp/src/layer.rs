//! Dense layer storage and the per-layer forward/backward kernels.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// A fully connected layer: `out = W · in + b`.
///
/// Weights are stored row-major, one row of `n_in` weights per output unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    pub(crate) weights: Vec<f64>,
    pub(crate) biases: Vec<f64>,
    pub(crate) n_in: usize,
    pub(crate) n_out: usize,
}

impl Layer {
    /// Glorot-uniform initialization with the ReLU gain.
    pub(crate) fn glorot(n_in: usize, n_out: usize, rng: &mut impl Rng) -> Self {
        let bound = (6.0 / (n_in + n_out) as f64).sqrt();
        let weights = (0..n_in * n_out)
            .map(|_| rng.gen_range(-bound..bound))
            .collect();
        let biases = (0..n_out).map(|_| rng.gen_range(-bound..bound)).collect();
        Self {
            weights,
            biases,
            n_in,
            n_out,
        }
    }

    /// Number of inputs.
    #[must_use]
    pub fn n_in(&self) -> usize {
        self.n_in
    }

    /// Number of output units.
    #[must_use]
    pub fn n_out(&self) -> usize {
        self.n_out
    }

    /// Pre-activation output for one input vector.
    pub(crate) fn forward(&self, input: &[f64]) -> Vec<f64> {
        self.weights
            .chunks_exact(self.n_in)
            .zip(&self.biases)
            .map(|(row, b)| b + row.iter().zip(input).map(|(w, x)| w * x).sum::<f64>())
            .collect()
    }

    /// Accumulate `delta ⊗ input` into the gradient buffers.
    pub(crate) fn accumulate(
        &self,
        delta: &[f64],
        input: &[f64],
        grad_w: &mut [f64],
        grad_b: &mut [f64],
    ) {
        for ((d, gb), grow) in delta
            .iter()
            .zip(grad_b.iter_mut())
            .zip(grad_w.chunks_exact_mut(self.n_in))
        {
            *gb += d;
            if *d == 0.0 {
                continue;
            }
            for (g, x) in grow.iter_mut().zip(input) {
                *g += d * x;
            }
        }
    }

    /// Propagate `delta` back through the weights: `Wᵀ · delta`.
    pub(crate) fn backward(&self, delta: &[f64]) -> Vec<f64> {
        let mut out = vec![0.0; self.n_in];
        for (row, d) in self.weights.chunks_exact(self.n_in).zip(delta) {
            for (o, w) in out.iter_mut().zip(row) {
                *o += w * d;
            }
        }
        out
    }

    pub(crate) fn squared_weight_sum(&self) -> f64 {
        self.weights.iter().map(|w| w * w).sum()
    }
}
