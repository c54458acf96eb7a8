//! Training result for the MLP.

use crate::network::Mlp;

/// Result of MLP training.
#[derive(Debug, Clone)]
pub struct MlpResult {
    network: Mlp,
    loss_curve: Vec<f64>,
    n_epochs: usize,
    converged: bool,
}

impl MlpResult {
    pub(crate) fn new(network: Mlp, loss_curve: Vec<f64>, converged: bool) -> Self {
        Self {
            n_epochs: loss_curve.len(),
            network,
            loss_curve,
            converged,
        }
    }

    /// Borrow the fitted network.
    #[must_use]
    pub fn network(&self) -> &Mlp {
        &self.network
    }

    /// Consume the result and return the fitted network.
    #[must_use]
    pub fn into_network(self) -> Mlp {
        self.network
    }

    /// Training loss per epoch (L2 penalty included).
    #[must_use]
    pub fn loss_curve(&self) -> &[f64] {
        &self.loss_curve
    }

    /// Number of epochs actually run.
    #[must_use]
    pub fn n_epochs(&self) -> usize {
        self.n_epochs
    }

    /// `true` if training stopped on a loss plateau rather than the epoch budget.
    #[must_use]
    pub fn converged(&self) -> bool {
        self.converged
    }
}
