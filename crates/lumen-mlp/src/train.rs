//! Mini-batch Adam training loop.

use std::iter;

use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;
use tracing::{debug, info, instrument};

use crate::config::MlpConfig;
use crate::error::{MlpError, validate_training_data};
use crate::layer::Layer;
use crate::network::{Mlp, scale_input};
use crate::optimizer::Adam;
use crate::result::MlpResult;

/// Probabilities are clipped to this floor before taking the log.
const PROB_FLOOR: f64 = 1e-10;

/// Gradient buffers mirroring the network's layers.
struct Gradients {
    weights: Vec<Vec<f64>>,
    biases: Vec<Vec<f64>>,
}

impl Gradients {
    fn zeros_like(network: &Mlp) -> Self {
        Self {
            weights: network.layers.iter().map(|l| vec![0.0; l.weights.len()]).collect(),
            biases: network.layers.iter().map(|l| vec![0.0; l.biases.len()]).collect(),
        }
    }
}

#[instrument(skip_all, fields(n_samples = features.len(), hidden = ?config.hidden_layer_sizes))]
pub(crate) fn train<R: AsRef<[u8]>>(
    config: &MlpConfig,
    features: &[R],
    labels: &[usize],
    n_classes: usize,
) -> Result<MlpResult, MlpError> {
    config.validate()?;
    let n_features = validate_training_data(features, labels, n_classes)?;
    let n_samples = features.len();
    let batch_size = config.batch_size.min(n_samples);

    let mut rng = ChaCha8Rng::seed_from_u64(config.seed);
    let widths: Vec<usize> = iter::once(n_features)
        .chain(config.hidden_layer_sizes.iter().copied())
        .chain(iter::once(n_classes))
        .collect();
    let layers = widths
        .windows(2)
        .map(|w| Layer::glorot(w[0], w[1], &mut rng))
        .collect();
    let mut network = Mlp {
        layers,
        n_features,
        n_classes,
    };
    let mut adam = Adam::new(
        config.learning_rate,
        network
            .layers
            .iter()
            .flat_map(|l| [l.weights.len(), l.biases.len()]),
    );

    info!(
        n_samples,
        n_features,
        n_classes,
        batch_size,
        max_epochs = config.max_epochs,
        "training neural network"
    );

    let mut order: Vec<usize> = (0..n_samples).collect();
    let mut loss_curve = Vec::with_capacity(config.max_epochs);
    let mut best_loss = f64::INFINITY;
    let mut no_improvement = 0usize;
    let mut converged = false;

    for epoch in 1..=config.max_epochs {
        order.shuffle(&mut rng);
        let mut epoch_loss = 0.0;
        for batch in order.chunks(batch_size) {
            let batch_loss = train_batch(&mut network, &mut adam, features, labels, batch, config.alpha);
            epoch_loss += batch_loss * batch.len() as f64;
        }
        epoch_loss /= n_samples as f64;
        if !epoch_loss.is_finite() {
            return Err(MlpError::NonFiniteLoss { epoch });
        }
        loss_curve.push(epoch_loss);
        debug!(epoch, loss = epoch_loss, "epoch complete");

        if epoch_loss > best_loss - config.tolerance {
            no_improvement += 1;
        } else {
            no_improvement = 0;
        }
        if epoch_loss < best_loss {
            best_loss = epoch_loss;
        }
        if no_improvement > config.patience {
            converged = true;
            break;
        }
    }

    info!(
        n_epochs = loss_curve.len(),
        final_loss = loss_curve.last().copied().unwrap_or(f64::NAN),
        converged,
        "neural network training complete"
    );

    Ok(MlpResult::new(network, loss_curve, converged))
}

/// One Adam step on a mini-batch. Returns the mean penalized batch loss.
fn train_batch<R: AsRef<[u8]>>(
    network: &mut Mlp,
    adam: &mut Adam,
    features: &[R],
    labels: &[usize],
    batch: &[usize],
    alpha: f64,
) -> f64 {
    let n_layers = network.layers.len();
    let mut grads = Gradients::zeros_like(network);
    let mut loss = 0.0;

    for &idx in batch {
        let trace = network.forward_trace(scale_input(features[idx].as_ref()));
        let label = labels[idx];
        let probs = &trace[n_layers];
        loss -= probs[label].max(PROB_FLOOR).ln();

        // Softmax + cross-entropy: dL/dz = p - onehot.
        let mut delta = probs.clone();
        delta[label] -= 1.0;

        for l in (0..n_layers).rev() {
            let layer = &network.layers[l];
            layer.accumulate(&delta, &trace[l], &mut grads.weights[l], &mut grads.biases[l]);
            if l > 0 {
                let mut back = layer.backward(&delta);
                for (b, a) in back.iter_mut().zip(&trace[l]) {
                    if *a <= 0.0 {
                        *b = 0.0;
                    }
                }
                delta = back;
            }
        }
    }

    let n = batch.len() as f64;
    let penalty: f64 = network.layers.iter().map(Layer::squared_weight_sum).sum();
    let loss = loss / n + 0.5 * alpha * penalty / n;

    adam.begin_step();
    for (l, layer) in network.layers.iter_mut().enumerate() {
        for (g, w) in grads.weights[l].iter_mut().zip(&layer.weights) {
            *g = (*g + alpha * w) / n;
        }
        for g in grads.biases[l].iter_mut() {
            *g /= n;
        }
        adam.update(2 * l, &mut layer.weights, &grads.weights[l]);
        adam.update(2 * l + 1, &mut layer.biases, &grads.biases[l]);
    }

    loss
}
