//! Random Forest training with parallel tree construction.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::iter::{IntoParallelIterator, ParallelIterator};
use tracing::{debug, info, instrument};

use crate::config::{OobMode, RandomForestConfig};
use crate::error::{RfError, validate_training_data};
use crate::oob::compute_oob;
use crate::result::{RandomForestResult, TrainingMetadata};
use crate::tree::{DecisionTree, GrowthLimits};

/// A fitted Random Forest ensemble.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct RandomForest {
    pub(crate) trees: Vec<DecisionTree>,
    pub(crate) n_features: usize,
    pub(crate) n_classes: usize,
}

impl RandomForest {
    /// Structural check for a forest that did not come from
    /// [`RandomForestConfig::fit`], such as one decoded from disk.
    ///
    /// # Errors
    ///
    /// [`RfError::MalformedTree`] when the forest is empty, or for the first
    /// tree whose shape differs from the forest's or whose arena cannot be
    /// walked.
    pub fn validate(&self) -> Result<(), RfError> {
        if self.trees.is_empty() {
            return Err(RfError::MalformedTree {
                tree: 0,
                reason: "forest has no trees".to_owned(),
            });
        }
        for (idx, tree) in self.trees.iter().enumerate() {
            if tree.n_features != self.n_features || tree.n_classes != self.n_classes {
                return Err(RfError::MalformedTree {
                    tree: idx,
                    reason: format!(
                        "tree is {}x{}, forest is {}x{}",
                        tree.n_features, tree.n_classes, self.n_features, self.n_classes
                    ),
                });
            }
            tree.validate(idx)?;
        }
        Ok(())
    }
}

/// Draw a bootstrap sample and return it with the out-of-bag indices.
fn bootstrap_sample(
    n_samples: usize,
    draw_count: usize,
    rng: &mut impl Rng,
) -> (Vec<usize>, Vec<usize>) {
    let mut in_bag = vec![false; n_samples];
    let mut bootstrap_indices = Vec::with_capacity(draw_count);
    for _ in 0..draw_count {
        let idx = rng.gen_range(0..n_samples);
        bootstrap_indices.push(idx);
        in_bag[idx] = true;
    }
    let oob_indices: Vec<usize> = (0..n_samples).filter(|&i| !in_bag[i]).collect();
    (bootstrap_indices, oob_indices)
}

/// Train the Random Forest ensemble.
///
/// Per-tree seeds are drawn from a master RNG before the parallel section,
/// so results do not depend on the thread count.
#[instrument(skip_all, fields(n_trees = config.n_trees, n_samples = features.len()))]
pub(crate) fn train<R: AsRef<[u8]> + Sync>(
    config: &RandomForestConfig,
    features: &[R],
    labels: &[usize],
    n_classes: usize,
) -> Result<RandomForestResult, RfError> {
    let n_features = validate_training_data(features, labels, n_classes)?;
    config.validate()?;
    let n_samples = features.len();

    let max_features = config.max_features.resolve(n_features)?;
    let draw_count = ((n_samples as f64) * config.bootstrap_fraction).ceil() as usize;
    let limits = GrowthLimits::for_forest(config, max_features);

    info!(
        n_trees = config.n_trees,
        n_samples,
        n_features,
        n_classes,
        max_features,
        draw_count,
        "training random forest"
    );

    let mut master_rng = ChaCha8Rng::seed_from_u64(config.seed);
    let tree_seeds: Vec<u64> = (0..config.n_trees).map(|_| master_rng.r#gen()).collect();

    let tree_results: Vec<(DecisionTree, Vec<usize>)> = tree_seeds
        .into_par_iter()
        .map(|seed| {
            let mut rng = ChaCha8Rng::seed_from_u64(seed);
            let (bootstrap_indices, oob_indices) =
                bootstrap_sample(n_samples, draw_count, &mut rng);
            let tree = limits.grow(features, labels, n_classes, &bootstrap_indices, rng.r#gen());
            (tree, oob_indices)
        })
        .collect();

    let (trees, oob_indices_per_tree): (Vec<DecisionTree>, Vec<Vec<usize>>) =
        tree_results.into_iter().unzip();

    debug!(n_trees_trained = trees.len(), "tree training complete");

    let oob_score = if config.oob_mode == OobMode::Enabled {
        Some(compute_oob(&trees, features, labels, n_classes, &oob_indices_per_tree)?)
    } else {
        None
    };

    let forest = RandomForest {
        trees,
        n_features,
        n_classes,
    };

    let metadata = TrainingMetadata {
        n_trees: config.n_trees,
        n_features,
        n_classes,
        n_samples,
        features_per_split: max_features,
    };

    info!(
        oob_accuracy = oob_score.as_ref().map(|s| s.accuracy),
        "random forest training complete"
    );

    Ok(RandomForestResult::new(forest, oob_score, metadata))
}
