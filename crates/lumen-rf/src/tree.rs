//! Growing and walking a single CART tree.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::trace;

use crate::{
    RfError,
    config::RandomForestConfig,
    node::Node,
    split::{SplitContext, SplitCriterion, SplitMethod},
};

/// Stopping rules every tree of one forest shares.
#[derive(Debug, Clone, Copy)]
pub(crate) struct GrowthLimits {
    pub(crate) criterion: SplitCriterion,
    pub(crate) split_method: SplitMethod,
    pub(crate) max_depth: Option<usize>,
    pub(crate) min_samples_split: usize,
    pub(crate) min_samples_leaf: usize,
    /// Already resolved against the row width.
    pub(crate) max_features: usize,
}

impl GrowthLimits {
    pub(crate) fn for_forest(config: &RandomForestConfig, max_features: usize) -> Self {
        Self {
            criterion: config.criterion,
            split_method: config.split_method,
            max_depth: config.max_depth,
            min_samples_split: config.min_samples_split,
            min_samples_leaf: config.min_samples_leaf,
            max_features,
        }
    }

    /// Grow one tree over the (possibly repeated) rows in `sample_indices`.
    ///
    /// The data must already have passed `validate_training_data`; rows are
    /// borrowed, never copied.
    pub(crate) fn grow<R: AsRef<[u8]>>(
        &self,
        features: &[R],
        labels: &[usize],
        n_classes: usize,
        sample_indices: &[usize],
        seed: u64,
    ) -> DecisionTree {
        let n_features = features.first().map_or(0, |row| row.as_ref().len());
        let mut grower = Grower {
            ctx: SplitContext {
                features,
                labels,
                n_classes,
                criterion: self.criterion,
                method: self.split_method,
                max_features: self.max_features.min(n_features),
                min_samples_leaf: self.min_samples_leaf,
            },
            limits: self,
            rng: ChaCha8Rng::seed_from_u64(seed),
            arena: Vec::new(),
        };
        grower.node(sample_indices, 0);
        trace!(n_nodes = grower.arena.len(), "tree grown");

        DecisionTree {
            nodes: grower.arena,
            n_features,
            n_classes,
        }
    }
}

struct Grower<'a, R> {
    ctx: SplitContext<'a, R>,
    limits: &'a GrowthLimits,
    rng: ChaCha8Rng,
    arena: Vec<Node>,
}

impl<R: AsRef<[u8]>> Grower<'_, R> {
    /// Append the subtree for `rows` depth-first; returns its arena offset.
    fn node(&mut self, rows: &[usize], depth: usize) -> usize {
        let n_samples = rows.len();
        let mut counts = vec![0usize; self.ctx.n_classes];
        for &row in rows {
            counts[self.ctx.labels[row]] += 1;
        }

        let stop = n_samples < self.limits.min_samples_split
            || self.limits.max_depth.is_some_and(|max| depth >= max)
            || counts.iter().filter(|&&c| c > 0).count() <= 1;
        let split = if stop {
            None
        } else {
            self.ctx.find_best_split(rows, &mut self.rng)
        };

        let offset = self.arena.len();
        let Some(split) = split else {
            let total = n_samples.max(1) as f64;
            self.arena.push(Node::Leaf {
                distribution: counts.iter().map(|&c| c as f64 / total).collect(),
                n_samples,
            });
            return offset;
        };

        // Placeholder keeps the parent ahead of its children.
        self.arena.push(Node::Leaf {
            distribution: Vec::new(),
            n_samples,
        });
        let left = self.node(&split.left_indices, depth + 1);
        let right = self.node(&split.right_indices, depth + 1);
        self.arena[offset] = Node::Split {
            pixel: split.pixel,
            threshold: split.threshold,
            left,
            right,
            n_samples,
        };
        offset
    }
}

/// One CART tree as a flat node arena; the root sits at offset 0.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DecisionTree {
    pub(crate) nodes: Vec<Node>,
    pub(crate) n_features: usize,
    pub(crate) n_classes: usize,
}

impl DecisionTree {
    /// Predict the class index for a single sample (argmax of the leaf).
    ///
    /// # Errors
    ///
    /// Returns [`RfError::PredictionFeatureMismatch`] when `sample.len() != n_features`.
    pub fn predict(&self, sample: &[u8]) -> Result<usize, RfError> {
        let dist = self.leaf_distribution(sample)?;
        Ok(dist
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1).then(b.0.cmp(&a.0)))
            .map(|(idx, _)| idx)
            .unwrap_or(0))
    }

    /// Return the leaf class distribution for a single sample.
    ///
    /// The slice has length `n_classes` and sums to 1.0.
    ///
    /// # Errors
    ///
    /// Returns [`RfError::PredictionFeatureMismatch`] when `sample.len() != n_features`.
    pub fn leaf_distribution(&self, sample: &[u8]) -> Result<&[f64], RfError> {
        if sample.len() != self.n_features {
            return Err(RfError::PredictionFeatureMismatch {
                expected: self.n_features,
                got: sample.len(),
            });
        }
        let mut idx = 0usize;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { distribution, .. } => return Ok(distribution),
                Node::Split {
                    pixel,
                    threshold,
                    left,
                    right,
                    ..
                } => {
                    idx = if sample[pixel.offset()] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    /// Check that the arena can be walked for any row of `n_features` bytes.
    ///
    /// Children must sit after their parent and inside the arena, which
    /// also rules out cycles. `tree` only labels the error.
    pub(crate) fn validate(&self, tree: usize) -> Result<(), RfError> {
        let malformed = |reason: String| RfError::MalformedTree { tree, reason };
        if self.nodes.is_empty() {
            return Err(malformed("empty arena".to_owned()));
        }
        let len = self.nodes.len();
        for (idx, node) in self.nodes.iter().enumerate() {
            match node {
                Node::Split {
                    pixel, left, right, ..
                } => {
                    if pixel.offset() >= self.n_features {
                        return Err(malformed(format!(
                            "node {idx} tests {pixel} on rows of {} pixels",
                            self.n_features
                        )));
                    }
                    for child in [*left, *right] {
                        if child <= idx || child >= len {
                            return Err(malformed(format!(
                                "node {idx} points to {child} in an arena of {len}"
                            )));
                        }
                    }
                }
                Node::Leaf { distribution, .. } => {
                    if distribution.len() != self.n_classes {
                        return Err(malformed(format!(
                            "leaf {idx} has {} classes, tree has {}",
                            distribution.len(),
                            self.n_classes
                        )));
                    }
                    if distribution.iter().any(|p| !p.is_finite()) {
                        return Err(malformed(format!("leaf {idx} holds a non-finite share")));
                    }
                }
            }
        }
        Ok(())
    }

    /// Return the total number of nodes (splits and leaves).
    #[must_use]
    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    /// Return the number of leaf nodes.
    #[must_use]
    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    /// Return the maximum depth; a single root leaf has depth 0.
    #[must_use]
    pub fn depth(&self) -> usize {
        let mut max_depth = 0usize;
        let mut stack = vec![(0usize, 0usize)];
        while let Some((node_idx, d)) = stack.pop() {
            match &self.nodes[node_idx] {
                Node::Leaf { .. } => max_depth = max_depth.max(d),
                Node::Split { left, right, .. } => {
                    stack.push((*left, d + 1));
                    stack.push((*right, d + 1));
                }
            }
        }
        max_depth
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Pixel;

    fn limits() -> GrowthLimits {
        GrowthLimits::for_forest(&RandomForestConfig::default(), usize::MAX)
    }

    fn grow(limits: &GrowthLimits, features: &[Vec<u8>], labels: &[usize], seed: u64) -> DecisionTree {
        let rows: Vec<usize> = (0..features.len()).collect();
        limits.grow(features, labels, 2, &rows, seed)
    }

    fn dark_vs_bright() -> (Vec<Vec<u8>>, Vec<usize>) {
        let features = vec![
            vec![10, 0],
            vec![20, 0],
            vec![30, 0],
            vec![200, 0],
            vec![210, 0],
            vec![220, 0],
        ];
        (features, vec![0, 0, 0, 1, 1, 1])
    }

    #[test]
    fn single_class_is_one_leaf() {
        let features = vec![vec![1, 2], vec![3, 4], vec![5, 6]];
        let tree = grow(&limits(), &features, &[0, 0, 0], 1);
        assert_eq!(tree.n_nodes(), 1);
        assert_eq!(tree.predict(&[2, 3]).unwrap(), 0);
        assert_eq!(tree.leaf_distribution(&[2, 3]).unwrap(), &[1.0, 0.0]);
    }

    #[test]
    fn one_threshold_separates_intensities() {
        let (features, labels) = dark_vs_bright();
        let tree = grow(&limits(), &features, &labels, 1);
        assert_eq!(tree.predict(&[15, 0]).unwrap(), 0);
        assert_eq!(tree.predict(&[215, 0]).unwrap(), 1);
        assert_eq!(tree.depth(), 1);
        assert_eq!(tree.n_leaves(), 2);
    }

    #[test]
    fn xor_needs_depth_two() {
        let features = vec![vec![0, 0], vec![0, 255], vec![255, 0], vec![255, 255]];
        let labels = vec![0, 1, 1, 0];
        let tree = grow(&limits(), &features, &labels, 1);
        assert!(tree.depth() >= 2);
        for (row, &label) in features.iter().zip(&labels) {
            assert_eq!(tree.predict(row).unwrap(), label);
        }
    }

    #[test]
    fn max_depth_caps_growth() {
        let features = vec![vec![0, 0], vec![0, 255], vec![255, 0], vec![255, 255]];
        let capped = GrowthLimits {
            max_depth: Some(1),
            ..limits()
        };
        let tree = grow(&capped, &features, &[0, 1, 1, 0], 1);
        assert!(tree.depth() <= 1);
    }

    #[test]
    fn extra_trees_repeat_under_one_seed() {
        let (features, labels) = dark_vs_bright();
        let random = GrowthLimits {
            split_method: SplitMethod::ExtraTrees,
            ..limits()
        };
        let a = grow(&random, &features, &labels, 123);
        let b = grow(&random, &features, &labels, 123);
        for v in 0..=255u8 {
            assert_eq!(a.predict(&[v, 0]).unwrap(), b.predict(&[v, 0]).unwrap());
        }
    }

    #[test]
    fn wrong_row_width_rejected() {
        let (features, labels) = dark_vs_bright();
        let tree = grow(&limits(), &features, &labels, 1);
        assert!(matches!(
            tree.predict(&[1]),
            Err(RfError::PredictionFeatureMismatch { expected: 2, got: 1 })
        ));
    }

    #[test]
    fn missing_class_keeps_full_width_distribution() {
        let features = vec![vec![9], vec![10]];
        let tree = grow(&limits(), &features, &[1, 1], 1);
        assert_eq!(tree.leaf_distribution(&[0]).unwrap(), &[0.0, 1.0]);
    }

    #[test]
    fn grown_trees_pass_validation() {
        let (features, labels) = dark_vs_bright();
        assert!(grow(&limits(), &features, &labels, 1).validate(0).is_ok());
    }

    #[test]
    fn out_of_arena_child_rejected() {
        let tree = DecisionTree {
            nodes: vec![Node::Split {
                pixel: Pixel::new(0),
                threshold: 0,
                left: 7,
                right: 7,
                n_samples: 2,
            }],
            n_features: 1,
            n_classes: 2,
        };
        assert!(matches!(
            tree.validate(3),
            Err(RfError::MalformedTree { tree: 3, .. })
        ));
    }

    #[test]
    fn backward_child_rejected() {
        let leaf = Node::Leaf {
            distribution: vec![1.0, 0.0],
            n_samples: 1,
        };
        let tree = DecisionTree {
            nodes: vec![
                leaf.clone(),
                Node::Split {
                    pixel: Pixel::new(0),
                    threshold: 0,
                    left: 2,
                    right: 1,
                    n_samples: 2,
                },
                leaf,
            ],
            n_features: 1,
            n_classes: 2,
        };
        assert!(tree.validate(0).is_err());
    }

    #[test]
    fn pixel_beyond_row_and_short_leaf_rejected() {
        let leaf = |distribution: Vec<f64>| Node::Leaf {
            distribution,
            n_samples: 1,
        };
        let wide = DecisionTree {
            nodes: vec![
                Node::Split {
                    pixel: Pixel::new(4),
                    threshold: 9,
                    left: 1,
                    right: 2,
                    n_samples: 2,
                },
                leaf(vec![1.0, 0.0]),
                leaf(vec![0.0, 1.0]),
            ],
            n_features: 4,
            n_classes: 2,
        };
        assert!(wide.validate(0).is_err());

        let short = DecisionTree {
            nodes: vec![leaf(vec![1.0])],
            n_features: 4,
            n_classes: 2,
        };
        assert!(short.validate(0).is_err());
    }

    #[test]
    fn repeated_rows_count_twice() {
        let features = vec![vec![0u8], vec![255u8]];
        let tree = limits().grow(&features, &[0, 1], 2, &[0, 0, 0, 1], 1);
        assert_eq!(tree.nodes[0].n_samples(), 4);
    }
}
